//! Error types for SSHplex.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::placement::SplitAttempt;

/// Coarse classification of a multiplexer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverErrorKind {
    /// The window has no room left for another pane
    NoSpace,
    /// The targeted session, window or pane no longer exists
    NotFound,
    /// The multiplexer binary could not be run at all
    Unavailable,
    /// Anything else the multiplexer rejected
    Other,
}

/// A single failed call against the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("tmux {command} failed: {message}")]
pub struct DriverError {
    /// Multiplexer subcommand that failed (e.g. `split-window`)
    pub command: String,
    /// Message reported by the multiplexer
    pub message: String,
    /// Kind fixed at construction, when known without parsing the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    known_kind: Option<DriverErrorKind>,
}

impl DriverError {
    /// Create a new driver error.
    pub fn new(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            message: message.into(),
            known_kind: None,
        }
    }

    /// Error raised when the multiplexer process could not be spawned.
    pub fn unavailable(command: impl Into<String>, cause: &std::io::Error) -> Self {
        Self {
            known_kind: Some(DriverErrorKind::Unavailable),
            ..Self::new(command, format!("unable to run tmux: {cause}"))
        }
    }

    /// Classify the failure.
    ///
    /// Spawn failures carry their kind; everything else is classified from
    /// the multiplexer's message.
    pub fn kind(&self) -> DriverErrorKind {
        if let Some(kind) = self.known_kind {
            return kind;
        }
        let message = self.message.to_ascii_lowercase();
        if message.starts_with("unable to run tmux") {
            DriverErrorKind::Unavailable
        } else if message.contains("no space for new pane")
            || message.contains("pane too small")
            || message.contains("size too small")
        {
            DriverErrorKind::NoSpace
        } else if message.contains("can't find")
            || message.contains("not found")
            || message.contains("no server running")
            || message.contains("no such")
        {
            DriverErrorKind::NotFound
        } else {
            DriverErrorKind::Other
        }
    }

    /// Whether the failure means "no room for another pane".
    pub fn is_no_space(&self) -> bool {
        self.kind() == DriverErrorKind::NoSpace
    }

    /// Whether the targeted object has vanished.
    pub fn is_not_found(&self) -> bool {
        self.kind() == DriverErrorKind::NotFound
    }
}

/// Main error type for SSHplex operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Placement attempted before a session exists
    #[error("No multiplexer session exists")]
    NoSession,

    /// Opening a new window failed
    #[error("Failed to create window: {0}")]
    WindowCreateFailed(#[source] DriverError),

    /// Every split strategy in the fallback chain failed
    #[error("Placement exhausted for host '{host}' after {} attempts", attempts.len())]
    PlacementExhausted {
        /// Host key that could not be placed
        host: String,
        /// Every split attempt, in the order it was tried
        attempts: Vec<SplitAttempt>,
    },

    /// Any other multiplexer failure
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// The session was already gone when closing it
    #[error("Session already closed")]
    SessionAlreadyClosed,

    /// Session not known to the multiplexer
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Window index not registered in the topology
    #[error("Window not found: {0}")]
    WindowNotFound(usize),

    /// Host key has no registered pane
    #[error("Pane not found for host: {0}")]
    PaneNotFound(String),

    /// Session name rejected by tmux target syntax
    #[error("Invalid session name: '{0}'")]
    InvalidSessionName(String),

    /// Launching an external terminal window failed
    #[error("Terminal launch failed: {0}")]
    TerminalLaunch(String),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a per-host placement failure that a batch can
    /// recover from.
    pub fn is_placement_failure(&self) -> bool {
        matches!(
            self,
            Error::NoSession
                | Error::WindowCreateFailed(_)
                | Error::PlacementExhausted { .. }
                | Error::Driver(_)
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
