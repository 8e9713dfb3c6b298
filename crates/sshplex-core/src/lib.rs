//! # sshplex-core
//!
//! Core types for SSHplex.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other sshplex crates. It provides:
//!
//! - Error taxonomy shared by the placement engine and its callers
//! - YAML configuration (SSH, tmux and logging settings)
//! - Host records and the SSH command builder
//! - Session naming and lifecycle state types
//! - Opaque multiplexer handles (session, window, pane)
//! - Split orientation and fallback attempt records
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other sshplex crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handle;
pub mod host;
pub mod placement;
pub mod platform;
pub mod session;

// Re-export commonly used types
pub use config::{LoggingSettings, PlexConfig, SshSettings, TmuxSettings};
pub use error::{DriverError, DriverErrorKind, Error, Result};
pub use handle::{PaneHandle, SessionHandle, WindowHandle};
pub use host::{ConnectionParams, HostRecord};
pub use placement::{FallbackStep, SplitAttempt, SplitOrientation, WindowSize};
pub use platform::Platform;
pub use session::{Ownership, SessionName, SessionState};
