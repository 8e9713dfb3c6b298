//! Multiplexer driver boundary.
//!
//! The driver is a stateless command/query surface over the terminal
//! multiplexer. Everything above it (topology, allocator, broadcast,
//! lifecycle) only talks to the multiplexer through this trait, which keeps
//! the placement policy testable without a tmux server.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sshplex_core::{DriverError, PaneHandle, SessionHandle, WindowHandle};

/// Result of a single driver call.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Summary of a session as reported by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session name
    pub name: String,
    /// Session handle
    pub handle: SessionHandle,
    /// Number of windows
    pub windows: usize,
    /// Whether a client is attached
    pub attached: bool,
    /// Creation time, when the multiplexer reports one
    pub created: Option<DateTime<Utc>>,
}

impl SessionSummary {
    /// Status indicator for listings.
    pub fn status(&self) -> &'static str {
        if self.attached {
            "attached"
        } else {
            "detached"
        }
    }
}

/// Capability surface of the terminal multiplexer.
///
/// Every call may fail; handles passed in may be stale.
pub trait MultiplexerDriver: Send {
    /// Whether a session with this exact name exists.
    fn has_session(&self, name: &str) -> DriverResult<bool>;

    /// Create a detached session with one default window.
    fn new_session(
        &self,
        name: &str,
        default_window_name: &str,
        start_dir: &Path,
    ) -> DriverResult<SessionHandle>;

    /// Look up an existing session by name.
    fn get_session(&self, name: &str) -> DriverResult<SessionHandle>;

    /// Currently active window of a session.
    fn active_window(&self, session: &SessionHandle) -> DriverResult<WindowHandle>;

    /// Open a new window in the session.
    fn new_window(&self, session: &SessionHandle, name: &str) -> DriverResult<WindowHandle>;

    /// Resize a window to `height` rows by `width` columns.
    fn resize_window(&self, window: &WindowHandle, height: u16, width: u16) -> DriverResult<()>;

    /// Re-layout every pane of the window (e.g. `tiled`).
    fn select_layout(&self, window: &WindowHandle, layout: &str) -> DriverResult<()>;

    /// Set a window option.
    fn set_window_option(&self, window: &WindowHandle, key: &str, value: &str)
        -> DriverResult<()>;

    /// Read a window option's current value.
    fn get_window_option(&self, window: &WindowHandle, key: &str) -> DriverResult<String>;

    /// Split the window's active pane, returning the new pane.
    fn split_window(&self, window: &WindowHandle, vertical: bool) -> DriverResult<PaneHandle>;

    /// Active pane of the window (the default pane of a fresh window).
    fn attached_pane(&self, window: &WindowHandle) -> DriverResult<PaneHandle>;

    /// Set a pane's title.
    fn set_pane_title(&self, pane: &PaneHandle, title: &str) -> DriverResult<()>;

    /// Type `text` literally into the pane, pressing Enter when `submit`.
    fn send_keys(&self, pane: &PaneHandle, text: &str, submit: bool) -> DriverResult<()>;

    /// Destroy a session and everything in it.
    fn kill_session(&self, session: &SessionHandle) -> DriverResult<()>;

    /// Current name of a window.
    fn window_name(&self, window: &WindowHandle) -> DriverResult<String>;

    /// List every session on the server.
    fn list_sessions(&self) -> DriverResult<Vec<SessionSummary>>;

    /// Bind a key (after the prefix) to a multiplexer command.
    fn bind_key(&self, key: &str, command: &[String]) -> DriverResult<()>;
}

impl<T: MultiplexerDriver + ?Sized> MultiplexerDriver for Box<T> {
    fn has_session(&self, name: &str) -> DriverResult<bool> {
        (**self).has_session(name)
    }

    fn new_session(
        &self,
        name: &str,
        default_window_name: &str,
        start_dir: &Path,
    ) -> DriverResult<SessionHandle> {
        (**self).new_session(name, default_window_name, start_dir)
    }

    fn get_session(&self, name: &str) -> DriverResult<SessionHandle> {
        (**self).get_session(name)
    }

    fn active_window(&self, session: &SessionHandle) -> DriverResult<WindowHandle> {
        (**self).active_window(session)
    }

    fn new_window(&self, session: &SessionHandle, name: &str) -> DriverResult<WindowHandle> {
        (**self).new_window(session, name)
    }

    fn resize_window(&self, window: &WindowHandle, height: u16, width: u16) -> DriverResult<()> {
        (**self).resize_window(window, height, width)
    }

    fn select_layout(&self, window: &WindowHandle, layout: &str) -> DriverResult<()> {
        (**self).select_layout(window, layout)
    }

    fn set_window_option(
        &self,
        window: &WindowHandle,
        key: &str,
        value: &str,
    ) -> DriverResult<()> {
        (**self).set_window_option(window, key, value)
    }

    fn get_window_option(&self, window: &WindowHandle, key: &str) -> DriverResult<String> {
        (**self).get_window_option(window, key)
    }

    fn split_window(&self, window: &WindowHandle, vertical: bool) -> DriverResult<PaneHandle> {
        (**self).split_window(window, vertical)
    }

    fn attached_pane(&self, window: &WindowHandle) -> DriverResult<PaneHandle> {
        (**self).attached_pane(window)
    }

    fn set_pane_title(&self, pane: &PaneHandle, title: &str) -> DriverResult<()> {
        (**self).set_pane_title(pane, title)
    }

    fn send_keys(&self, pane: &PaneHandle, text: &str, submit: bool) -> DriverResult<()> {
        (**self).send_keys(pane, text, submit)
    }

    fn kill_session(&self, session: &SessionHandle) -> DriverResult<()> {
        (**self).kill_session(session)
    }

    fn window_name(&self, window: &WindowHandle) -> DriverResult<String> {
        (**self).window_name(window)
    }

    fn list_sessions(&self) -> DriverResult<Vec<SessionSummary>> {
        (**self).list_sessions()
    }

    fn bind_key(&self, key: &str, command: &[String]) -> DriverResult<()> {
        (**self).bind_key(key, command)
    }
}
