//! Owned session lifecycle: `Absent -> Created -> Attached -> Closed`.

use tracing::{info, warn};

use sshplex_core::{
    Error, Ownership, Result, SessionHandle, SessionName, SessionState, WindowHandle,
};
use std::path::PathBuf;

use crate::broadcast::BroadcastController;
use crate::driver::MultiplexerDriver;
use crate::topology::SessionTopology;
use crate::visual::{TerminalHandle, TerminalLauncher};

/// Name of the default window of a freshly created session.
pub const DEFAULT_WINDOW_NAME: &str = "sshplex";

/// What `attach` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A terminal window was opened on the session
    Launched {
        /// Launched terminal
        terminal: TerminalHandle,
        /// Command the terminal runs
        command: String,
    },
    /// Nothing was launched; the user attaches manually
    Instructions(String),
}

/// Creates, attaches and destroys one named session.
#[derive(Debug)]
pub struct SessionLifecycle {
    name: SessionName,
    start_directory: PathBuf,
    control_mode: bool,
    binary: String,
    socket_name: Option<String>,
    state: SessionState,
    ownership: Option<Ownership>,
    session: Option<SessionHandle>,
}

impl SessionLifecycle {
    /// Lifecycle for `name`, not yet created.
    pub fn new(name: SessionName) -> Self {
        Self {
            name,
            start_directory: PathBuf::from("~"),
            control_mode: false,
            binary: "tmux".to_string(),
            socket_name: None,
            state: SessionState::Absent,
            ownership: None,
            session: None,
        }
    }

    /// Directory new sessions start in.
    pub fn with_start_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start_directory = dir.into();
        self
    }

    /// Attach with `tmux -CC` (iTerm2 control mode).
    pub fn with_control_mode(mut self, control_mode: bool) -> Self {
        self.control_mode = control_mode;
        self
    }

    /// tmux binary and `-L` socket used in attach commands; must match the driver's.
    pub fn with_tmux_server(
        mut self,
        binary: impl Into<String>,
        socket_name: Option<String>,
    ) -> Self {
        self.binary = binary.into();
        self.socket_name = socket_name;
        self
    }

    /// Session name.
    pub fn name(&self) -> &SessionName {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session was created here or adopted; `None` before `create`.
    pub fn ownership(&self) -> Option<Ownership> {
        self.ownership
    }

    /// Live session handle, if any.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref().filter(|_| self.state.is_live())
    }

    /// Command a launched terminal runs to attach to the session.
    pub fn attach_command(&self) -> String {
        if self.control_mode {
            format!("{}; exit", self.tmux_invocation(true))
        } else {
            self.tmux_invocation(false)
        }
    }

    /// Command a user types to attach to the session by hand.
    pub fn manual_attach_command(&self) -> String {
        self.tmux_invocation(false)
    }

    fn tmux_invocation(&self, control_mode: bool) -> String {
        let mut words = vec![shell_word(&self.binary)];
        if let Some(socket) = &self.socket_name {
            words.push("-L".to_string());
            words.push(shell_word(socket));
        }
        if control_mode {
            words.push("-CC".to_string());
        }
        words.push("attach-session".to_string());
        words.push("-t".to_string());
        words.push(self.name.to_string());
        words.join(" ")
    }

    /// Create the session, or adopt an existing one with the same name.
    ///
    /// The session's active window becomes window 0 of the topology. Calling
    /// this again while the session is live does nothing.
    pub fn create<D: MultiplexerDriver + ?Sized>(
        &mut self,
        driver: &D,
        topology: &mut SessionTopology,
    ) -> Result<SessionHandle> {
        if let Some(handle) = self.session() {
            return Ok(handle.clone());
        }

        let name = self.name.as_str();
        info!("Creating tmux session '{}'", name);

        let (handle, ownership) = if driver.has_session(name)? {
            warn!("Session '{}' already exists, adopting it", name);
            (driver.get_session(name)?, Ownership::Adopted)
        } else {
            let handle = driver.new_session(name, DEFAULT_WINDOW_NAME, &self.start_directory)?;
            (handle, Ownership::Created)
        };

        let window: WindowHandle = driver.active_window(&handle)?;
        let window_name = match ownership {
            Ownership::Created => DEFAULT_WINDOW_NAME.to_string(),
            Ownership::Adopted => driver.window_name(&window).unwrap_or_else(|e| {
                warn!("Could not read name of window {}: {}", window, e);
                DEFAULT_WINDOW_NAME.to_string()
            }),
        };
        topology.clear();
        topology.register_window(0, window, window_name)?;
        topology.set_active_window(0)?;

        self.session = Some(handle.clone());
        self.ownership = Some(ownership);
        self.state = SessionState::Created;
        info!("tmux session '{}' ready ({:?})", name, ownership);
        Ok(handle)
    }

    /// Attach to the session.
    ///
    /// Installs the broadcast toggle binding first (failures only logged).
    /// With `auto` a terminal window is launched on the session and the state
    /// moves to `Attached`; otherwise the attach instructions are returned.
    pub fn attach<D: MultiplexerDriver + ?Sized>(
        &mut self,
        driver: &D,
        auto: bool,
        launcher: &dyn TerminalLauncher,
    ) -> Result<AttachOutcome> {
        if self.session().is_none() {
            return Err(Error::NoSession);
        }

        if let Err(e) = BroadcastController::new().install_toggle_binding(driver) {
            warn!("Could not bind broadcast toggle: {}", e);
        }

        if !auto {
            let command = self.manual_attach_command();
            info!("Session '{}' is ready for attachment", self.name);
            return Ok(AttachOutcome::Instructions(format!(
                "To attach to the session, run: {command}"
            )));
        }

        let command = self.attach_command();
        info!("Auto-attaching to session '{}' via {}", self.name, launcher.name());
        let terminal = launcher.launch(&command)?;
        self.state = SessionState::Attached;
        Ok(AttachOutcome::Launched { terminal, command })
    }

    /// Destroy the session and forget its topology.
    ///
    /// No-op when nothing is live. A session that already vanished counts as
    /// closed.
    pub fn close<D: MultiplexerDriver + ?Sized>(
        &mut self,
        driver: &D,
        topology: &mut SessionTopology,
    ) -> Result<()> {
        let Some(handle) = self.session().cloned() else {
            return Ok(());
        };

        info!("Closing tmux session '{}'", self.name);
        if let Err(e) = driver.kill_session(&handle) {
            match driver.has_session(self.name.as_str()) {
                Ok(false) => warn!("{} ('{}'): {}", Error::SessionAlreadyClosed, self.name, e),
                _ => return Err(e.into()),
            }
        }

        topology.clear();
        self.session = None;
        self.state = SessionState::Closed;
        Ok(())
    }
}

/// Quote `word` for a POSIX shell unless it is plainly safe.
fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=+:@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
