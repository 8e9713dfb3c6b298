//! In-memory multiplexer for tests.
//!
//! [`ScriptedDriver`] keeps sessions, windows and panes in memory, records
//! every call it receives and fails on demand. It lets the placement policy be
//! exercised without a tmux server.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use sshplex_core::{DriverError, PaneHandle, Result, SessionHandle, WindowHandle};

use crate::driver::{DriverResult, MultiplexerDriver, SessionSummary};
use crate::visual::{TerminalHandle, TerminalLauncher};

/// Driver operations, used to target failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    /// `has_session`
    HasSession,
    /// `new_session`
    NewSession,
    /// `get_session`
    GetSession,
    /// `active_window`
    ActiveWindow,
    /// `new_window`
    NewWindow,
    /// `resize_window`
    ResizeWindow,
    /// `select_layout`
    SelectLayout,
    /// `set_window_option`
    SetWindowOption,
    /// `get_window_option`
    GetWindowOption,
    /// `split_window`
    SplitWindow,
    /// `attached_pane`
    AttachedPane,
    /// `set_pane_title`
    SetPaneTitle,
    /// `send_keys`
    SendKeys,
    /// `kill_session`
    KillSession,
    /// `window_name`
    WindowName,
    /// `list_sessions`
    ListSessions,
    /// `bind_key`
    BindKey,
}

impl DriverOp {
    fn command(&self) -> &'static str {
        match self {
            DriverOp::HasSession => "has-session",
            DriverOp::NewSession => "new-session",
            DriverOp::GetSession => "list-sessions",
            DriverOp::ActiveWindow => "display-message",
            DriverOp::NewWindow => "new-window",
            DriverOp::ResizeWindow => "resize-window",
            DriverOp::SelectLayout => "select-layout",
            DriverOp::SetWindowOption => "set-window-option",
            DriverOp::GetWindowOption => "show-window-options",
            DriverOp::SplitWindow => "split-window",
            DriverOp::AttachedPane => "display-message",
            DriverOp::SetPaneTitle => "select-pane",
            DriverOp::SendKeys => "send-keys",
            DriverOp::KillSession => "kill-session",
            DriverOp::WindowName => "display-message",
            DriverOp::ListSessions => "list-sessions",
            DriverOp::BindKey => "bind-key",
        }
    }
}

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// Session existence query
    HasSession(String),
    /// Session creation
    NewSession {
        /// Session name
        name: String,
        /// Default window name
        window_name: String,
    },
    /// Session lookup
    GetSession(String),
    /// Active window query
    ActiveWindow(SessionHandle),
    /// Window creation
    NewWindow {
        /// Owning session
        session: SessionHandle,
        /// Window name
        name: String,
    },
    /// Window resize
    ResizeWindow {
        /// Target window
        window: WindowHandle,
        /// Rows
        height: u16,
        /// Columns
        width: u16,
    },
    /// Layout selection
    SelectLayout {
        /// Target window
        window: WindowHandle,
        /// Layout name
        layout: String,
    },
    /// Window option write
    SetWindowOption {
        /// Target window
        window: WindowHandle,
        /// Option name
        key: String,
        /// New value
        value: String,
    },
    /// Window option read
    GetWindowOption {
        /// Target window
        window: WindowHandle,
        /// Option name
        key: String,
    },
    /// Pane split
    SplitWindow {
        /// Target window
        window: WindowHandle,
        /// Split direction
        vertical: bool,
    },
    /// Active pane query
    AttachedPane(WindowHandle),
    /// Pane title
    SetPaneTitle {
        /// Target pane
        pane: PaneHandle,
        /// Title
        title: String,
    },
    /// Keystrokes
    SendKeys {
        /// Target pane
        pane: PaneHandle,
        /// Literal text
        text: String,
        /// Enter pressed afterwards
        submit: bool,
    },
    /// Session destruction
    KillSession(SessionHandle),
    /// Window name query
    WindowName(WindowHandle),
    /// Session listing
    ListSessions,
    /// Key binding
    BindKey {
        /// Key after the prefix
        key: String,
        /// Bound command
        command: Vec<String>,
    },
}

impl DriverCall {
    /// Whether the call changes multiplexer state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            DriverCall::HasSession(_)
                | DriverCall::GetSession(_)
                | DriverCall::ActiveWindow(_)
                | DriverCall::GetWindowOption { .. }
                | DriverCall::AttachedPane(_)
                | DriverCall::WindowName(_)
                | DriverCall::ListSessions
        )
    }
}

#[derive(Debug, Default)]
struct FakeWindow {
    name: String,
    panes: Vec<PaneHandle>,
    options: HashMap<String, String>,
}

#[derive(Debug)]
struct FakeSession {
    handle: SessionHandle,
    windows: Vec<WindowHandle>,
    active: Option<WindowHandle>,
}

impl FakeSession {
    fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            windows: Vec::new(),
            active: None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    sessions: BTreeMap<String, FakeSession>,
    windows: HashMap<WindowHandle, FakeWindow>,
    calls: Vec<DriverCall>,
    failures: HashMap<DriverOp, VecDeque<String>>,
    pane_limit: Option<usize>,
    next_id: usize,
}

impl State {
    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn take_failure(&mut self, op: DriverOp) -> DriverResult<()> {
        if let Some(queue) = self.failures.get_mut(&op) {
            if let Some(message) = queue.pop_front() {
                return Err(DriverError::new(op.command(), message));
            }
        }
        Ok(())
    }

    fn session_by_handle(&mut self, handle: &SessionHandle) -> Option<(&String, &mut FakeSession)> {
        self.sessions.iter_mut().find(|(_, s)| &s.handle == handle)
    }

    fn add_window(&mut self, session_name: &str, window_name: &str) -> WindowHandle {
        let window = WindowHandle::new(format!("@{}", self.next_id()));
        let pane = PaneHandle::new(format!("%{}", self.next_id()));
        self.windows.insert(
            window.clone(),
            FakeWindow {
                name: window_name.to_string(),
                panes: vec![pane],
                options: HashMap::new(),
            },
        );
        if let Some(session) = self.sessions.get_mut(session_name) {
            session.windows.push(window.clone());
            session.active = Some(window.clone());
        }
        window
    }

    fn window_mut(&mut self, window: &WindowHandle, op: DriverOp) -> DriverResult<&mut FakeWindow> {
        self.windows
            .get_mut(window)
            .ok_or_else(|| DriverError::new(op.command(), format!("can't find window: {window}")))
    }

    fn pane_exists(&self, pane: &PaneHandle) -> bool {
        self.windows.values().any(|w| w.panes.contains(pane))
    }
}

/// In-memory [`MultiplexerDriver`] with call recording and failure injection.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<Mutex<State>>,
}

impl ScriptedDriver {
    /// Empty multiplexer with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-existing session with one window named `bash`.
    pub fn with_existing_session(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            let id = state.next_id();
            state
                .sessions
                .insert(name.to_string(), FakeSession::new(SessionHandle::new(format!("${id}"))));
            state.add_window(name, "bash");
        }
        self
    }

    /// Refuse splits once a window holds `limit` panes (reported as "no space").
    pub fn with_pane_limit(self, limit: usize) -> Self {
        self.lock().pane_limit = Some(limit);
        self
    }

    /// Make the next `count` calls of `op` fail with `message`.
    pub fn fail_next(&self, op: DriverOp, count: usize, message: &str) {
        let mut state = self.lock();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..count {
            queue.push_back(message.to_string());
        }
    }

    /// Drop every pending injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Preset a window option.
    pub fn set_option(&self, window: &WindowHandle, key: &str, value: &str) {
        if let Some(w) = self.lock().windows.get_mut(window) {
            w.options.insert(key.to_string(), value.to_string());
        }
    }

    /// Current value of a window option.
    pub fn option(&self, window: &WindowHandle, key: &str) -> Option<String> {
        self.lock()
            .windows
            .get(window)
            .and_then(|w| w.options.get(key).cloned())
    }

    /// Destroy a session behind the caller's back (as if killed externally).
    pub fn kill_externally(&self, name: &str) {
        let mut state = self.lock();
        if let Some(session) = state.sessions.remove(name) {
            for window in session.windows {
                state.windows.remove(&window);
            }
        }
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Calls that changed multiplexer state.
    pub fn mutations(&self) -> Vec<DriverCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Whether a session with this name exists.
    pub fn session_exists(&self, name: &str) -> bool {
        self.lock().sessions.contains_key(name)
    }

    /// Windows of a session, in creation order.
    pub fn windows_of(&self, name: &str) -> Vec<WindowHandle> {
        self.lock()
            .sessions
            .get(name)
            .map(|s| s.windows.clone())
            .unwrap_or_default()
    }

    /// Panes of a window, in creation order.
    pub fn panes_of(&self, window: &WindowHandle) -> Vec<PaneHandle> {
        self.lock()
            .windows
            .get(window)
            .map(|w| w.panes.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the calls recorded so far
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, op: DriverOp, call: DriverCall) -> (MutexGuard<'_, State>, DriverResult<()>) {
        let mut state = self.lock();
        state.calls.push(call);
        let outcome = state.take_failure(op);
        (state, outcome)
    }
}

impl MultiplexerDriver for ScriptedDriver {
    fn has_session(&self, name: &str) -> DriverResult<bool> {
        let (state, outcome) = self.begin(DriverOp::HasSession, DriverCall::HasSession(name.into()));
        outcome?;
        Ok(state.sessions.contains_key(name))
    }

    fn new_session(
        &self,
        name: &str,
        default_window_name: &str,
        _start_dir: &Path,
    ) -> DriverResult<SessionHandle> {
        let (mut state, outcome) = self.begin(
            DriverOp::NewSession,
            DriverCall::NewSession {
                name: name.into(),
                window_name: default_window_name.into(),
            },
        );
        outcome?;
        if state.sessions.contains_key(name) {
            return Err(DriverError::new("new-session", format!("duplicate session: {name}")));
        }
        let handle = SessionHandle::new(format!("${}", state.next_id()));
        state
            .sessions
            .insert(name.to_string(), FakeSession::new(handle.clone()));
        state.add_window(name, default_window_name);
        Ok(handle)
    }

    fn get_session(&self, name: &str) -> DriverResult<SessionHandle> {
        let (state, outcome) = self.begin(DriverOp::GetSession, DriverCall::GetSession(name.into()));
        outcome?;
        state
            .sessions
            .get(name)
            .map(|s| s.handle.clone())
            .ok_or_else(|| DriverError::new("list-sessions", format!("can't find session: {name}")))
    }

    fn active_window(&self, session: &SessionHandle) -> DriverResult<WindowHandle> {
        let (mut state, outcome) =
            self.begin(DriverOp::ActiveWindow, DriverCall::ActiveWindow(session.clone()));
        outcome?;
        state
            .session_by_handle(session)
            .and_then(|(_, s)| s.active.clone())
            .ok_or_else(|| DriverError::new("display-message", format!("can't find session: {session}")))
    }

    fn new_window(&self, session: &SessionHandle, name: &str) -> DriverResult<WindowHandle> {
        let (mut state, outcome) = self.begin(
            DriverOp::NewWindow,
            DriverCall::NewWindow {
                session: session.clone(),
                name: name.into(),
            },
        );
        outcome?;
        let session_name = state
            .session_by_handle(session)
            .map(|(n, _)| n.clone())
            .ok_or_else(|| DriverError::new("new-window", format!("can't find session: {session}")))?;
        Ok(state.add_window(&session_name, name))
    }

    fn resize_window(&self, window: &WindowHandle, height: u16, width: u16) -> DriverResult<()> {
        let (mut state, outcome) = self.begin(
            DriverOp::ResizeWindow,
            DriverCall::ResizeWindow {
                window: window.clone(),
                height,
                width,
            },
        );
        outcome?;
        state.window_mut(window, DriverOp::ResizeWindow).map(|_| ())
    }

    fn select_layout(&self, window: &WindowHandle, layout: &str) -> DriverResult<()> {
        let (mut state, outcome) = self.begin(
            DriverOp::SelectLayout,
            DriverCall::SelectLayout {
                window: window.clone(),
                layout: layout.into(),
            },
        );
        outcome?;
        state.window_mut(window, DriverOp::SelectLayout).map(|_| ())
    }

    fn set_window_option(
        &self,
        window: &WindowHandle,
        key: &str,
        value: &str,
    ) -> DriverResult<()> {
        let (mut state, outcome) = self.begin(
            DriverOp::SetWindowOption,
            DriverCall::SetWindowOption {
                window: window.clone(),
                key: key.into(),
                value: value.into(),
            },
        );
        outcome?;
        state
            .window_mut(window, DriverOp::SetWindowOption)?
            .options
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_window_option(&self, window: &WindowHandle, key: &str) -> DriverResult<String> {
        let (mut state, outcome) = self.begin(
            DriverOp::GetWindowOption,
            DriverCall::GetWindowOption {
                window: window.clone(),
                key: key.into(),
            },
        );
        outcome?;
        Ok(state
            .window_mut(window, DriverOp::GetWindowOption)?
            .options
            .get(key)
            .cloned()
            .unwrap_or_else(|| "off".to_string()))
    }

    fn split_window(&self, window: &WindowHandle, vertical: bool) -> DriverResult<PaneHandle> {
        let (mut state, outcome) = self.begin(
            DriverOp::SplitWindow,
            DriverCall::SplitWindow {
                window: window.clone(),
                vertical,
            },
        );
        outcome?;
        let limit = state.pane_limit;
        let pane = PaneHandle::new(format!("%{}", state.next_id()));
        let target = state.window_mut(window, DriverOp::SplitWindow)?;
        if limit.is_some_and(|limit| target.panes.len() >= limit) {
            return Err(DriverError::new("split-window", "no space for new pane"));
        }
        target.panes.push(pane.clone());
        Ok(pane)
    }

    fn attached_pane(&self, window: &WindowHandle) -> DriverResult<PaneHandle> {
        let (mut state, outcome) =
            self.begin(DriverOp::AttachedPane, DriverCall::AttachedPane(window.clone()));
        outcome?;
        state
            .window_mut(window, DriverOp::AttachedPane)?
            .panes
            .first()
            .cloned()
            .ok_or_else(|| DriverError::new("display-message", format!("can't find pane in {window}")))
    }

    fn set_pane_title(&self, pane: &PaneHandle, title: &str) -> DriverResult<()> {
        let (state, outcome) = self.begin(
            DriverOp::SetPaneTitle,
            DriverCall::SetPaneTitle {
                pane: pane.clone(),
                title: title.into(),
            },
        );
        outcome?;
        if !state.pane_exists(pane) {
            return Err(DriverError::new("select-pane", format!("can't find pane: {pane}")));
        }
        Ok(())
    }

    fn send_keys(&self, pane: &PaneHandle, text: &str, submit: bool) -> DriverResult<()> {
        let (state, outcome) = self.begin(
            DriverOp::SendKeys,
            DriverCall::SendKeys {
                pane: pane.clone(),
                text: text.into(),
                submit,
            },
        );
        outcome?;
        if !state.pane_exists(pane) {
            return Err(DriverError::new("send-keys", format!("can't find pane: {pane}")));
        }
        Ok(())
    }

    fn kill_session(&self, session: &SessionHandle) -> DriverResult<()> {
        let (mut state, outcome) =
            self.begin(DriverOp::KillSession, DriverCall::KillSession(session.clone()));
        outcome?;
        let name = state
            .session_by_handle(session)
            .map(|(n, _)| n.clone())
            .ok_or_else(|| DriverError::new("kill-session", format!("can't find session: {session}")))?;
        if let Some(removed) = state.sessions.remove(&name) {
            for window in removed.windows {
                state.windows.remove(&window);
            }
        }
        Ok(())
    }

    fn window_name(&self, window: &WindowHandle) -> DriverResult<String> {
        let (mut state, outcome) =
            self.begin(DriverOp::WindowName, DriverCall::WindowName(window.clone()));
        outcome?;
        Ok(state.window_mut(window, DriverOp::WindowName)?.name.clone())
    }

    fn list_sessions(&self) -> DriverResult<Vec<SessionSummary>> {
        let (state, outcome) = self.begin(DriverOp::ListSessions, DriverCall::ListSessions);
        outcome?;
        Ok(state
            .sessions
            .iter()
            .map(|(name, s)| SessionSummary {
                name: name.clone(),
                handle: s.handle.clone(),
                windows: s.windows.len(),
                attached: false,
                created: None,
            })
            .collect())
    }

    fn bind_key(&self, key: &str, command: &[String]) -> DriverResult<()> {
        let (_state, outcome) = self.begin(
            DriverOp::BindKey,
            DriverCall::BindKey {
                key: key.into(),
                command: command.to_vec(),
            },
        );
        outcome
    }
}

/// Launcher that records commands instead of opening windows.
#[derive(Debug, Clone, Default)]
pub struct RecordingLauncher {
    launched: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingLauncher {
    /// Launcher that accepts every command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Launcher that rejects every command.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Commands launched so far.
    pub fn launched(&self) -> Vec<String> {
        self.launched
            .lock()
            .map(|l| l.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl TerminalLauncher for RecordingLauncher {
    fn launch(&self, command: &str) -> Result<TerminalHandle> {
        if self.fail {
            return Err(sshplex_core::Error::TerminalLaunch(
                "no terminal emulator available".to_string(),
            ));
        }
        self.launched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.to_string());
        Ok(TerminalHandle::new(0, "recording"))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_default_window_and_pane() {
        let driver = ScriptedDriver::new();
        let session = driver
            .new_session("ops", "sshplex", Path::new("/tmp"))
            .unwrap();
        let window = driver.active_window(&session).unwrap();
        assert_eq!(driver.windows_of("ops"), vec![window.clone()]);
        assert_eq!(driver.panes_of(&window).len(), 1);
        assert!(driver.has_session("ops").unwrap());
    }

    #[test]
    fn test_fail_next_is_consumed() {
        let driver = ScriptedDriver::new();
        let session = driver.new_session("ops", "w", Path::new("/")).unwrap();
        let window = driver.active_window(&session).unwrap();

        driver.fail_next(DriverOp::SplitWindow, 1, "no space for new pane");
        let err = driver.split_window(&window, true).unwrap_err();
        assert!(err.is_no_space());
        assert!(driver.split_window(&window, true).is_ok());
    }

    #[test]
    fn test_pane_limit() {
        let driver = ScriptedDriver::new().with_pane_limit(2);
        let session = driver.new_session("ops", "w", Path::new("/")).unwrap();
        let window = driver.active_window(&session).unwrap();
        driver.split_window(&window, true).unwrap();
        assert!(driver.split_window(&window, false).unwrap_err().is_no_space());
    }

    #[test]
    fn test_mutation_filter() {
        let driver = ScriptedDriver::new().with_existing_session("ops");
        driver.has_session("ops").unwrap();
        driver.list_sessions().unwrap();
        assert!(driver.mutations().is_empty());
        assert_eq!(driver.calls().len(), 2);
    }

    #[test]
    fn test_window_names() {
        let driver = ScriptedDriver::new().with_existing_session("other");
        let adopted = driver.get_session("other").unwrap();
        let first = driver.active_window(&adopted).unwrap();
        assert_eq!(driver.window_name(&first).unwrap(), "bash");

        let session = driver.new_session("ops", "sshplex", Path::new("/")).unwrap();
        let window = driver.new_window(&session, "web-01").unwrap();
        assert_eq!(driver.window_name(&window).unwrap(), "web-01");
        assert!(!DriverCall::WindowName(window).is_mutation());
    }

    #[test]
    fn test_kill_externally() {
        let driver = ScriptedDriver::new().with_existing_session("ops");
        let session = driver.get_session("ops").unwrap();
        driver.kill_externally("ops");
        assert!(!driver.has_session("ops").unwrap());
        assert!(driver.kill_session(&session).unwrap_err().is_not_found());
    }

    #[test]
    fn test_recording_launcher() {
        let launcher = RecordingLauncher::new();
        launcher.launch("tmux attach-session -t ops").unwrap();
        assert_eq!(launcher.launched(), vec!["tmux attach-session -t ops"]);
        assert!(RecordingLauncher::failing().launch("x").is_err());
    }
}
