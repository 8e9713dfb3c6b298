//! Connector: the entry point used by the CLI and the MCP server.
//!
//! Owns the lifecycle, topology and allocator of one session and places a
//! batch of hosts, one at a time. A failing host never aborts the batch.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use sshplex_core::{
    ConnectionParams, Error, HostRecord, Ownership, Result, SessionName, SessionState,
    TmuxSettings,
};

use crate::allocator::{PaneAllocator, Placement};
use crate::broadcast::{BroadcastAction, BroadcastController};
use crate::driver::MultiplexerDriver;
use crate::lifecycle::{AttachOutcome, SessionLifecycle};
use crate::topology::SessionTopology;
use crate::visual::{TerminalLauncher, TerminalRegistry};

/// How hosts are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    /// Pack hosts into panes, several per window
    #[default]
    Panes,
    /// One window per host
    Windows,
}

/// Shared flag that stops a batch before its next host.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A host that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostFailure {
    /// Host key
    pub host: String,
    /// Why placement failed
    pub error: String,
}

/// Outcome of a `connect_to_hosts` batch.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectReport {
    /// Session the hosts were placed in
    pub session_name: String,
    /// Hosts requested
    pub total: usize,
    /// Hosts placed, in order
    pub placements: Vec<Placement>,
    /// Hosts that failed
    pub failures: Vec<HostFailure>,
    /// Hosts not attempted because the batch was cancelled
    pub skipped: Vec<String>,
    /// Whether broadcast ended up enabled (None when not requested)
    pub broadcast: Option<bool>,
}

impl ConnectReport {
    /// Number of hosts placed.
    pub fn connected(&self) -> usize {
        self.placements.len()
    }

    /// Whether every requested host was placed.
    pub fn is_success(&self) -> bool {
        self.connected() == self.total
    }
}

impl fmt::Display for ConnectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} hosts connected", self.connected(), self.total)
    }
}

/// Window as reported by [`SessionInfo`].
#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    /// Local window index
    pub index: usize,
    /// Window name
    pub name: String,
    /// Panes placed into the window
    pub pane_count: usize,
    /// Host keys in the window
    pub hosts: Vec<String>,
}

/// Snapshot of the owned session for the outer surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Session name
    pub name: String,
    /// Lifecycle state
    pub state: SessionState,
    /// Created here or adopted
    pub ownership: Option<Ownership>,
    /// Active window index
    pub active_window: Option<usize>,
    /// Tracked windows
    pub windows: Vec<WindowInfo>,
    /// Command to attach manually
    pub attach_command: String,
}

/// Places hosts into one multiplexer session.
pub struct Connector<D: MultiplexerDriver> {
    driver: D,
    lifecycle: SessionLifecycle,
    topology: SessionTopology,
    allocator: PaneAllocator,
    broadcast: BroadcastController,
    launcher: Box<dyn TerminalLauncher>,
    cancel: CancelFlag,
}

impl<D: MultiplexerDriver> Connector<D> {
    /// Connector for `name` configured from the tmux settings.
    pub fn new(driver: D, name: SessionName, settings: &TmuxSettings) -> Self {
        let lifecycle = SessionLifecycle::new(name)
            .with_start_directory(settings.start_directory_path())
            .with_control_mode(settings.control_mode)
            .with_tmux_server(settings.binary.clone(), settings.socket_name.clone());
        let launcher = TerminalRegistry::new().with_preferred(settings.terminal.clone());

        Self {
            driver,
            lifecycle,
            topology: SessionTopology::new(),
            allocator: PaneAllocator::from_settings(settings),
            broadcast: BroadcastController::new(),
            launcher: Box::new(launcher),
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the terminal launcher used by auto-attach.
    pub fn with_launcher(mut self, launcher: impl TerminalLauncher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    /// Replace the allocator.
    pub fn with_allocator(mut self, allocator: PaneAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    /// Flag that stops the current batch before its next host.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Session name, the only externally visible identifier.
    pub fn get_session_name(&self) -> &SessionName {
        self.lifecycle.name()
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Current topology.
    pub fn topology(&self) -> &SessionTopology {
        &self.topology
    }

    /// Underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Create the session (if needed) and place every host.
    ///
    /// Per-host failures are logged and reported, never propagated. Only a
    /// failure to create the session is an error.
    pub fn connect_to_hosts(
        &mut self,
        hosts: &[HostRecord],
        params: &ConnectionParams,
        mode: PlacementMode,
        use_broadcast: bool,
    ) -> Result<ConnectReport> {
        self.lifecycle.create(&self.driver, &mut self.topology)?;
        info!(
            "Connecting {} hosts to session '{}' ({:?})",
            hosts.len(),
            self.lifecycle.name(),
            mode
        );

        let mut report = ConnectReport {
            session_name: self.lifecycle.name().to_string(),
            total: hosts.len(),
            placements: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            broadcast: None,
        };

        for host in hosts {
            if self.cancel.is_cancelled() {
                warn!("Connect cancelled, skipping '{}'", host.key());
                report.skipped.push(host.key().to_string());
                continue;
            }

            let command = params.ssh_command(host);
            let session = self.lifecycle.session();
            let outcome = match mode {
                PlacementMode::Panes => self.allocator.place(
                    &self.driver,
                    session,
                    &mut self.topology,
                    host.key(),
                    Some(&command),
                ),
                PlacementMode::Windows => self.allocator.place_in_new_window(
                    &self.driver,
                    session,
                    &mut self.topology,
                    host.key(),
                    Some(&command),
                ),
            };

            match outcome {
                Ok(placement) => report.placements.push(placement),
                Err(e) => {
                    error!("Failed to place '{}': {}", host.key(), e);
                    report.failures.push(HostFailure {
                        host: host.key().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if use_broadcast {
            let touched: BTreeSet<usize> =
                report.placements.iter().map(|p| p.window_index).collect();
            let windows = self.topology.windows().filter(|w| touched.contains(&w.index));
            report.broadcast = Some(self.broadcast.enable(&self.driver, windows));
        }

        if report.is_success() {
            info!("{}", report);
        } else {
            warn!("{}", report);
        }
        Ok(report)
    }

    /// Attach to the session (see [`SessionLifecycle::attach`]).
    pub fn attach_to_session(&mut self, auto: bool) -> Result<AttachOutcome> {
        self.lifecycle
            .attach(&self.driver, auto, self.launcher.as_ref())
    }

    /// Apply a broadcast action to every multi-pane window.
    pub fn broadcast(&self, action: BroadcastAction) -> Result<bool> {
        self.require_session()?;
        let windows = self.topology.windows();
        Ok(match action {
            BroadcastAction::Enable => self.broadcast.enable(&self.driver, windows),
            BroadcastAction::Disable => self.broadcast.disable(&self.driver, windows),
            BroadcastAction::Toggle => self.broadcast.toggle(&self.driver, windows),
        })
    }

    /// Broadcast state per multi-pane window.
    pub fn broadcast_status(&self) -> Result<Vec<(usize, bool)>> {
        self.require_session()?;
        Ok(self.broadcast.status(&self.driver, &self.topology))
    }

    /// Re-apply the layout to every multi-pane window.
    ///
    /// Returns `true` when at least one window was re-laid out.
    pub fn relayout(&self) -> bool {
        let mut applied = false;
        for window in self.topology.windows().filter(|w| w.pane_count > 1) {
            match self.driver.select_layout(&window.handle, self.allocator.layout()) {
                Ok(()) => applied = true,
                Err(e) => warn!("Could not re-layout window {}: {}", window.index, e),
            }
        }
        applied
    }

    /// Type a command into one host's pane and press Enter.
    pub fn send_command(&self, host_key: &str, command: &str) -> Result<()> {
        self.require_session()?;
        let pane = self.topology.find_pane(host_key)?;
        self.driver.send_keys(pane, command, true)?;
        Ok(())
    }

    /// Type a command into every host's pane; returns how many accepted it.
    pub fn broadcast_command(&self, command: &str) -> Result<usize> {
        self.require_session()?;
        let hosts: Vec<String> = self
            .topology
            .windows()
            .flat_map(|w| self.topology.hosts_in_window(w.index))
            .map(str::to_string)
            .collect();

        let mut sent = 0;
        for host in &hosts {
            match self.send_command(host, command) {
                Ok(()) => sent += 1,
                Err(e) => warn!("Could not send to '{}': {}", host, e),
            }
        }
        info!("Command sent to {}/{} panes", sent, hosts.len());
        Ok(sent)
    }

    /// Close the session and forget its topology.
    pub fn close(&mut self) -> Result<()> {
        self.lifecycle.close(&self.driver, &mut self.topology)
    }

    /// Snapshot of the session for reporting.
    pub fn session_info(&self) -> SessionInfo {
        SessionInfo {
            name: self.lifecycle.name().to_string(),
            state: self.lifecycle.state(),
            ownership: self.lifecycle.ownership(),
            active_window: self.topology.active_window(),
            windows: self
                .topology
                .windows()
                .map(|w| WindowInfo {
                    index: w.index,
                    name: w.name.clone(),
                    pane_count: w.pane_count,
                    hosts: self
                        .topology
                        .hosts_in_window(w.index)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
            attach_command: self.lifecycle.manual_attach_command(),
        }
    }

    fn require_session(&self) -> Result<()> {
        self.lifecycle.session().map(|_| ()).ok_or(Error::NoSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DriverCall, DriverOp, RecordingLauncher, ScriptedDriver};

    fn connector(capacity: usize) -> (Connector<ScriptedDriver>, ScriptedDriver) {
        let driver = ScriptedDriver::new();
        let settings = TmuxSettings {
            max_panes_per_window: capacity,
            start_directory: "/tmp".to_string(),
            ..Default::default()
        };
        let connector = Connector::new(
            driver.clone(),
            SessionName::parse("plex").unwrap(),
            &settings,
        )
        .with_launcher(RecordingLauncher::new());
        (connector, driver)
    }

    fn hosts(names: &[&str]) -> Vec<HostRecord> {
        names.iter().map(|n| HostRecord::new(*n)).collect()
    }

    #[test]
    fn test_connect_report() {
        let (mut connector, _driver) = connector(5);
        let report = connector
            .connect_to_hosts(
                &hosts(&["a", "b", "c"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.to_string(), "3/3 hosts connected");
        assert_eq!(report.broadcast, None);
        assert_eq!(connector.topology().pane_count(0), 3);
    }

    #[test]
    fn test_failed_host_does_not_abort_batch() {
        let (mut connector, driver) = connector(5);
        driver.fail_next(DriverOp::SplitWindow, 3, "no space for new pane");

        let report = connector
            .connect_to_hosts(
                &hosts(&["a", "b", "c"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.to_string(), "2/3 hosts connected");
        assert_eq!(report.failures[0].host, "b");
    }

    #[test]
    fn test_ssh_command_is_typed() {
        let (mut connector, driver) = connector(5);
        let params = ConnectionParams::new("admin", "", 2222);
        connector
            .connect_to_hosts(
                &[HostRecord::new("web").with_ip("10.0.0.5")],
                &params,
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        assert!(driver.calls().iter().any(|c| matches!(
            c,
            DriverCall::SendKeys { text, .. } if text == "ssh -p 2222 admin@10.0.0.5"
        )));
    }

    #[test]
    fn test_cancel_skips_remaining_hosts() {
        let (mut connector, _driver) = connector(5);
        connector.cancel_flag().cancel();

        let report = connector
            .connect_to_hosts(
                &hosts(&["a", "b"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        assert_eq!(report.connected(), 0);
        assert_eq!(report.skipped, vec!["a", "b"]);
    }

    #[test]
    fn test_broadcast_applies_to_touched_windows() {
        let (mut connector, driver) = connector(2);
        let report = connector
            .connect_to_hosts(
                &hosts(&["a", "b", "c"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                true,
            )
            .unwrap();

        assert_eq!(report.broadcast, Some(true));
        let window0 = &connector.topology().window(0).unwrap().handle;
        let window1 = &connector.topology().window(1).unwrap().handle;
        assert_eq!(driver.option(window0, "synchronize-panes").as_deref(), Some("on"));
        // single-pane window does not qualify
        assert_eq!(driver.option(window1, "synchronize-panes"), None);

        // broadcast is switched on only once every host is placed
        let calls = driver.calls();
        let last_placement = calls
            .iter()
            .rposition(|c| matches!(c, DriverCall::SplitWindow { .. } | DriverCall::SendKeys { .. }))
            .unwrap();
        let first_option = calls
            .iter()
            .position(|c| matches!(c, DriverCall::SetWindowOption { .. }))
            .unwrap();
        assert!(first_option > last_placement);
    }

    #[test]
    fn test_window_mode() {
        let (mut connector, _driver) = connector(5);
        connector
            .connect_to_hosts(
                &hosts(&["a", "b"]),
                &ConnectionParams::default(),
                PlacementMode::Windows,
                false,
            )
            .unwrap();

        let info = connector.session_info();
        let names: Vec<_> = info.windows.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["sshplex", "a", "b"]);
    }

    #[test]
    fn test_pass_throughs_require_session() {
        let (connector, _driver) = connector(5);
        assert!(matches!(
            connector.broadcast(BroadcastAction::Enable),
            Err(Error::NoSession)
        ));
        assert!(matches!(
            connector.send_command("a", "uptime"),
            Err(Error::NoSession)
        ));
        assert!(!connector.relayout());
    }

    #[test]
    fn test_send_and_broadcast_command() {
        let (mut connector, _driver) = connector(2);
        connector
            .connect_to_hosts(
                &hosts(&["a", "b", "c"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        connector.send_command("b", "uptime").unwrap();
        assert!(matches!(
            connector.send_command("zz", "uptime"),
            Err(Error::PaneNotFound(_))
        ));
        assert_eq!(connector.broadcast_command("uptime").unwrap(), 3);
    }

    #[test]
    fn test_report_serializes() {
        let (mut connector, _driver) = connector(5);
        let report = connector
            .connect_to_hosts(
                &hosts(&["a"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["session_name"], "plex");
        assert_eq!(json["placements"][0]["host_key"], "a");
        assert_eq!(json["placements"][0]["window_index"], 0);

        let info = serde_json::to_value(connector.session_info()).unwrap();
        assert_eq!(info["state"], "created");
        assert_eq!(info["windows"][0]["hosts"][0], "a");
    }

    #[test]
    fn test_attach_targets_configured_socket() {
        let settings = TmuxSettings {
            binary: "/opt/tmux/bin/tmux".to_string(),
            socket_name: Some("sshplex-sock".to_string()),
            start_directory: "/tmp".to_string(),
            ..Default::default()
        };
        let mut connector = Connector::new(
            ScriptedDriver::new(),
            SessionName::parse("plex").unwrap(),
            &settings,
        )
        .with_launcher(RecordingLauncher::new());
        connector
            .connect_to_hosts(
                &hosts(&["a"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        let AttachOutcome::Launched { command, .. } = connector.attach_to_session(true).unwrap()
        else {
            panic!("expected a launched terminal");
        };
        assert!(command.contains("-L sshplex-sock"));
        assert!(command.starts_with("/opt/tmux/bin/tmux "));
        assert_eq!(
            connector.session_info().attach_command,
            "/opt/tmux/bin/tmux -L sshplex-sock attach-session -t plex"
        );
    }

    #[test]
    fn test_attach_and_close() {
        let (mut connector, _driver) = connector(5);
        connector
            .connect_to_hosts(
                &hosts(&["a"]),
                &ConnectionParams::default(),
                PlacementMode::Panes,
                false,
            )
            .unwrap();

        let outcome = connector.attach_to_session(true).unwrap();
        assert!(matches!(outcome, AttachOutcome::Launched { .. }));
        assert_eq!(connector.state(), SessionState::Attached);

        connector.close().unwrap();
        assert_eq!(connector.state(), SessionState::Closed);
        assert!(connector.topology().is_empty());
    }
}
