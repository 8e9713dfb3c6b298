//! Broadcast (synchronized input) across the panes of a window.
//!
//! Only windows holding more than one pane qualify; synchronizing a single
//! pane is meaningless. Per-window failures are logged and skipped, since any
//! stored handle may have been killed by the user.

use tracing::{info, warn};

use sshplex_core::WindowHandle;

use crate::driver::MultiplexerDriver;
use crate::topology::{SessionTopology, WindowEntry};

/// tmux window option that mirrors keystrokes to every pane.
pub const SYNC_OPTION: &str = "synchronize-panes";

/// Key (after the prefix) bound to the interactive broadcast toggle.
pub const TOGGLE_KEY: &str = "b";

/// Broadcast operation requested by an outer surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAction {
    /// Turn synchronization on
    Enable,
    /// Turn synchronization off
    Disable,
    /// Invert the current state
    Toggle,
}

impl std::str::FromStr for BroadcastAction {
    type Err = sshplex_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enable" | "on" => Ok(BroadcastAction::Enable),
            "disable" | "off" => Ok(BroadcastAction::Disable),
            "toggle" => Ok(BroadcastAction::Toggle),
            other => Err(sshplex_core::Error::InvalidInput(format!(
                "unknown broadcast action '{other}'"
            ))),
        }
    }
}

/// Stateless controller for the `synchronize-panes` option.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastController;

impl BroadcastController {
    /// Create a controller.
    pub fn new() -> Self {
        Self
    }

    /// Turn broadcast on for every qualifying window.
    ///
    /// Returns `true` when at least one window was switched on.
    pub fn enable<'a, D, I>(&self, driver: &D, windows: I) -> bool
    where
        D: MultiplexerDriver + ?Sized,
        I: IntoIterator<Item = &'a WindowEntry>,
    {
        self.set_all(driver, qualifying(windows), true)
    }

    /// Turn broadcast off for every qualifying window.
    pub fn disable<'a, D, I>(&self, driver: &D, windows: I) -> bool
    where
        D: MultiplexerDriver + ?Sized,
        I: IntoIterator<Item = &'a WindowEntry>,
    {
        self.set_all(driver, qualifying(windows), false)
    }

    /// Invert broadcast for every qualifying window.
    ///
    /// The current state is sampled from the first qualifying window only and
    /// the inverse is applied to all of them, so windows that disagree end up
    /// aligned rather than individually flipped. A failed sample reads as off.
    pub fn toggle<'a, D, I>(&self, driver: &D, windows: I) -> bool
    where
        D: MultiplexerDriver + ?Sized,
        I: IntoIterator<Item = &'a WindowEntry>,
    {
        let windows = qualifying(windows);
        let Some(first) = windows.first() else {
            info!("No multi-pane windows to toggle broadcast on");
            return false;
        };

        let currently_on = self.is_enabled(driver, &first.handle);
        self.set_all(driver, windows, !currently_on)
    }

    /// Read the option for one window. Errors read as off.
    pub fn is_enabled<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        window: &WindowHandle,
    ) -> bool {
        match driver.get_window_option(window, SYNC_OPTION) {
            Ok(value) => value.trim().eq_ignore_ascii_case("on"),
            Err(e) => {
                warn!("Could not read {} of window {}: {}", SYNC_OPTION, window, e);
                false
            }
        }
    }

    /// Per-window broadcast state for the qualifying windows of a topology.
    pub fn status<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        topology: &SessionTopology,
    ) -> Vec<(usize, bool)> {
        qualifying(topology.windows())
            .into_iter()
            .map(|w| (w.index, self.is_enabled(driver, &w.handle)))
            .collect()
    }

    /// Bind `prefix + b` to flip broadcast on the current window.
    pub fn install_toggle_binding<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
    ) -> sshplex_core::Result<()> {
        driver.bind_key(TOGGLE_KEY, &toggle_binding_command())?;
        info!("Bound prefix + {} to broadcast toggle", TOGGLE_KEY);
        Ok(())
    }

    fn set_all<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        windows: Vec<&WindowEntry>,
        on: bool,
    ) -> bool {
        let value = if on { "on" } else { "off" };
        let mut affected = 0;

        for window in &windows {
            match driver.set_window_option(&window.handle, SYNC_OPTION, value) {
                Ok(()) => affected += 1,
                Err(e) => warn!(
                    "Skipping window {} for broadcast {}: {}",
                    window.index, value, e
                ),
            }
        }

        if affected > 0 {
            info!("Broadcast {} for {}/{} windows", value, affected, windows.len());
        }
        affected > 0
    }
}

fn qualifying<'a, I>(windows: I) -> Vec<&'a WindowEntry>
where
    I: IntoIterator<Item = &'a WindowEntry>,
{
    windows.into_iter().filter(|w| w.pane_count > 1).collect()
}

/// tmux command run by the toggle binding.
fn toggle_binding_command() -> Vec<String> {
    vec![
        "if-shell".to_string(),
        "-F".to_string(),
        format!("#{{{SYNC_OPTION}}}"),
        format!("set-window-option {SYNC_OPTION} off ; display-message \"Broadcast OFF\""),
        format!("set-window-option {SYNC_OPTION} on ; display-message \"Broadcast ON\""),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DriverCall, DriverOp, ScriptedDriver};
    use sshplex_core::WindowHandle;

    fn entry(index: usize, handle: &WindowHandle, panes: usize) -> WindowEntry {
        WindowEntry {
            index,
            handle: handle.clone(),
            name: format!("sshplex-{index}"),
            pane_count: panes,
        }
    }

    fn driver_with_windows(count: usize) -> (ScriptedDriver, Vec<WindowHandle>) {
        let driver = ScriptedDriver::new().with_existing_session("plex");
        let session = driver.get_session("plex").unwrap();
        for i in 1..count {
            driver.new_window(&session, &format!("w{i}")).unwrap();
        }
        let windows = driver.windows_of("plex");
        driver.clear_calls();
        (driver, windows)
    }

    #[test]
    fn test_no_qualifying_windows() {
        let (driver, handles) = driver_with_windows(1);
        let windows = vec![entry(0, &handles[0], 1)];
        let controller = BroadcastController::new();

        assert!(!controller.enable(&driver, &windows));
        assert!(!controller.toggle(&driver, &windows));
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn test_enable_and_disable() {
        let (driver, handles) = driver_with_windows(2);
        let windows = vec![entry(0, &handles[0], 3), entry(1, &handles[1], 1)];
        let controller = BroadcastController::new();

        assert!(controller.enable(&driver, &windows));
        assert_eq!(driver.option(&handles[0], SYNC_OPTION).as_deref(), Some("on"));
        assert_eq!(driver.option(&handles[1], SYNC_OPTION), None);

        assert!(controller.disable(&driver, &windows));
        assert_eq!(driver.option(&handles[0], SYNC_OPTION).as_deref(), Some("off"));
    }

    #[test]
    fn test_stale_window_is_skipped() {
        let (driver, handles) = driver_with_windows(2);
        let stale = WindowHandle::new("@999");
        let windows = vec![entry(0, &stale, 2), entry(1, &handles[1], 2)];

        assert!(BroadcastController::new().enable(&driver, &windows));
        assert_eq!(driver.option(&handles[1], SYNC_OPTION).as_deref(), Some("on"));
    }

    #[test]
    fn test_toggle_failed_sample_reads_off() {
        let (driver, handles) = driver_with_windows(1);
        let windows = vec![entry(0, &handles[0], 2)];
        driver.set_option(&handles[0], SYNC_OPTION, "on");
        driver.fail_next(DriverOp::GetWindowOption, 1, "server exited unexpectedly");

        assert!(BroadcastController::new().toggle(&driver, &windows));
        assert_eq!(driver.option(&handles[0], SYNC_OPTION).as_deref(), Some("on"));
    }

    #[test]
    fn test_toggle_binding() {
        let driver = ScriptedDriver::new();
        BroadcastController::new()
            .install_toggle_binding(&driver)
            .unwrap();

        match &driver.calls()[0] {
            DriverCall::BindKey { key, command } => {
                assert_eq!(key, "b");
                assert_eq!(command[0], "if-shell");
                assert_eq!(command[2], "#{synchronize-panes}");
                assert!(command[3].contains("Broadcast OFF"));
                assert!(command[4].contains("Broadcast ON"));
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("enable".parse::<BroadcastAction>().unwrap(), BroadcastAction::Enable);
        assert_eq!("OFF".parse::<BroadcastAction>().unwrap(), BroadcastAction::Disable);
        assert_eq!("toggle".parse::<BroadcastAction>().unwrap(), BroadcastAction::Toggle);
        assert!("flip".parse::<BroadcastAction>().is_err());
    }
}
