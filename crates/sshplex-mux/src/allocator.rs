//! Pane placement policy.
//!
//! Fills the active window up to its capacity, reusing the default pane of a
//! fresh window and splitting otherwise. A failed split walks an explicit
//! fallback chain ([`FallbackStep::CHAIN`]) and every attempt is recorded, so
//! a host is either placed or reported with the reason it was not.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use sshplex_core::{
    DriverError, Error, FallbackStep, PaneHandle, Result, SessionHandle, SplitAttempt,
    SplitOrientation, TmuxSettings, WindowHandle, WindowSize,
};

use crate::driver::MultiplexerDriver;
use crate::topology::SessionTopology;

/// Default pane capacity of a window.
pub const DEFAULT_CAPACITY: usize = 5;

/// Default layout applied after every placement.
pub const DEFAULT_LAYOUT: &str = "tiled";

/// Where a host ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Host key that was placed
    pub host_key: String,
    /// Pane bound to the host
    pub pane: PaneHandle,
    /// Local index of the window holding the pane
    pub window_index: usize,
    /// Split attempts made (empty when a default pane was reused)
    pub attempts: Vec<SplitAttempt>,
    /// Whether an earlier pane for the same host key was replaced
    pub replaced: bool,
}

impl Placement {
    /// Whether a fallback step beyond the direct split was needed.
    pub fn used_fallback(&self) -> bool {
        self.attempts.iter().any(|a| a.step != FallbackStep::Direct)
    }
}

/// Greedy first-fit pane allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneAllocator {
    capacity: usize,
    fallback_size: WindowSize,
    layout: String,
}

impl Default for PaneAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PaneAllocator {
    /// Allocator with the given per-window capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            fallback_size: WindowSize::default(),
            layout: DEFAULT_LAYOUT.to_string(),
        }
    }

    /// Allocator configured from the tmux settings section.
    pub fn from_settings(settings: &TmuxSettings) -> Self {
        Self::new(settings.max_panes_per_window)
            .with_fallback_size(settings.fallback_size())
            .with_layout(settings.layout.clone())
    }

    /// Size requested by the resize fallback.
    pub fn with_fallback_size(mut self, size: WindowSize) -> Self {
        self.fallback_size = size;
        self
    }

    /// Layout applied after every placement.
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Pane capacity of a window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Layout name.
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Place `host_key` into the session, optionally typing `command` into
    /// the new pane.
    ///
    /// Driver calls happen in the order: split (or default-pane reuse),
    /// layout, title, command. Once the pane exists it stays registered and
    /// counted even if a later call fails; that failure surfaces as
    /// [`Error::Driver`].
    pub fn place<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        session: Option<&SessionHandle>,
        topology: &mut SessionTopology,
        host_key: &str,
        command: Option<&str>,
    ) -> Result<Placement> {
        let session = session.ok_or(Error::NoSession)?;
        info!("Placing pane for host '{}'", host_key);

        let mut window_index = match topology.active_window() {
            Some(index) if topology.pane_count(index) < self.capacity => index,
            Some(index) => {
                info!(
                    "Window {} reached capacity ({}), opening a new window",
                    index, self.capacity
                );
                self.open_window(driver, session, topology)
                    .map_err(Error::WindowCreateFailed)?
            }
            None => self
                .open_window(driver, session, topology)
                .map_err(Error::WindowCreateFailed)?,
        };

        let count = topology.pane_count(window_index);
        let mut attempts = Vec::new();
        let pane = if count == 0 {
            let window = topology.window(window_index)?.handle.clone();
            driver.attached_pane(&window)?
        } else {
            let (pane, index) = self.split_with_fallback(
                driver,
                session,
                topology,
                window_index,
                host_key,
                &mut attempts,
            )?;
            window_index = index;
            pane
        };

        let replaced = topology
            .register_pane(host_key, pane.clone(), window_index)?
            .is_some();
        if replaced {
            warn!("Host '{}' already had a pane, replacing the mapping", host_key);
        }
        let placed = topology.increment_pane_count(window_index)?;

        let window = topology.window(window_index)?.handle.clone();
        driver.select_layout(&window, &self.layout)?;
        driver.set_pane_title(&pane, host_key)?;
        if let Some(command) = command.filter(|c| !c.is_empty()) {
            driver.send_keys(&pane, command, true)?;
        }

        info!(
            "Placed '{}' in window {} ({}/{} panes)",
            host_key, window_index, placed, self.capacity
        );

        Ok(Placement {
            host_key: host_key.to_string(),
            pane,
            window_index,
            attempts,
            replaced,
        })
    }

    /// Place `host_key` in a window of its own, named after the host.
    ///
    /// No capacity logic, layout or title. The active window is left alone so
    /// pane placements keep filling the window they were filling.
    pub fn place_in_new_window<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        session: Option<&SessionHandle>,
        topology: &mut SessionTopology,
        host_key: &str,
        command: Option<&str>,
    ) -> Result<Placement> {
        let session = session.ok_or(Error::NoSession)?;

        let window_index = topology.window_count();
        let window = driver
            .new_window(session, host_key)
            .map_err(Error::WindowCreateFailed)?;
        topology.register_window(window_index, window.clone(), host_key)?;

        let pane = driver.attached_pane(&window)?;
        let replaced = topology
            .register_pane(host_key, pane.clone(), window_index)?
            .is_some();
        topology.increment_pane_count(window_index)?;

        if let Some(command) = command.filter(|c| !c.is_empty()) {
            driver.send_keys(&pane, command, true)?;
        }

        info!("Opened window {} for '{}'", window_index, host_key);

        Ok(Placement {
            host_key: host_key.to_string(),
            pane,
            window_index,
            attempts: Vec::new(),
            replaced,
        })
    }

    /// Open `sshplex-<index>` and make it the active window.
    fn open_window<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        session: &SessionHandle,
        topology: &mut SessionTopology,
    ) -> std::result::Result<usize, DriverError> {
        let index = topology.window_count();
        let name = format!("sshplex-{index}");
        let handle = driver.new_window(session, &name)?;

        // Both calls only fail on a non-dense index, which window_count rules out
        if let Err(e) = topology
            .register_window(index, handle, name)
            .and_then(|_| topology.set_active_window(index))
        {
            return Err(DriverError::new("new-window", e.to_string()));
        }

        debug!("Opened window {}", index);
        Ok(index)
    }

    /// Walk the fallback chain until a split succeeds.
    ///
    /// Returns the new pane and the index of the window it landed in.
    fn split_with_fallback<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        session: &SessionHandle,
        topology: &mut SessionTopology,
        window_index: usize,
        host_key: &str,
        attempts: &mut Vec<SplitAttempt>,
    ) -> Result<(PaneHandle, usize)> {
        let orientation = SplitOrientation::for_pane_count(topology.pane_count(window_index));
        let window = topology.window(window_index)?.handle.clone();

        for step in FallbackStep::CHAIN {
            let (target_index, used, outcome) = match step {
                FallbackStep::Direct => (
                    window_index,
                    orientation,
                    self.split(driver, &window, orientation),
                ),
                FallbackStep::ResizeAndRetry => {
                    let size = self.fallback_size;
                    let outcome = driver
                        .resize_window(&window, size.height, size.width)
                        .and_then(|_| self.split(driver, &window, orientation));
                    (window_index, orientation, outcome)
                }
                FallbackStep::NewWindow => {
                    // Forced regardless of capacity; the new window keeps its default pane
                    let used = SplitOrientation::Vertical;
                    match self.open_window(driver, session, topology) {
                        Ok(index) => {
                            let handle = topology.window(index)?.handle.clone();
                            (index, used, self.split(driver, &handle, used))
                        }
                        Err(e) => (topology.window_count(), used, Err(e)),
                    }
                }
            };

            match outcome {
                Ok(pane) => {
                    attempts.push(SplitAttempt::succeeded(step, used, target_index));
                    return Ok((pane, target_index));
                }
                Err(e) => {
                    warn!("Split step {} failed for '{}': {}", step, host_key, e);
                    attempts.push(SplitAttempt::failed(step, used, target_index, e));
                }
            }
        }

        error!(
            "Placement exhausted for '{}' after {} attempts",
            host_key,
            attempts.len()
        );
        Err(Error::PlacementExhausted {
            host: host_key.to_string(),
            attempts: std::mem::take(attempts),
        })
    }

    fn split<D: MultiplexerDriver + ?Sized>(
        &self,
        driver: &D,
        window: &WindowHandle,
        orientation: SplitOrientation,
    ) -> std::result::Result<PaneHandle, DriverError> {
        driver.split_window(window, orientation.is_vertical())
    }
}
