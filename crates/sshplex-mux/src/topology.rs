//! In-memory model of the owned session's windows and panes.
//!
//! Pure bookkeeping: no policy and no I/O. The allocator decides where panes
//! go, the topology remembers where they went.

use std::collections::HashMap;

use serde::Serialize;

use sshplex_core::{Error, PaneHandle, Result, WindowHandle};

/// A window tracked by the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowEntry {
    /// Local, dense, insertion-ordered index
    pub index: usize,
    /// Multiplexer handle (may be stale)
    pub handle: WindowHandle,
    /// Display name
    pub name: String,
    /// Panes placed into this window
    pub pane_count: usize,
}

/// A pane tracked by the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneEntry {
    /// Host key bound to the pane
    pub host_key: String,
    /// Multiplexer handle (may be stale)
    pub handle: PaneHandle,
    /// Index of the owning window
    pub window_index: usize,
}

/// Windows, panes and the active-window pointer of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionTopology {
    windows: Vec<WindowEntry>,
    panes: HashMap<String, PaneEntry>,
    active_window: Option<usize>,
}

impl SessionTopology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a window under the next local index.
    ///
    /// Indices are dense: `index` must equal the current window count.
    pub fn register_window(
        &mut self,
        index: usize,
        handle: WindowHandle,
        name: impl Into<String>,
    ) -> Result<()> {
        if index != self.windows.len() {
            return Err(Error::InvalidInput(format!(
                "window index {index} is not the next index ({})",
                self.windows.len()
            )));
        }

        self.windows.push(WindowEntry {
            index,
            handle,
            name: name.into(),
            pane_count: 0,
        });
        Ok(())
    }

    /// Bind a host key to a pane in a registered window.
    ///
    /// A second pane for the same host key replaces the mapping; the replaced
    /// entry is returned.
    pub fn register_pane(
        &mut self,
        host_key: impl Into<String>,
        handle: PaneHandle,
        window_index: usize,
    ) -> Result<Option<PaneEntry>> {
        if window_index >= self.windows.len() {
            return Err(Error::WindowNotFound(window_index));
        }

        let host_key = host_key.into();
        let entry = PaneEntry {
            host_key: host_key.clone(),
            handle,
            window_index,
        };
        Ok(self.panes.insert(host_key, entry))
    }

    /// Number of panes placed into a window (0 for unknown windows).
    pub fn pane_count(&self, window_index: usize) -> usize {
        self.windows
            .get(window_index)
            .map(|w| w.pane_count)
            .unwrap_or(0)
    }

    /// Increment a window's pane count, returning the new count.
    pub(crate) fn increment_pane_count(&mut self, window_index: usize) -> Result<usize> {
        let window = self
            .windows
            .get_mut(window_index)
            .ok_or(Error::WindowNotFound(window_index))?;
        window.pane_count += 1;
        Ok(window.pane_count)
    }

    /// Number of registered windows.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Number of host keys with a pane.
    pub fn pane_total(&self) -> usize {
        self.panes.len()
    }

    /// Look up the pane bound to a host key.
    pub fn find_pane(&self, host_key: &str) -> Result<&PaneHandle> {
        self.panes
            .get(host_key)
            .map(|p| &p.handle)
            .ok_or_else(|| Error::PaneNotFound(host_key.to_string()))
    }

    /// Full pane entry for a host key.
    pub fn pane(&self, host_key: &str) -> Option<&PaneEntry> {
        self.panes.get(host_key)
    }

    /// Window at a local index.
    pub fn window(&self, index: usize) -> Result<&WindowEntry> {
        self.windows.get(index).ok_or(Error::WindowNotFound(index))
    }

    /// Windows in index order.
    pub fn windows(&self) -> impl Iterator<Item = &WindowEntry> {
        self.windows.iter()
    }

    /// Host keys placed in a window, sorted.
    pub fn hosts_in_window(&self, window_index: usize) -> Vec<&str> {
        let mut hosts: Vec<&str> = self
            .panes
            .values()
            .filter(|p| p.window_index == window_index)
            .map(|p| p.host_key.as_str())
            .collect();
        hosts.sort_unstable();
        hosts
    }

    /// Index of the window new panes go into.
    pub fn active_window(&self) -> Option<usize> {
        self.active_window
    }

    /// The active window entry.
    pub fn active_entry(&self) -> Option<&WindowEntry> {
        self.active_window.and_then(|i| self.windows.get(i))
    }

    /// Point new placements at a registered window.
    pub(crate) fn set_active_window(&mut self, index: usize) -> Result<()> {
        if index >= self.windows.len() {
            return Err(Error::WindowNotFound(index));
        }
        self.active_window = Some(index);
        Ok(())
    }

    /// Forget everything, as if freshly constructed.
    pub fn clear(&mut self) {
        self.windows.clear();
        self.panes.clear();
        self.active_window = None;
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.panes.is_empty() && self.active_window.is_none()
    }
}
