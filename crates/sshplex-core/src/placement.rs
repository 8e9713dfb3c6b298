//! Split orientation and fallback attempt records.

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Direction of a pane split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitOrientation {
    /// New pane below the current one (`split-window -v`)
    Vertical,
    /// New pane beside the current one (`split-window -h`)
    Horizontal,
}

impl SplitOrientation {
    /// Orientation for the next split given the panes already in the window.
    ///
    /// Even counts split vertically, odd counts horizontally, which keeps the
    /// grid roughly balanced as panes accumulate.
    pub fn for_pane_count(count: usize) -> Self {
        if count % 2 == 0 {
            SplitOrientation::Vertical
        } else {
            SplitOrientation::Horizontal
        }
    }

    /// Whether this is a vertical split.
    pub fn is_vertical(&self) -> bool {
        matches!(self, SplitOrientation::Vertical)
    }
}

impl std::fmt::Display for SplitOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitOrientation::Vertical => write!(f, "vertical"),
            SplitOrientation::Horizontal => write!(f, "horizontal"),
        }
    }
}

/// One strategy of the split fallback chain, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStep {
    /// Split the active window as-is
    Direct,
    /// Enlarge the window, then split again
    ResizeAndRetry,
    /// Open a fresh window and split there
    NewWindow,
}

impl FallbackStep {
    /// The full chain, in evaluation order.
    pub const CHAIN: [FallbackStep; 3] = [
        FallbackStep::Direct,
        FallbackStep::ResizeAndRetry,
        FallbackStep::NewWindow,
    ];
}

impl std::fmt::Display for FallbackStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackStep::Direct => write!(f, "direct"),
            FallbackStep::ResizeAndRetry => write!(f, "resize-and-retry"),
            FallbackStep::NewWindow => write!(f, "new-window"),
        }
    }
}

/// Outcome of a single split strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAttempt {
    /// Strategy that was tried
    pub step: FallbackStep,
    /// Orientation used for the split
    pub orientation: SplitOrientation,
    /// Local index of the window the split targeted
    pub window_index: usize,
    /// Failure reason, `None` when the split succeeded
    pub error: Option<DriverError>,
}

impl SplitAttempt {
    /// Record a successful attempt.
    pub fn succeeded(step: FallbackStep, orientation: SplitOrientation, window_index: usize) -> Self {
        Self {
            step,
            orientation,
            window_index,
            error: None,
        }
    }

    /// Record a failed attempt.
    pub fn failed(
        step: FallbackStep,
        orientation: SplitOrientation,
        window_index: usize,
        error: DriverError,
    ) -> Self {
        Self {
            step,
            orientation,
            window_index,
            error: Some(error),
        }
    }

    /// Whether the attempt produced a pane.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Window size (rows x columns) used by the resize fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Height in rows
    pub height: u16,
    /// Width in columns
    pub width: u16,
}

impl WindowSize {
    /// Create a new window size.
    pub fn new(height: u16, width: u16) -> Self {
        Self { height, width }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 200)
    }
}
