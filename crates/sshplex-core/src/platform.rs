//! Platform detection for choosing how to launch an attach terminal.

use serde::{Deserialize, Serialize};

/// Platforms SSHplex knows how to open a terminal window on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Native Linux (not WSL)
    Linux,
    /// macOS
    MacOS,
    /// Windows Subsystem for Linux
    WSL,
    /// Anything else (no terminal launch support)
    Other,
}

impl Platform {
    /// Detect the current platform at runtime.
    ///
    /// WSL is recognised by a "microsoft" marker in `/proc/version` or the
    /// presence of the `WSLInterop` binfmt entry.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "linux") {
            if Self::is_wsl() {
                Platform::WSL
            } else {
                Platform::Linux
            }
        } else {
            Platform::Other
        }
    }

    fn is_wsl() -> bool {
        let marker = std::fs::read_to_string("/proc/version")
            .map(|version| version.to_lowercase().contains("microsoft"))
            .unwrap_or(false);

        marker || std::path::Path::new("/proc/sys/fs/binfmt_misc/WSLInterop").exists()
    }

    /// Whether a graphical session is reachable (X11 or Wayland on Linux).
    ///
    /// macOS always has one; WSL may launch Windows Terminal without it.
    pub fn has_display(&self) -> bool {
        match self {
            Platform::MacOS | Platform::WSL => true,
            Platform::Linux => {
                std::env::var_os("DISPLAY").is_some()
                    || std::env::var_os("WAYLAND_DISPLAY").is_some()
            }
            Platform::Other => false,
        }
    }

    /// Get the platform name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOS => "macOS",
            Platform::WSL => "WSL",
            Platform::Other => "other",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
