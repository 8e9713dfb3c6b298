//! Terminal windows for attaching to the session.
//!
//! Auto-attach opens a new terminal emulator window that runs the attach
//! command. The launch is fire-and-forget: the child is never waited on.

use std::process::{Child, Command};

use sshplex_core::{Error, Result};

pub mod registry;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

pub use registry::TerminalRegistry;

/// Handle to a launched terminal window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalHandle {
    /// Process ID of the launcher process
    pub pid: u32,

    /// Name of the terminal emulator used
    pub terminal_name: String,
}

impl TerminalHandle {
    /// Create a new terminal handle.
    pub fn new(pid: u32, terminal_name: impl Into<String>) -> Self {
        Self {
            pid,
            terminal_name: terminal_name.into(),
        }
    }
}

/// Anything that can open a terminal window running a shell command.
pub trait TerminalLauncher: Send + Sync {
    /// Open a window running `command` and return without waiting for it.
    fn launch(&self, command: &str) -> Result<TerminalHandle>;

    /// Human-readable launcher name for logs.
    fn name(&self) -> &'static str;
}

/// A concrete terminal emulator.
pub trait TerminalEmulator: Send + Sync {
    /// Open a window running `command` through the shell.
    fn spawn(&self, command: &str) -> Result<TerminalHandle>;

    /// Whether the emulator is installed and usable here.
    fn is_available(&self) -> bool;

    /// Emulator name, also used to select it from configuration.
    fn name(&self) -> &'static str;

    /// Higher values win when several emulators are available.
    ///
    /// - 100: platform default (gnome-terminal, konsole, iTerm2, wt.exe)
    /// - 80: built-in alternative (Terminal.app)
    /// - 70: modern GPU terminals (alacritty, kitty)
    /// - 50: universal fallback (xterm)
    fn priority(&self) -> u8;
}

/// Spawn `program <args..> bash -c <command>` detached.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn spawn_via_bash(
    program: &str,
    args: &[&str],
    command: &str,
    terminal_name: &str,
) -> Result<TerminalHandle> {
    let child: Child = Command::new(program)
        .args(args)
        .arg("bash")
        .arg("-c")
        .arg(command)
        .spawn()
        .map_err(|e| Error::TerminalLaunch(format!("failed to spawn {program}: {e}")))?;

    Ok(TerminalHandle::new(child.id(), terminal_name))
}

/// Escape a string for use inside an AppleScript double-quoted literal.
pub fn applescript_quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
