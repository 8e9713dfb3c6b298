//! Linux terminal emulators.

use super::{spawn_via_bash, TerminalEmulator, TerminalHandle};
use std::process::Command;
use sshplex_core::Result;

/// Check if a command exists in PATH.
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// GNOME Terminal.
pub struct GnomeTerminal;

impl TerminalEmulator for GnomeTerminal {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        spawn_via_bash("gnome-terminal", &["--"], command, self.name())
    }

    fn is_available(&self) -> bool {
        command_exists("gnome-terminal")
    }

    fn name(&self) -> &'static str {
        "gnome-terminal"
    }

    fn priority(&self) -> u8 {
        100
    }
}

/// KDE Konsole.
pub struct Konsole;

impl TerminalEmulator for Konsole {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        spawn_via_bash("konsole", &["-e"], command, self.name())
    }

    fn is_available(&self) -> bool {
        command_exists("konsole")
    }

    fn name(&self) -> &'static str {
        "konsole"
    }

    fn priority(&self) -> u8 {
        100
    }
}

/// Alacritty.
pub struct Alacritty;

impl TerminalEmulator for Alacritty {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        spawn_via_bash("alacritty", &["-e"], command, self.name())
    }

    fn is_available(&self) -> bool {
        command_exists("alacritty")
    }

    fn name(&self) -> &'static str {
        "alacritty"
    }

    fn priority(&self) -> u8 {
        70
    }
}

/// Kitty.
pub struct Kitty;

impl TerminalEmulator for Kitty {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        // kitty takes the program directly, no -e
        spawn_via_bash("kitty", &[], command, self.name())
    }

    fn is_available(&self) -> bool {
        command_exists("kitty")
    }

    fn name(&self) -> &'static str {
        "kitty"
    }

    fn priority(&self) -> u8 {
        70
    }
}

/// XTerm, the universal fallback.
pub struct XTerm;

impl TerminalEmulator for XTerm {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        spawn_via_bash("xterm", &["-e"], command, self.name())
    }

    fn is_available(&self) -> bool {
        command_exists("xterm")
    }

    fn name(&self) -> &'static str {
        "xterm"
    }

    fn priority(&self) -> u8 {
        50
    }
}

/// Windows Terminal reached from inside WSL.
pub struct WindowsTerminalWsl;

impl TerminalEmulator for WindowsTerminalWsl {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        spawn_via_bash("wt.exe", &["--"], command, self.name())
    }

    fn is_available(&self) -> bool {
        Command::new("wt.exe")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "wt.exe"
    }

    fn priority(&self) -> u8 {
        100
    }
}
