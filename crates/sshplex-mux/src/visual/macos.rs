//! macOS terminal emulators, driven through AppleScript.

use super::{applescript_quote, TerminalEmulator, TerminalHandle};
use std::process::Command;
use sshplex_core::{Error, Result};

fn run_applescript(script: &str, terminal_name: &str) -> Result<TerminalHandle> {
    let child = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .spawn()
        .map_err(|e| Error::TerminalLaunch(format!("failed to spawn {terminal_name}: {e}")))?;

    Ok(TerminalHandle::new(child.id(), terminal_name))
}

/// Terminal.app, always present.
pub struct MacOSTerminal;

impl TerminalEmulator for MacOSTerminal {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        let script = format!(
            "tell application \"Terminal\" to do script \"{}\"",
            applescript_quote(command)
        );
        run_applescript(&script, self.name())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Terminal.app"
    }

    fn priority(&self) -> u8 {
        80
    }
}

/// iTerm2, required for tmux control mode (`-CC`).
pub struct ITerm2;

impl TerminalEmulator for ITerm2 {
    fn spawn(&self, command: &str) -> Result<TerminalHandle> {
        let script = format!(
            r#"tell application "iTerm2"
                create window with default profile
                tell current session of current window
                    write text "{}"
                end tell
            end tell"#,
            applescript_quote(command)
        );
        run_applescript(&script, self.name())
    }

    fn is_available(&self) -> bool {
        std::path::Path::new("/Applications/iTerm.app").exists()
    }

    fn name(&self) -> &'static str {
        "iTerm2"
    }

    fn priority(&self) -> u8 {
        100
    }
}
