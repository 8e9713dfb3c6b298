//! Registry of terminal emulators known on this platform.

use super::{TerminalEmulator, TerminalHandle, TerminalLauncher};
use sshplex_core::{Error, Platform, Result};
use tracing::info;

/// Selects a terminal emulator and launches attach commands with it.
pub struct TerminalRegistry {
    terminals: Vec<Box<dyn TerminalEmulator>>,
    preferred: Option<String>,
}

impl TerminalRegistry {
    /// Registry for a specific platform.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            terminals: Self::terminals_for_platform(platform),
            preferred: None,
        }
    }

    /// Registry for the detected platform.
    pub fn new() -> Self {
        Self::for_platform(Platform::detect())
    }

    /// Prefer an emulator by name (e.g. from `tmux.terminal` in the config).
    pub fn with_preferred(mut self, name: Option<String>) -> Self {
        self.preferred = name;
        self
    }

    fn terminals_for_platform(platform: Platform) -> Vec<Box<dyn TerminalEmulator>> {
        match platform {
            #[cfg(target_os = "linux")]
            Platform::Linux => Self::linux_terminals(),

            #[cfg(target_os = "linux")]
            Platform::WSL => Self::wsl_terminals(),

            #[cfg(target_os = "macos")]
            Platform::MacOS => Self::macos_terminals(),

            // Fallback for platforms not matching compile target
            #[allow(unreachable_patterns)]
            _ => Vec::new(),
        }
    }

    #[cfg(target_os = "linux")]
    fn linux_terminals() -> Vec<Box<dyn TerminalEmulator>> {
        use super::linux::*;

        vec![
            Box::new(GnomeTerminal),
            Box::new(Konsole),
            Box::new(Alacritty),
            Box::new(Kitty),
            Box::new(XTerm),
        ]
    }

    #[cfg(target_os = "linux")]
    fn wsl_terminals() -> Vec<Box<dyn TerminalEmulator>> {
        use super::linux::*;

        vec![
            Box::new(WindowsTerminalWsl),
            Box::new(GnomeTerminal),
            Box::new(Konsole),
            Box::new(XTerm),
        ]
    }

    #[cfg(target_os = "macos")]
    fn macos_terminals() -> Vec<Box<dyn TerminalEmulator>> {
        use super::macos::*;

        vec![Box::new(ITerm2), Box::new(MacOSTerminal)]
    }

    /// Names of every emulator this registry knows about.
    pub fn known(&self) -> Vec<&'static str> {
        self.terminals.iter().map(|t| t.name()).collect()
    }

    /// Highest-priority emulator that is currently available.
    pub fn find_best_terminal(&self) -> Option<&dyn TerminalEmulator> {
        self.terminals
            .iter()
            .filter(|t| t.is_available())
            .max_by_key(|t| t.priority())
            .map(|t| t.as_ref())
    }

    /// Emulator with the given name (case-insensitive).
    pub fn find_terminal_by_name(&self, name: &str) -> Option<&dyn TerminalEmulator> {
        self.terminals
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .map(|t| t.as_ref())
    }

    /// Available emulators, highest priority first.
    pub fn available_terminals(&self) -> Vec<&dyn TerminalEmulator> {
        let mut terminals: Vec<_> = self
            .terminals
            .iter()
            .filter(|t| t.is_available())
            .map(|t| t.as_ref())
            .collect();

        terminals.sort_by_key(|t| std::cmp::Reverse(t.priority()));
        terminals
    }

    fn select(&self) -> Result<&dyn TerminalEmulator> {
        if let Some(name) = &self.preferred {
            let terminal = self.find_terminal_by_name(name).ok_or_else(|| {
                Error::TerminalLaunch(format!("terminal emulator '{name}' not found"))
            })?;
            if !terminal.is_available() {
                return Err(Error::TerminalLaunch(format!(
                    "terminal emulator '{name}' is not available"
                )));
            }
            return Ok(terminal);
        }

        self.find_best_terminal()
            .ok_or_else(|| Error::TerminalLaunch("no terminal emulator available".to_string()))
    }
}

impl Default for TerminalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalLauncher for TerminalRegistry {
    fn launch(&self, command: &str) -> Result<TerminalHandle> {
        let terminal = self.select()?;
        info!("Launching {} for: {}", terminal.name(), command);
        terminal.spawn(command)
    }

    fn name(&self) -> &'static str {
        "terminal-registry"
    }
}
