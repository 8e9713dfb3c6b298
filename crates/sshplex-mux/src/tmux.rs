//! tmux implementation of the multiplexer driver.
//!
//! Every call shells out to the `tmux` binary and blocks until it answers.
//! Object ids (`$N`, `@N`, `%N`) are captured with `-P -F` so the returned
//! handles stay valid across renames and index reshuffles.

use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use sshplex_core::{DriverError, PaneHandle, SessionHandle, TmuxSettings, WindowHandle};

use crate::driver::{DriverResult, MultiplexerDriver, SessionSummary};

const SESSION_FORMAT: &str =
    "#{session_name}\t#{session_id}\t#{session_windows}\t#{session_attached}\t#{session_created}";

/// Driver that runs tmux commands against the local tmux server.
#[derive(Debug, Clone)]
pub struct TmuxDriver {
    binary: String,
    socket_name: Option<String>,
}

impl TmuxDriver {
    /// Driver using `tmux` from `PATH` and the default server socket.
    pub fn new() -> Self {
        Self {
            binary: "tmux".to_string(),
            socket_name: None,
        }
    }

    /// Driver configured from the tmux settings section.
    pub fn from_settings(settings: &TmuxSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            socket_name: settings.socket_name.clone(),
        }
    }

    /// Use a specific tmux binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Talk to a named server socket (`tmux -L <name>`).
    pub fn with_socket_name(mut self, socket_name: impl Into<String>) -> Self {
        self.socket_name = Some(socket_name.into());
        self
    }

    /// Binary this driver runs.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check that the tmux binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-V")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(socket) = &self.socket_name {
            cmd.arg("-L").arg(socket);
        }
        cmd
    }

    /// Run a tmux subcommand and return its trimmed stdout.
    fn run<S: AsRef<str>>(&self, args: &[S]) -> DriverResult<String> {
        let subcommand = args.first().map(|a| a.as_ref()).unwrap_or("tmux").to_string();
        debug!(
            "tmux {}",
            args.iter().map(|a| a.as_ref()).collect::<Vec<_>>().join(" ")
        );

        let output = self
            .command()
            .args(args.iter().map(|a| a.as_ref()))
            .output()
            .map_err(|e| DriverError::unavailable(&subcommand, &e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            };
            return Err(DriverError::new(subcommand, message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        trace!("tmux {} -> {:?}", subcommand, stdout);
        Ok(stdout)
    }

    /// Run a command whose only output is an object id.
    fn run_for_id<S: AsRef<str>>(&self, args: &[S]) -> DriverResult<String> {
        let subcommand = args.first().map(|a| a.as_ref()).unwrap_or("tmux").to_string();
        let id = self.run(args)?;
        let id = id.lines().next().unwrap_or("").trim().to_string();
        if id.is_empty() {
            return Err(DriverError::new(subcommand, "tmux returned no object id"));
        }
        Ok(id)
    }
}

impl Default for TmuxDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for a split of `window`.
pub(crate) fn split_args(window: &WindowHandle, vertical: bool) -> Vec<String> {
    vec![
        "split-window".to_string(),
        "-t".to_string(),
        window.to_string(),
        if vertical { "-v" } else { "-h" }.to_string(),
        "-P".to_string(),
        "-F".to_string(),
        "#{pane_id}".to_string(),
    ]
}

/// Parse one line of `list-sessions -F SESSION_FORMAT`.
pub(crate) fn parse_session_line(line: &str) -> Option<SessionSummary> {
    let mut fields = line.split('\t');
    let name = fields.next()?.to_string();
    let handle = SessionHandle::new(fields.next()?);
    let windows = fields.next()?.trim().parse().unwrap_or(0);
    let attached = fields.next()?.trim().parse::<u32>().unwrap_or(0) > 0;
    let created = fields
        .next()
        .and_then(|ts| ts.trim().parse::<i64>().ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    if name.is_empty() {
        return None;
    }

    Some(SessionSummary {
        name,
        handle,
        windows,
        attached,
        created,
    })
}

impl MultiplexerDriver for TmuxDriver {
    fn has_session(&self, name: &str) -> DriverResult<bool> {
        let target = format!("={name}");
        match self.run(&["has-session", "-t", target.as_str()]) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == sshplex_core::DriverErrorKind::Unavailable => Err(e),
            Err(_) => Ok(false),
        }
    }

    fn new_session(
        &self,
        name: &str,
        default_window_name: &str,
        start_dir: &Path,
    ) -> DriverResult<SessionHandle> {
        let start_dir = start_dir.to_string_lossy().into_owned();
        self.run_for_id(&[
            "new-session",
            "-d",
            "-s",
            name,
            "-n",
            default_window_name,
            "-c",
            start_dir.as_str(),
            "-P",
            "-F",
            "#{session_id}",
        ])
        .map(SessionHandle::new)
    }

    fn get_session(&self, name: &str) -> DriverResult<SessionHandle> {
        self.list_sessions()?
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| s.handle)
            .ok_or_else(|| DriverError::new("list-sessions", format!("can't find session: {name}")))
    }

    fn active_window(&self, session: &SessionHandle) -> DriverResult<WindowHandle> {
        self.run_for_id(&["display-message", "-p", "-t", session.as_str(), "#{window_id}"])
            .map(WindowHandle::new)
    }

    fn new_window(&self, session: &SessionHandle, name: &str) -> DriverResult<WindowHandle> {
        let target = format!("{session}:");
        self.run_for_id(&[
            "new-window",
            "-t",
            target.as_str(),
            "-n",
            name,
            "-P",
            "-F",
            "#{window_id}",
        ])
        .map(WindowHandle::new)
    }

    fn resize_window(&self, window: &WindowHandle, height: u16, width: u16) -> DriverResult<()> {
        let height = height.to_string();
        let width = width.to_string();
        self.run(&[
            "resize-window",
            "-t",
            window.as_str(),
            "-x",
            width.as_str(),
            "-y",
            height.as_str(),
        ])
        .map(|_| ())
    }

    fn select_layout(&self, window: &WindowHandle, layout: &str) -> DriverResult<()> {
        self.run(&["select-layout", "-t", window.as_str(), layout])
            .map(|_| ())
    }

    fn set_window_option(
        &self,
        window: &WindowHandle,
        key: &str,
        value: &str,
    ) -> DriverResult<()> {
        self.run(&["set-window-option", "-t", window.as_str(), key, value])
            .map(|_| ())
    }

    fn get_window_option(&self, window: &WindowHandle, key: &str) -> DriverResult<String> {
        self.run(&["show-window-options", "-v", "-t", window.as_str(), key])
            .map(|value| value.trim().to_string())
    }

    fn split_window(&self, window: &WindowHandle, vertical: bool) -> DriverResult<PaneHandle> {
        let args = split_args(window, vertical);
        self.run_for_id(args.as_slice()).map(PaneHandle::new)
    }

    fn attached_pane(&self, window: &WindowHandle) -> DriverResult<PaneHandle> {
        self.run_for_id(&["display-message", "-p", "-t", window.as_str(), "#{pane_id}"])
            .map(PaneHandle::new)
    }

    fn set_pane_title(&self, pane: &PaneHandle, title: &str) -> DriverResult<()> {
        self.run(&["select-pane", "-t", pane.as_str(), "-T", title])
            .map(|_| ())
    }

    fn send_keys(&self, pane: &PaneHandle, text: &str, submit: bool) -> DriverResult<()> {
        self.run(&["send-keys", "-t", pane.as_str(), "-l", text])?;
        if submit {
            self.run(&["send-keys", "-t", pane.as_str(), "Enter"])?;
        }
        Ok(())
    }

    fn kill_session(&self, session: &SessionHandle) -> DriverResult<()> {
        self.run(&["kill-session", "-t", session.as_str()]).map(|_| ())
    }

    fn window_name(&self, window: &WindowHandle) -> DriverResult<String> {
        self.run(&["display-message", "-p", "-t", window.as_str(), "#{window_name}"])
            .map(|name| name.trim().to_string())
    }

    fn list_sessions(&self) -> DriverResult<Vec<SessionSummary>> {
        match self.run(&["list-sessions", "-F", SESSION_FORMAT]) {
            Ok(output) => Ok(output.lines().filter_map(parse_session_line).collect()),
            // No server yet means no sessions
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn bind_key(&self, key: &str, command: &[String]) -> DriverResult<()> {
        let mut args = vec!["bind-key".to_string(), key.to_string()];
        args.extend(command.iter().cloned());
        self.run(args.as_slice()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_orientation() {
        let window = WindowHandle::new("@3");
        let vertical = split_args(&window, true);
        assert_eq!(vertical[0], "split-window");
        assert_eq!(vertical[2], "@3");
        assert_eq!(vertical[3], "-v");

        let horizontal = split_args(&window, false);
        assert_eq!(horizontal[3], "-h");
        assert_eq!(horizontal.last().map(String::as_str), Some("#{pane_id}"));
    }

    #[test]
    fn test_parse_session_line() {
        let summary = parse_session_line("sshplex-20250101_120000\t$4\t3\t1\t1735732800").unwrap();
        assert_eq!(summary.name, "sshplex-20250101_120000");
        assert_eq!(summary.handle, SessionHandle::new("$4"));
        assert_eq!(summary.windows, 3);
        assert!(summary.attached);
        assert_eq!(summary.status(), "attached");
        assert_eq!(
            summary.created.map(|c| c.timestamp()),
            Some(1_735_732_800)
        );
    }

    #[test]
    fn test_parse_session_line_tolerates_missing_created() {
        let summary = parse_session_line("ops\t$0\t1\t0").unwrap();
        assert!(!summary.attached);
        assert!(summary.created.is_none());
    }

    #[test]
    fn test_parse_session_line_rejects_garbage() {
        assert!(parse_session_line("").is_none());
        assert!(parse_session_line("only-a-name").is_none());
    }

    #[test]
    fn test_builder() {
        let driver = TmuxDriver::new().with_binary("/usr/local/bin/tmux");
        assert_eq!(driver.binary(), "/usr/local/bin/tmux");

        let settings = TmuxSettings {
            socket_name: Some("sshplex-test".to_string()),
            ..Default::default()
        };
        let driver = TmuxDriver::from_settings(&settings);
        assert_eq!(driver.binary(), "tmux");
        assert_eq!(driver.socket_name.as_deref(), Some("sshplex-test"));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let driver = TmuxDriver::new().with_binary("/nonexistent/tmux-binary");
        assert!(!driver.is_available());

        let err = driver.has_session("anything").unwrap_err();
        assert_eq!(err.kind(), sshplex_core::DriverErrorKind::Unavailable);

        let err = driver.list_sessions().unwrap_err();
        assert_eq!(err.kind(), sshplex_core::DriverErrorKind::Unavailable);
    }
}
