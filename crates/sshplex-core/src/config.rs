//! Configuration types for SSHplex.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::host::ConnectionParams;
use crate::placement::WindowSize;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PlexConfig {
    /// SSH settings
    pub ssh: SshSettings,
    /// tmux settings
    pub tmux: TmuxSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl PlexConfig {
    /// Default configuration path (`~/.config/sshplex/sshplex.yaml` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sshplex").join("sshplex.yaml"))
    }

    /// Load configuration from an explicit path, or from the default path.
    ///
    /// A missing explicit file is an error; a missing default file yields the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: PlexConfig = serde_yaml::from_str(yaml)
            .map_err(|e| crate::Error::Config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.ssh.port == 0 {
            return Err(crate::Error::Config("ssh.port must be > 0".to_string()));
        }

        if self.tmux.max_panes_per_window == 0 {
            return Err(crate::Error::Config(
                "tmux.max_panes_per_window must be > 0".to_string(),
            ));
        }

        if self.tmux.fallback_height == 0 || self.tmux.fallback_width == 0 {
            return Err(crate::Error::Config(
                "tmux fallback window size must be > 0".to_string(),
            ));
        }

        if self.tmux.layout.trim().is_empty() {
            return Err(crate::Error::Config(
                "tmux.layout cannot be empty".to_string(),
            ));
        }

        if self.tmux.binary.trim().is_empty() {
            return Err(crate::Error::Config(
                "tmux.binary cannot be empty".to_string(),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(crate::Error::Config(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Connection parameters derived from the SSH section.
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams::new(
            self.ssh.username.clone(),
            self.ssh.key_path.clone(),
            self.ssh.port,
        )
    }
}

/// SSH settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshSettings {
    /// Login user (empty = ssh default)
    pub username: String,
    /// Private key path (empty = no `-i`)
    pub key_path: String,
    /// Default port
    pub port: u16,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            key_path: String::new(),
            port: 22,
        }
    }
}

/// tmux settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TmuxSettings {
    /// Pane capacity of a single window
    pub max_panes_per_window: usize,
    /// Layout applied after every placement
    pub layout: String,
    /// Enable broadcast after connecting
    pub broadcast: bool,
    /// Open a terminal window attached to the session
    pub auto_attach: bool,
    /// Attach with `tmux -CC` (iTerm2 control mode)
    pub control_mode: bool,
    /// Preferred terminal emulator for auto-attach (None = best available)
    pub terminal: Option<String>,
    /// Rows requested by the resize fallback
    pub fallback_height: u16,
    /// Columns requested by the resize fallback
    pub fallback_width: u16,
    /// Start directory of new sessions
    pub start_directory: String,
    /// tmux binary to run
    pub binary: String,
    /// Optional tmux server socket name (`tmux -L`)
    pub socket_name: Option<String>,
}

impl Default for TmuxSettings {
    fn default() -> Self {
        Self {
            max_panes_per_window: 5,
            layout: "tiled".to_string(),
            broadcast: false,
            auto_attach: true,
            control_mode: false,
            terminal: None,
            fallback_height: 80,
            fallback_width: 200,
            start_directory: "~".to_string(),
            binary: "tmux".to_string(),
            socket_name: None,
        }
    }
}

impl TmuxSettings {
    /// Size used by the resize fallback.
    pub fn fallback_size(&self) -> WindowSize {
        WindowSize::new(self.fallback_height, self.fallback_width)
    }

    /// Start directory with a leading `~` expanded to the home directory.
    pub fn start_directory_path(&self) -> PathBuf {
        let dir = self.start_directory.trim();
        match (dir.strip_prefix('~'), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
            _ => PathBuf::from(dir),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Emit logs at all
    pub enabled: bool,
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file (None = stderr)
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlexConfig::default();
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.tmux.max_panes_per_window, 5);
        assert_eq!(config.tmux.layout, "tiled");
        assert_eq!(config.tmux.fallback_size(), WindowSize::new(80, 200));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = PlexConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_capacity() {
        let mut config = PlexConfig::default();
        config.tmux.max_panes_per_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = PlexConfig::default();
        config.ssh.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = PlexConfig::default();
        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
ssh:
  username: admin
  key_path: ~/.ssh/id_ed25519
  port: 2222

tmux:
  max_panes_per_window: 4
  broadcast: true
  auto_attach: false
  control_mode: true
  terminal: kitty

logging:
  level: debug
  file: /tmp/sshplex.log
"#;

        let config = PlexConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.ssh.username, "admin");
        assert_eq!(config.ssh.port, 2222);
        assert_eq!(config.tmux.max_panes_per_window, 4);
        assert!(config.tmux.broadcast);
        assert!(!config.tmux.auto_attach);
        assert!(config.tmux.control_mode);
        assert_eq!(config.tmux.terminal.as_deref(), Some("kitty"));
        assert_eq!(config.tmux.layout, "tiled");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/tmp/sshplex.log"))
        );

        let params = config.connection_params();
        assert_eq!(params.username, "admin");
        assert_eq!(params.port, 2222);
    }

    #[test]
    fn test_start_directory_expansion() {
        let mut settings = TmuxSettings::default();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(settings.start_directory_path(), home);
            settings.start_directory = "~/work".to_string();
            assert_eq!(settings.start_directory_path(), home.join("work"));
        }

        settings.start_directory = "/srv".to_string();
        assert_eq!(settings.start_directory_path(), PathBuf::from("/srv"));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = PlexConfig::from_yaml("ssh: [unclosed");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = PlexConfig::load(Some(Path::new("/nonexistent/sshplex.yaml")));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("sshplex-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "tmux:\n  max_panes_per_window: 3\n").unwrap();

        let config = PlexConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tmux.max_panes_per_window, 3);

        std::fs::remove_file(&path).unwrap();
    }
}
