//! Logging setup.
//!
//! stdout belongs to the MCP transport and to command output, so logs go to
//! stderr or to the configured file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use sshplex_core::LoggingSettings;

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber. Does nothing when logging is disabled.
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    if !settings.enabled {
        return Ok(());
    }

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(settings));

    let installed = match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}
