//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use sshplex_core::{HostRecord, PlexConfig, Result};
use sshplex_mux::PlacementMode;

/// CLI arguments for sshplex
#[derive(Debug, Parser)]
#[command(name = "sshplex")]
#[command(about = "Multiplex SSH connections across tmux windows and panes")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: <config dir>/sshplex/sshplex.yaml)
    #[arg(short, long, global = true, env = "SSHPLEX_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open one SSH connection per host in a tmux session
    Connect(ConnectArgs),

    /// List tmux sessions
    Sessions,

    /// Kill a tmux session by name
    Kill {
        /// Session name
        name: String,
    },

    /// Run the MCP server on stdio
    Serve,
}

/// Arguments of `sshplex connect`.
#[derive(Debug, Clone, Args)]
pub struct ConnectArgs {
    /// Host to connect to, optionally with an address (repeatable)
    #[arg(long = "host", value_name = "NAME[=ADDR]", required = true)]
    pub hosts: Vec<String>,

    /// One window per host instead of panes
    #[arg(long)]
    pub windows: bool,

    /// Enable broadcast input after connecting
    #[arg(long)]
    pub broadcast: bool,

    /// Do not open a terminal on the session
    #[arg(long)]
    pub no_attach: bool,

    /// Session name (default: sshplex-<timestamp>)
    #[arg(long, value_name = "NAME")]
    pub session: Option<String>,

    /// Pane capacity of a window
    #[arg(long, value_name = "N")]
    pub max_panes: Option<usize>,

    /// SSH login user
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH private key
    #[arg(short = 'i', long, value_name = "PATH")]
    pub key: Option<String>,

    /// SSH port
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ConnectArgs {
    /// Parse the `--host` values.
    pub fn host_records(&self) -> Result<Vec<HostRecord>> {
        self.hosts.iter().map(|h| HostRecord::parse_spec(h)).collect()
    }

    /// Placement mode selected by the flags.
    pub fn mode(&self) -> PlacementMode {
        if self.windows {
            PlacementMode::Windows
        } else {
            PlacementMode::Panes
        }
    }

    /// Fold the command-line overrides into the loaded configuration.
    pub fn apply_to(&self, config: &mut PlexConfig) -> Result<()> {
        if let Some(max_panes) = self.max_panes {
            config.tmux.max_panes_per_window = max_panes;
        }
        if let Some(user) = &self.user {
            config.ssh.username = user.clone();
        }
        if let Some(key) = &self.key {
            config.ssh.key_path = key.clone();
        }
        if let Some(port) = self.port {
            config.ssh.port = port;
        }
        if self.broadcast {
            config.tmux.broadcast = true;
        }
        if self.no_attach {
            config.tmux.auto_attach = false;
        }
        config.validate()
    }
}
