//! # SSHplex
//!
//! Open SSH connections to many hosts at once inside a tmux session.
//!
//! ## Overview
//!
//! The binary provides:
//! - `connect`: place one SSH connection per host into tmux panes or windows
//! - `sessions` / `kill`: inspect and remove tmux sessions
//! - `serve`: expose the same operations as MCP tools on stdio
//!
//! ## Architecture
//!
//! This is Layer 1 - the binary that ties together:
//! - sshplex-core: Core types and configuration
//! - sshplex-mux: Placement engine and tmux driver

use anyhow::{bail, Context};
use clap::Parser;
use rmcp::{transport::stdio, ServiceExt};
use tracing::{error, info, warn};

use sshplex::{logging, Cli, Command, ConnectArgs, SshplexMcpServer};
use sshplex_core::{PlexConfig, SessionName};
use sshplex_mux::{AttachOutcome, Connector, MultiplexerDriver, TmuxDriver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = PlexConfig::load(cli.config.as_deref()).context("loading configuration")?;
    logging::init(&config.logging)?;

    info!("SSHplex v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Connect(args) => connect(config, args).await,
        Command::Sessions => list_sessions(&config),
        Command::Kill { name } => kill_session(&config, &name),
        Command::Serve => serve(config).await,
    }
}

fn tmux_driver(config: &PlexConfig) -> anyhow::Result<TmuxDriver> {
    let driver = TmuxDriver::from_settings(&config.tmux);
    if !driver.is_available() {
        bail!(
            "tmux not found (tried '{}'); install tmux or set tmux.binary",
            driver.binary()
        );
    }
    Ok(driver)
}

async fn connect(mut config: PlexConfig, args: ConnectArgs) -> anyhow::Result<()> {
    args.apply_to(&mut config)?;
    let hosts = args.host_records()?;
    let driver = tmux_driver(&config)?;

    let name = SessionName::or_generate(args.session.as_deref())?;
    let mut connector = Connector::new(driver, name, &config.tmux);

    let cancel = connector.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current host");
            cancel.cancel();
        }
    });

    let params = config.connection_params();
    let mode = args.mode();
    let use_broadcast = config.tmux.broadcast;

    let (mut connector, report) = tokio::task::spawn_blocking(move || {
        let report = connector.connect_to_hosts(&hosts, &params, mode, use_broadcast);
        (connector, report)
    })
    .await
    .context("connect task failed")?;
    let report = report?;

    println!("{}: {}", report.session_name, report);
    for failure in &report.failures {
        println!("  failed  {}: {}", failure.host, failure.error);
    }
    for host in &report.skipped {
        println!("  skipped {host}");
    }
    if let Some(enabled) = report.broadcast {
        println!("Broadcast: {}", if enabled { "on" } else { "off" });
    }

    if report.connected() > 0 {
        match connector.attach_to_session(config.tmux.auto_attach) {
            Ok(AttachOutcome::Launched { terminal, .. }) => {
                println!("Opened {} on '{}'", terminal.terminal_name, report.session_name);
            }
            Ok(AttachOutcome::Instructions(instructions)) => println!("{instructions}"),
            Err(e) => {
                error!("Auto-attach failed: {}", e);
                println!(
                    "To attach to the session, run: {}",
                    connector.session_info().attach_command
                );
            }
        }
    }

    if !report.is_success() {
        bail!("{report}");
    }
    Ok(())
}

fn list_sessions(config: &PlexConfig) -> anyhow::Result<()> {
    let driver = tmux_driver(config)?;
    let sessions = driver.list_sessions()?;

    if sessions.is_empty() {
        println!("No tmux sessions");
        return Ok(());
    }

    println!("{:<32} {:>7}  {:<9} CREATED", "NAME", "WINDOWS", "STATUS");
    for session in sessions {
        let created = session
            .created
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:>7}  {:<9} {}",
            session.name,
            session.windows,
            session.status(),
            created
        );
    }
    Ok(())
}

fn kill_session(config: &PlexConfig, name: &str) -> anyhow::Result<()> {
    let name = SessionName::parse(name)?;
    let driver = tmux_driver(config)?;

    let handle = driver
        .get_session(name.as_str())
        .with_context(|| format!("session '{name}' not found"))?;
    driver.kill_session(&handle)?;

    info!("Killed session '{}'", name);
    println!("Session '{name}' killed");
    Ok(())
}

async fn serve(config: PlexConfig) -> anyhow::Result<()> {
    let server = SshplexMcpServer::new(config);

    info!("Server initialized, starting stdio transport...");

    let service = server.serve(stdio()).await.map_err(|e| {
        error!("Error starting server: {}", e);
        e
    })?;

    info!("SSHplex MCP Server running on stdio");

    service.waiting().await?;

    info!("SSHplex MCP Server shutting down");

    Ok(())
}
