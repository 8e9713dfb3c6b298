//! SSHplex MCP Server Implementation
//!
//! This module implements the MCP server using rmcp 0.9's #[tool_router] pattern.
//! Tool calls are routed to one [`Connector`] that owns the managed session.

use std::sync::Arc;

use tokio::sync::Mutex;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError,
};

use tracing::{debug, error, info, instrument, warn};

use sshplex_core::{Error, PlexConfig, SessionName};
use sshplex_mux::{
    AttachOutcome, BroadcastAction, Connector, MultiplexerDriver, PlacementMode, TmuxDriver,
};

use crate::tools::*;

type BoxedDriver = Box<dyn MultiplexerDriver>;
type DriverFactory = Arc<dyn Fn() -> BoxedDriver + Send + Sync>;

const INVALID_PARAMS: ErrorCode = ErrorCode(-32602);
const INTERNAL_ERROR: ErrorCode = ErrorCode(-32603);

/// Map a placement error onto a JSON-RPC error.
fn mcp_error(context: &str, e: Error) -> McpError {
    let code = match &e {
        Error::NoSession
        | Error::InvalidSessionName(_)
        | Error::InvalidInput(_)
        | Error::PaneNotFound(_)
        | Error::SessionNotFound(_)
        | Error::WindowNotFound(_) => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    };
    McpError::new(code, format!("{context}: {e}"), None)
}

fn no_session() -> McpError {
    McpError::new(
        INVALID_PARAMS,
        "No active session. Call sshplex_connect first.".to_string(),
        None,
    )
}

fn json_result<T: serde::Serialize>(response: &T, fallback: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(response).unwrap_or(fallback),
    )])
}

/// SSHplex MCP Server
///
/// Manages one tmux session of SSH connections and exposes it via MCP tools.
#[derive(Clone)]
pub struct SshplexMcpServer {
    /// Loaded configuration
    config: Arc<PlexConfig>,
    /// Builds a driver for each new session
    driver_factory: DriverFactory,
    /// Connector of the managed session, created by the first connect
    connector: Arc<Mutex<Option<Connector<BoxedDriver>>>>,
    /// Tool router for handling MCP tool calls
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SshplexMcpServer {
    /// Create a server that drives the local tmux server.
    pub fn new(config: PlexConfig) -> Self {
        let settings = config.tmux.clone();
        Self::with_driver_factory(config, move || {
            Box::new(TmuxDriver::from_settings(&settings)) as BoxedDriver
        })
    }

    /// Create a server with a custom driver factory.
    pub fn with_driver_factory<F>(config: PlexConfig, factory: F) -> Self
    where
        F: Fn() -> BoxedDriver + Send + Sync + 'static,
    {
        Self {
            config: Arc::new(config),
            driver_factory: Arc::new(factory),
            connector: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    /// Place SSH connections for a list of hosts
    #[tool(
        description = "Open one SSH connection per host in a tmux session, packing hosts into panes (or one window per host)"
    )]
    #[instrument(skip_all)]
    pub async fn sshplex_connect(
        &self,
        Parameters(params): Parameters<ConnectParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(
            "Connecting {} hosts: session={:?}, windows={}, broadcast={:?}",
            params.hosts.len(),
            params.session_name,
            params.windows,
            params.broadcast
        );

        if params.hosts.is_empty() {
            return Err(McpError::new(
                INVALID_PARAMS,
                "At least one host is required".to_string(),
                None,
            ));
        }

        let requested = params
            .session_name
            .as_deref()
            .map(SessionName::parse)
            .transpose()
            .map_err(|e| mcp_error("Invalid session name", e))?;

        let mut guard = self.connector.lock().await;

        let reuse = match (guard.as_ref(), &requested) {
            (Some(current), Some(name)) => {
                current.state().is_live() && current.get_session_name() == name
            }
            (Some(current), None) => current.state().is_live(),
            (None, _) => false,
        };

        if !reuse {
            if let Some(previous) = guard.as_ref().filter(|c| c.state().is_live()) {
                warn!(
                    "Leaving session '{}' running, switching to a new session",
                    previous.get_session_name()
                );
            }
            let name = requested.unwrap_or_else(SessionName::generate);
            debug!("New connector for session '{}'", name);
            *guard = Some(Connector::new(
                (self.driver_factory)(),
                name,
                &self.config.tmux,
            ));
        }

        let connector = guard.as_mut().ok_or_else(no_session)?;

        let mut conn_params = self.config.connection_params();
        if let Some(username) = params.username {
            conn_params.username = username;
        }
        if let Some(key_path) = params.key_path {
            conn_params.key_path = key_path;
        }
        if let Some(port) = params.port {
            conn_params.port = port;
        }

        let mode = if params.windows {
            PlacementMode::Windows
        } else {
            PlacementMode::Panes
        };
        let use_broadcast = params.broadcast.unwrap_or(self.config.tmux.broadcast);

        let report = connector
            .connect_to_hosts(&params.hosts, &conn_params, mode, use_broadcast)
            .map_err(|e| {
                error!("Failed to create session: {}", e);
                mcp_error("Failed to create session", e)
            })?;

        info!("{}", report);

        let response = ConnectResponse {
            session_name: report.session_name.clone(),
            connected: report
                .placements
                .iter()
                .map(|p| PlacedHost {
                    host: p.host_key.clone(),
                    window: p.window_index,
                    pane: p.pane.to_string(),
                    used_fallback: p.used_fallback(),
                })
                .collect(),
            failed: report
                .failures
                .iter()
                .map(|f| FailedHost {
                    host: f.host.clone(),
                    error: f.error.clone(),
                })
                .collect(),
            skipped: report.skipped.clone(),
            broadcast: report.broadcast,
            attach_command: connector.session_info().attach_command,
            message: report.to_string(),
        };

        Ok(json_result(&response, report.to_string()))
    }

    /// Control synchronized input
    #[tool(
        description = "Enable, disable or toggle broadcast (synchronized input) on every multi-pane window, or report its status"
    )]
    #[instrument(skip_all)]
    pub async fn sshplex_broadcast(
        &self,
        Parameters(params): Parameters<BroadcastParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("Broadcast: action={}", params.action);

        let guard = self.connector.lock().await;
        let connector = guard.as_ref().ok_or_else(no_session)?;

        let changed = if params.action.eq_ignore_ascii_case("status") {
            false
        } else {
            let action: BroadcastAction = params
                .action
                .parse()
                .map_err(|e| mcp_error("Invalid broadcast action", e))?;
            connector
                .broadcast(action)
                .map_err(|e| mcp_error("Broadcast failed", e))?
        };

        let windows: Vec<WindowBroadcast> = connector
            .broadcast_status()
            .map_err(|e| mcp_error("Broadcast status failed", e))?
            .into_iter()
            .map(|(window, enabled)| WindowBroadcast { window, enabled })
            .collect();

        let enabled = windows.iter().filter(|w| w.enabled).count();
        let message = format!(
            "Broadcast enabled on {}/{} windows",
            enabled,
            windows.len()
        );

        let response = BroadcastResponse {
            action: params.action.to_ascii_lowercase(),
            changed,
            windows,
            message: message.clone(),
        };

        Ok(json_result(&response, message))
    }

    /// Type a command into panes
    #[tool(description = "Type a command into one host's pane, or into every pane, and press Enter")]
    #[instrument(skip_all)]
    pub async fn sshplex_send(
        &self,
        Parameters(params): Parameters<SendParams>,
    ) -> Result<CallToolResult, McpError> {
        debug!(
            "Sending command: host={:?}, length={} chars",
            params.host,
            params.command.chars().count()
        );

        let guard = self.connector.lock().await;
        let connector = guard.as_ref().ok_or_else(no_session)?;

        let sent = match &params.host {
            Some(host) => {
                connector
                    .send_command(host, &params.command)
                    .map_err(|e| mcp_error("Failed to send command", e))?;
                1
            }
            None => connector
                .broadcast_command(&params.command)
                .map_err(|e| mcp_error("Failed to send command", e))?,
        };

        let message = match &params.host {
            Some(host) => format!("Command sent to '{host}'"),
            None => format!("Command sent to {sent} panes"),
        };
        info!("{}", message);

        let response = SendResponse {
            sent,
            message: message.clone(),
        };

        Ok(json_result(&response, message))
    }

    /// Describe the managed session
    #[tool(description = "Describe the managed session: state, windows and the hosts in each window")]
    #[instrument(skip_all)]
    pub async fn sshplex_session_info(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        let guard = self.connector.lock().await;
        let connector = guard.as_ref().ok_or_else(no_session)?;
        let info = connector.session_info();

        debug!("Session '{}' has {} windows", info.name, info.windows.len());

        Ok(json_result(&info, info.name.clone()))
    }

    /// Attach to the managed session
    #[tool(
        description = "Open a terminal window attached to the session, or return the command to attach manually"
    )]
    #[instrument(skip_all)]
    pub async fn sshplex_attach(
        &self,
        Parameters(params): Parameters<AttachParams>,
    ) -> Result<CallToolResult, McpError> {
        let auto = params.auto.unwrap_or(self.config.tmux.auto_attach);
        info!("Attaching: auto={}", auto);

        let mut guard = self.connector.lock().await;
        let connector = guard.as_mut().ok_or_else(no_session)?;
        let session_name = connector.get_session_name().to_string();

        let outcome = connector
            .attach_to_session(auto)
            .map_err(|e| mcp_error("Failed to attach", e))?;

        let response = match outcome {
            AttachOutcome::Launched { terminal, command } => {
                info!(
                    "Launched {} (pid {:?}) on '{}'",
                    terminal.terminal_name, terminal.pid, session_name
                );
                AttachResponse {
                    message: format!("Opened {} on '{}'", terminal.terminal_name, session_name),
                    session_name,
                    launched: true,
                    terminal: Some(terminal.terminal_name),
                    command,
                }
            }
            AttachOutcome::Instructions(instructions) => AttachResponse {
                command: connector.session_info().attach_command,
                session_name,
                launched: false,
                terminal: None,
                message: instructions,
            },
        };

        Ok(json_result(&response, response.message.clone()))
    }

    /// Close the managed session
    #[tool(description = "Kill the managed tmux session and every connection in it")]
    #[instrument(skip_all)]
    pub async fn sshplex_close(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut guard = self.connector.lock().await;
        let connector = guard.as_mut().ok_or_else(no_session)?;
        let session_name = connector.get_session_name().to_string();

        info!("Closing session '{}'", session_name);

        connector.close().map_err(|e| {
            error!("Failed to close session '{}': {}", session_name, e);
            mcp_error("Failed to close session", e)
        })?;

        let response = CloseResponse {
            message: format!("Session '{session_name}' closed"),
            session_name,
        };

        Ok(json_result(&response, response.message.clone()))
    }

    /// List tmux sessions
    #[tool(description = "List every session on the tmux server")]
    #[instrument(skip_all)]
    pub async fn sshplex_list_sessions(
        &self,
        Parameters(_params): Parameters<EmptyParams>,
    ) -> Result<CallToolResult, McpError> {
        let guard = self.connector.lock().await;

        let (summaries, managed) = match guard.as_ref() {
            Some(connector) => (
                connector.driver().list_sessions(),
                connector
                    .state()
                    .is_live()
                    .then(|| connector.get_session_name().to_string()),
            ),
            None => ((self.driver_factory)().list_sessions(), None),
        };

        let summaries = summaries.map_err(|e| mcp_error("Failed to list sessions", e.into()))?;

        let sessions: Vec<ListedSession> = summaries
            .into_iter()
            .map(|s| ListedSession {
                managed: managed.as_deref() == Some(s.name.as_str()),
                created: s.created.map(|t| t.to_rfc3339()),
                windows: s.windows,
                attached: s.attached,
                name: s.name,
            })
            .collect();

        let count = sessions.len();
        info!("Found {} session(s)", count);

        let response = ListSessionsResponse { sessions, count };

        Ok(json_result(&response, format!("{count} sessions")))
    }
}

// Implement the ServerHandler trait to define server capabilities
#[tool_handler]
impl rmcp::ServerHandler for SshplexMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "SSHplex MCP Server - Multiplex SSH connections across tmux windows and panes. \
                 Use sshplex_connect to place hosts, sshplex_broadcast to synchronize input, \
                 sshplex_send to type commands, sshplex_attach to open a terminal on the session \
                 and sshplex_close to tear it down."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
