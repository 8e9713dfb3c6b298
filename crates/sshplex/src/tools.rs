//! MCP Tool Types
//!
//! Parameter and response types of every MCP tool.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sshplex_core::HostRecord;

// =============================================================================
// Connection Tools
// =============================================================================

/// Parameters for sshplex_connect
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectParams {
    /// Hosts to connect to, in placement order
    pub hosts: Vec<HostRecord>,

    /// Session name (default: reuse the current session or generate one)
    #[serde(default)]
    pub session_name: Option<String>,

    /// SSH login user (default from config)
    #[serde(default)]
    pub username: Option<String>,

    /// SSH private key path (default from config)
    #[serde(default)]
    pub key_path: Option<String>,

    /// SSH port (default from config)
    #[serde(default)]
    pub port: Option<u16>,

    /// One window per host instead of panes
    #[serde(default)]
    pub windows: bool,

    /// Enable broadcast input after connecting (default from config)
    #[serde(default)]
    pub broadcast: Option<bool>,
}

/// Response for sshplex_connect
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectResponse {
    /// Session the hosts were placed in
    pub session_name: String,

    /// Hosts placed
    pub connected: Vec<PlacedHost>,

    /// Hosts that failed, with the reason
    pub failed: Vec<FailedHost>,

    /// Hosts skipped because the batch was cancelled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,

    /// Whether broadcast ended up enabled (absent when not requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<bool>,

    /// Command to attach to the session
    pub attach_command: String,

    /// Summary, e.g. "3/3 hosts connected"
    pub message: String,
}

/// A placed host
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlacedHost {
    /// Host key
    pub host: String,

    /// Window index
    pub window: usize,

    /// tmux pane id
    pub pane: String,

    /// Whether the split fallback chain was needed
    pub used_fallback: bool,
}

/// A host that could not be placed
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailedHost {
    /// Host key
    pub host: String,

    /// Failure reason
    pub error: String,
}

// =============================================================================
// Broadcast Tools
// =============================================================================

/// Parameters for sshplex_broadcast
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BroadcastParams {
    /// One of "enable", "disable", "toggle" or "status"
    pub action: String,
}

/// Response for sshplex_broadcast
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BroadcastResponse {
    /// Action performed
    pub action: String,

    /// Whether at least one window was affected (false for status)
    pub changed: bool,

    /// Per-window state after the action
    pub windows: Vec<WindowBroadcast>,

    /// Human-readable summary
    pub message: String,
}

/// Broadcast state of one window
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WindowBroadcast {
    /// Window index
    pub window: usize,

    /// Whether synchronize-panes is on
    pub enabled: bool,
}

/// Parameters for sshplex_send
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendParams {
    /// Command typed into the pane(s), followed by Enter
    pub command: String,

    /// Host key to target (default: every host)
    #[serde(default)]
    pub host: Option<String>,
}

/// Response for sshplex_send
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendResponse {
    /// Panes that received the command
    pub sent: usize,

    /// Human-readable summary
    pub message: String,
}

// =============================================================================
// Session Tools
// =============================================================================

/// Parameters for tools that take none
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EmptyParams {}

/// Parameters for sshplex_attach
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AttachParams {
    /// Open a terminal window on the session (default from config)
    #[serde(default)]
    pub auto: Option<bool>,
}

/// Response for sshplex_attach
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttachResponse {
    /// Session name
    pub session_name: String,

    /// Whether a terminal window was launched
    pub launched: bool,

    /// Terminal emulator used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,

    /// Attach command
    pub command: String,

    /// Human-readable summary
    pub message: String,
}

/// Response for sshplex_close
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CloseResponse {
    /// Session that was closed
    pub session_name: String,

    /// Success message
    pub message: String,
}

/// One entry of sshplex_list_sessions
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListedSession {
    /// Session name
    pub name: String,

    /// Number of windows
    pub windows: usize,

    /// Whether a client is attached
    pub attached: bool,

    /// Creation time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Whether this is the session managed by this server
    pub managed: bool,
}

/// Response for sshplex_list_sessions
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListSessionsResponse {
    /// Sessions on the tmux server
    pub sessions: Vec<ListedSession>,

    /// Total count
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_params_defaults() {
        let params: ConnectParams =
            serde_json::from_str(r#"{"hosts": [{"name": "web-01", "ip": "10.0.0.1"}]}"#).unwrap();
        assert_eq!(params.hosts[0].address(), "10.0.0.1");
        assert!(!params.windows);
        assert!(params.broadcast.is_none());
        assert!(params.session_name.is_none());
    }

    #[test]
    fn test_connect_params_require_hosts() {
        assert!(serde_json::from_str::<ConnectParams>("{}").is_err());
    }

    #[test]
    fn test_send_params() {
        let params: SendParams = serde_json::from_str(r#"{"command": "uptime"}"#).unwrap();
        assert!(params.host.is_none());
    }

    #[test]
    fn test_skipped_omitted_when_empty() {
        let response = ConnectResponse {
            session_name: "plex".to_string(),
            connected: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            broadcast: None,
            attach_command: "tmux attach-session -t plex".to_string(),
            message: "0/0 hosts connected".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("skipped").is_none());
        assert!(json.get("broadcast").is_none());
    }
}
