//! Host records and SSH command construction.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A host to connect to, as delivered by the inventory / selection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HostRecord {
    /// Hostname, also used as the pane lookup key and pane title
    pub name: String,

    /// Address to connect to (falls back to `name` when absent)
    #[serde(default)]
    pub ip: Option<String>,

    /// Per-host SSH port override
    #[serde(default)]
    pub port: Option<u16>,

    /// Per-host SSH user override
    #[serde(default)]
    pub user: Option<String>,

    /// Free-form inventory metadata (cluster, status, sources...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl HostRecord {
    /// Create a host record with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip: None,
            port: None,
            user: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the address to connect to.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set a per-host port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set a per-host user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Key under which the host's pane is tracked.
    pub fn key(&self) -> &str {
        &self.name
    }

    /// Address SSH should dial.
    pub fn address(&self) -> &str {
        match self.ip.as_deref() {
            Some(ip) if !ip.trim().is_empty() => ip,
            _ => &self.name,
        }
    }

    /// Parse a `name` or `name=address` argument.
    pub fn parse_spec(spec: &str) -> crate::Result<Self> {
        let spec = spec.trim();
        let (name, ip) = match spec.split_once('=') {
            Some((name, ip)) => (name.trim(), Some(ip.trim())),
            None => (spec, None),
        };

        if name.is_empty() {
            return Err(crate::Error::InvalidInput(format!(
                "host argument '{spec}' has no name"
            )));
        }

        let mut host = HostRecord::new(name);
        if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
            host.ip = Some(ip.to_string());
        }
        Ok(host)
    }
}

/// Session-wide SSH parameters applied to every host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionParams {
    /// Login user (empty = let ssh decide)
    pub username: String,

    /// Private key path (empty = no `-i`)
    pub key_path: String,

    /// Default SSH port
    pub port: u16,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            username: String::new(),
            key_path: String::new(),
            port: 22,
        }
    }
}

impl ConnectionParams {
    /// Create connection parameters.
    pub fn new(username: impl Into<String>, key_path: impl Into<String>, port: u16) -> Self {
        Self {
            username: username.into(),
            key_path: key_path.into(),
            port,
        }
    }

    /// Build the literal command typed into the host's pane.
    pub fn ssh_command(&self, host: &HostRecord) -> String {
        let mut parts = vec!["ssh".to_string()];

        if !self.key_path.trim().is_empty() {
            parts.push("-i".to_string());
            parts.push(quote(self.key_path.trim()));
        }

        let port = host.port.unwrap_or(self.port);
        parts.push("-p".to_string());
        parts.push(port.to_string());

        let user = host
            .user
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(self.username.trim());
        if user.is_empty() {
            parts.push(host.address().to_string());
        } else {
            parts.push(format!("{}@{}", user, host.address()));
        }

        parts.join(" ")
    }
}

/// Single-quote a shell word when it contains whitespace.
fn quote(word: &str) -> String {
    if word.chars().any(char::is_whitespace) {
        format!("'{}'", word.replace('\'', r"'\''"))
    } else {
        word.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_command_full() {
        let params = ConnectionParams::new("admin", "~/.ssh/id_ed25519", 22);
        let host = HostRecord::new("web-01").with_ip("10.0.0.5");
        assert_eq!(
            params.ssh_command(&host),
            "ssh -i ~/.ssh/id_ed25519 -p 22 admin@10.0.0.5"
        );
    }

    #[test]
    fn test_ssh_command_without_key_or_user() {
        let params = ConnectionParams::new("", "", 2222);
        let host = HostRecord::new("db-01");
        assert_eq!(params.ssh_command(&host), "ssh -p 2222 db-01");
    }

    #[test]
    fn test_host_overrides_win() {
        let params = ConnectionParams::new("admin", "", 22);
        let host = HostRecord::new("edge").with_user("root").with_port(2200);
        assert_eq!(params.ssh_command(&host), "ssh -p 2200 root@edge");
    }

    #[test]
    fn test_key_path_with_spaces_is_quoted() {
        let params = ConnectionParams::new("ops", "/home/ops/my keys/id", 22);
        let host = HostRecord::new("app");
        assert_eq!(
            params.ssh_command(&host),
            "ssh -i '/home/ops/my keys/id' -p 22 ops@app"
        );
    }

    #[test]
    fn test_blank_ip_falls_back_to_name() {
        let host = HostRecord::new("cache-01").with_ip("  ");
        assert_eq!(host.address(), "cache-01");
        assert_eq!(host.key(), "cache-01");
    }

    #[test]
    fn test_parse_spec() {
        let host = HostRecord::parse_spec("web-01=10.1.2.3").unwrap();
        assert_eq!(host.name, "web-01");
        assert_eq!(host.ip.as_deref(), Some("10.1.2.3"));

        let host = HostRecord::parse_spec("web-02").unwrap();
        assert_eq!(host.ip, None);

        assert!(HostRecord::parse_spec("=10.0.0.1").is_err());
    }

    #[test]
    fn test_host_deserializes_with_defaults() {
        let host: HostRecord = serde_json::from_str(r#"{"name": "lb-01"}"#).unwrap();
        assert_eq!(host, HostRecord::new("lb-01"));
    }
}
