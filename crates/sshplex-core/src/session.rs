//! Session naming and lifecycle state types.

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix used for generated session names.
pub const SESSION_PREFIX: &str = "sshplex";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // tmux reserves ':' and '.' in targets; the name is also pasted into shell commands
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex is valid"))
}

/// Name of a multiplexer session, valid as a tmux target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionName(String);

impl SessionName {
    /// Validate and wrap a session name.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name_pattern().is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidSessionName(name))
        }
    }

    /// Generate a timestamped name such as `sshplex-20250101_120000`.
    pub fn generate() -> Self {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        Self(format!("{SESSION_PREFIX}-{timestamp}"))
    }

    /// Use the given name, or generate one when absent.
    pub fn or_generate(name: Option<&str>) -> Result<Self> {
        match name {
            Some(name) => Self::parse(name),
            None => Ok(Self::generate()),
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SessionName> for String {
    fn from(name: SessionName) -> Self {
        name.0
    }
}

impl std::fmt::Display for SessionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of the owned session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No session has been created yet
    Absent,
    /// Session exists at the multiplexer
    Created,
    /// A terminal has been launched onto the session
    Attached,
    /// Session was destroyed
    Closed,
}

impl SessionState {
    /// Whether a live session handle is held in this state.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Created | SessionState::Attached)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Absent => write!(f, "absent"),
            SessionState::Created => write!(f, "created"),
            SessionState::Attached => write!(f, "attached"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Who created the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Ownership {
    /// Created by this process
    Created,
    /// Pre-existing session that was adopted
    Adopted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_format() {
        let name = SessionName::generate();
        let re = Regex::new(r"^sshplex-\d{8}_\d{6}$").unwrap();
        assert!(re.is_match(name.as_str()), "unexpected name: {name}");
    }

    #[test]
    fn test_parse_valid_name() {
        let name = SessionName::parse("prod-web").unwrap();
        assert_eq!(name.as_str(), "prod-web");
        assert!(SessionName::parse("web_01").is_ok());
    }

    #[test]
    fn test_parse_rejects_tmux_target_syntax() {
        assert!(matches!(
            SessionName::parse("a:b"),
            Err(Error::InvalidSessionName(_))
        ));
        assert!(SessionName::parse("a.b").is_err());
        assert!(SessionName::parse("a b").is_err());
        assert!(SessionName::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_shell_metacharacters() {
        for name in ["a;reboot", "$(id)", "`id`", "a|b", "a'b", "a&b"] {
            assert!(
                matches!(SessionName::parse(name), Err(Error::InvalidSessionName(_))),
                "accepted {name}"
            );
        }
    }

    #[test]
    fn test_or_generate() {
        let name = SessionName::or_generate(Some("ops")).unwrap();
        assert_eq!(name.as_str(), "ops");
        let generated = SessionName::or_generate(None).unwrap();
        assert!(generated.as_str().starts_with("sshplex-"));
    }

    #[test]
    fn test_session_name_serde() {
        let name: SessionName = serde_json::from_str("\"ops\"").unwrap();
        assert_eq!(name.as_str(), "ops");
        assert!(serde_json::from_str::<SessionName>("\"bad:name\"").is_err());
    }

    #[test]
    fn test_state_liveness() {
        assert!(!SessionState::Absent.is_live());
        assert!(SessionState::Created.is_live());
        assert!(SessionState::Attached.is_live());
        assert!(!SessionState::Closed.is_live());
    }
}
