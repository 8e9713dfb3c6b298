//! Opaque handles to multiplexer objects.
//!
//! Handles are the multiplexer's own identifiers (`$3`, `@7`, `%12` for tmux).
//! They are stored for lookup only: the user can kill a window at any time,
//! so every driver call made with a stored handle may fail.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw multiplexer identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw identifier, usable as a tmux `-t` target.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle_type!(
    /// Handle to a multiplexer session.
    SessionHandle
);

handle_type!(
    /// Handle to a window inside a session.
    WindowHandle
);

handle_type!(
    /// Handle to a single pane.
    PaneHandle
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        assert_eq!(SessionHandle::new("$1").to_string(), "$1");
        assert_eq!(WindowHandle::from("@4").as_str(), "@4");
        assert_eq!(PaneHandle::from("%9".to_string()).as_str(), "%9");
    }

    #[test]
    fn test_handle_serializes_transparently() {
        let json = serde_json::to_string(&PaneHandle::new("%2")).unwrap();
        assert_eq!(json, "\"%2\"");

        let pane: PaneHandle = serde_json::from_str("\"%7\"").unwrap();
        assert_eq!(pane, PaneHandle::new("%7"));
    }
}
