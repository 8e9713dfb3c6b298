//! SSHplex library
//!
//! Command-line definitions, logging setup and the MCP protocol layer.
//! The actual binary is in main.rs.

pub mod cli;
pub mod logging;
pub mod protocol;
pub mod tools;

// Re-export commonly used types
pub use cli::{Cli, Command, ConnectArgs};
pub use protocol::SshplexMcpServer;
pub use tools::*;
