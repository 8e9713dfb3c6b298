//! # sshplex-mux
//!
//! Session, window and pane placement for SSHplex.
//!
//! This crate provides:
//! - The multiplexer driver boundary and its tmux implementation
//! - Session topology bookkeeping
//! - The pane allocator with its split fallback chain
//! - Broadcast (synchronized input) control
//! - Session lifecycle and auto-attach
//! - The connector that places a batch of hosts
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on sshplex-core and
//! talks to tmux only through [`MultiplexerDriver`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod broadcast;
pub mod connector;
pub mod driver;
pub mod lifecycle;
pub mod testing;
pub mod tmux;
pub mod topology;
pub mod visual;

// Re-export commonly used types
pub use allocator::{PaneAllocator, Placement};
pub use broadcast::{BroadcastAction, BroadcastController};
pub use connector::{
    CancelFlag, ConnectReport, Connector, HostFailure, PlacementMode, SessionInfo, WindowInfo,
};
pub use driver::{DriverResult, MultiplexerDriver, SessionSummary};
pub use lifecycle::{AttachOutcome, SessionLifecycle};
pub use tmux::TmuxDriver;
pub use topology::{PaneEntry, SessionTopology, WindowEntry};
pub use visual::{TerminalHandle, TerminalLauncher, TerminalRegistry};
