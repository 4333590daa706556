//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! serve task
//!     → listener.rs (bind, accept loop with backoff)
//!     → connection.rs (track each connection task)
//!     → hand off to the HTTP layer
//!
//! drain task
//!     → connection.rs (close tracker, wait, abort stragglers)
//!
//! Connection States:
//!     Active → Draining → Closed (or Aborted at the drain deadline)
//! ```
//!
//! # Design Decisions
//! - Accept errors never end the serve task; only a failed bind does
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ConnectionTracker, DrainingConnections};
pub use listener::{Listener, ListenerError};
