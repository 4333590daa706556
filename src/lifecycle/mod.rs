//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! RunGroup (group.rs):
//!     add(serve) + add(drain) + add(signals) → run()
//!     → every task spawned concurrently
//!     → first task to finish fires the StopSignal
//!     → remaining tasks observe it and return
//!     → run() returns the first error in completion order
//!
//! StopSignal (shutdown.rs):
//!     fire() once or many times → every waiter wakes
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → task ends with Interrupted → group stops
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: tasks are never aborted by the group
//! - Any task ending, with or without error, stops the whole group
//! - No retries; the caller decides what a failed run means for the process

pub mod group;
pub mod shutdown;
pub mod signals;

pub use group::{BoxError, GroupError, RunGroup, Task};
pub use shutdown::StopSignal;
pub use signals::Interrupted;
