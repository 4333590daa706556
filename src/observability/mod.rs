//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main
//!     → logging::init (global tracing subscriber, JSON or pretty)
//!     → Logger::create (level + labels, threaded into ServerRuntime)
//!
//! ServerRuntime
//!     → access log per request
//!     → drain / serve lifecycle events
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - No process-wide default logger value; it is built once and passed down

pub mod logging;

pub use logging::Logger;
