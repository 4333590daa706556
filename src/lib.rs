//! HTTP server runtime for the WireGuard control plane.
//!
//! Lifecycle (run groups, stop signal, OS signals), pluggable routing
//! backends, a middleware chain and the health-check route tables.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServiceConfig;
pub use http::{ServerBuilder, ServerRuntime};
pub use lifecycle::{RunGroup, StopSignal, Task};
pub use routing::{create_router, Router};
