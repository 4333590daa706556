//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper auto h1/h2, connection tracking, drain)
//!     → router.dispatch (routing layer picks the handler)
//!     → middleware/ (recover → access_log → cors)
//!     → routes.rs handler, or the not-found handler
//!     → response.rs (JSON error bodies)
//!     → Send to client
//! ```

pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use middleware::{ExceptionHook, MiddlewareContext, PanicReport};
pub use response::{write_error, StatusResponder};
pub use routes::{default_routes, socks_routes, Route, RouteHandler};
pub use server::{ServerBuilder, ServerError, ServerRuntime, ServerState};
