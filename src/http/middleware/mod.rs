//! Middleware chain applied to every registered handler.
//!
//! ```text
//! request → recover → access_log → cors → handler
//! ```
//!
//! - `recover`: a panicking handler becomes an empty 500 that still carries
//!   the CORS headers; the connection keeps serving
//! - `access_log`: one event per request with status, size and latency,
//!   panics included
//! - `cors`: fixed CORS headers; OPTIONS is answered without calling the handler

pub mod access_log;
pub mod cors;
pub mod recover;

use std::sync::Arc;

use axum::body::{Body, Bytes, HttpBody};
use axum::http::Response;
use axum::middleware::{from_fn, from_fn_with_state};
use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use crate::observability::Logger;
use crate::routing::Handler;

pub use recover::{ExceptionHook, PanicReport, PanicResponder};

/// Values shared by the middleware of one server.
#[derive(Clone)]
pub struct MiddlewareContext {
    pub logger: Logger,
    pub exception_hook: ExceptionHook,
}

impl MiddlewareContext {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            exception_hook: Arc::new(recover::inert_hook),
        }
    }

    pub fn with_exception_hook(mut self, hook: ExceptionHook) -> Self {
        self.exception_hook = hook;
        self
    }
}

/// Wrap `handler` in the middleware chain.
pub fn wrap(handler: Handler, ctx: &MiddlewareContext) -> Handler {
    let stack = ServiceBuilder::new()
        .map_response(into_axum_body)
        .layer(CatchPanicLayer::custom(PanicResponder::new(ctx)))
        .layer(from_fn_with_state(ctx.logger.clone(), access_log::access_log))
        .layer(from_fn(cors::cors))
        .service(handler);
    BoxCloneSyncService::new(stack)
}

fn into_axum_body<B>(response: Response<B>) -> Response<Body>
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    response.map(Body::new)
}
