//! Panic recovery for wrapped handlers.

use std::any::Any;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use tower_http::catch_panic::ResponseForPanic;
use tracing::Level;

use crate::http::middleware::{cors, MiddlewareContext};
use crate::lifecycle::group::panic_message;
use crate::observability::Logger;

/// What the exception hook learns about a recovered panic.
#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
}

/// Notification hook for recovered panics.
pub type ExceptionHook = Arc<dyn Fn(&PanicReport) + Send + Sync>;

pub(crate) fn inert_hook(_report: &PanicReport) {}

/// Builds the response for a panicking handler: status 500, empty body,
/// CORS headers.
#[derive(Clone)]
pub struct PanicResponder {
    logger: Logger,
    hook: ExceptionHook,
}

impl PanicResponder {
    pub fn new(ctx: &MiddlewareContext) -> Self {
        Self {
            logger: ctx.logger.clone(),
            hook: ctx.exception_hook.clone(),
        }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Self::ResponseBody> {
        let report = PanicReport {
            message: panic_message(err.as_ref()),
        };

        if self.logger.enabled(Level::ERROR) {
            tracing::error!(labels = self.logger.labels(), panic = %report.message, "Recovered from handler panic");
        }
        (self.hook)(&report);

        // The unwind discarded the headers the CORS step had set.
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        cors::set_headers(response.headers_mut());
        response
    }
}
