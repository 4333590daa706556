//! Response helpers.
//!
//! # Responsibilities
//! - JSON error bodies: `{"error": "<message>"}`
//! - Fixed-status responders usable as not-found handlers

use std::fmt::Display;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::routing::{handler, Handler};

/// Content type of JSON error bodies.
pub const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Build a JSON error response.
pub fn write_error(status: StatusCode, message: impl Display) -> Response {
    let body = serde_json::json!({ "error": message.to_string() });
    (status, [(header::CONTENT_TYPE, JSON_UTF8)], body.to_string()).into_response()
}

/// Answers every request with the same status and error message.
#[derive(Debug, Clone)]
pub struct StatusResponder {
    status: StatusCode,
    message: Arc<str>,
}

impl StatusResponder {
    pub fn new(status: StatusCode, message: impl Into<Arc<str>>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn respond(&self) -> Response {
        write_error(self.status, &self.message)
    }

    pub fn into_handler(self) -> Handler {
        handler(move || {
            let responder = self.clone();
            async move { responder.respond() }
        })
    }
}
