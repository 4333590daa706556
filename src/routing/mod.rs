//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     backend name ("mux" | "tree" | "axum")
//!     → create_router() picks a backend behind `dyn Router`
//!     → register(method, path, handler) for each route
//!     → set_not_found_handler(handler)
//!
//! Per request:
//!     dispatch(request)
//!     → backend matches method + path
//!     → matched handler, or the not-found handler
//! ```
//!
//! # Design Decisions
//! - Backend types never leak past the `Router` trait
//! - Routes are written with `:name` parameters; backends with another
//!   syntax translate through `format_path`
//! - A method mismatch is a not-found, never a 405
//! - Routes are registered at startup and immutable once serving

pub mod axum_router;
pub mod mux;
pub mod path;
pub mod tree;

use std::convert::Infallible;
use std::str::FromStr;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use crate::http::response::write_error;

pub use axum_router::AxumRouter;
pub use mux::MuxRouter;
pub use path::format_path;
pub use tree::TreeRouter;

/// Message of the default not-found response.
pub const NOT_FOUND_MESSAGE: &str = "no matching route was found";

/// A request handler as stored by every router backend.
pub type Handler = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// Adapt an axum handler function into a [`Handler`].
pub fn handler<H, T>(h: H) -> Handler
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    BoxCloneSyncService::new(h.with_state(()))
}

/// Adapt a tower service into a [`Handler`].
pub fn service<S>(svc: S) -> Handler
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    BoxCloneSyncService::new(svc)
}

/// Errors raised while selecting a backend or registering routes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("unknown router backend `{0}`")]
    UnknownBackend(String),

    #[error("method {0} is not supported")]
    UnsupportedMethod(Method),

    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("router `{backend}` cannot express path `{path}`")]
    UnsupportedPathSyntax { backend: &'static str, path: String },
}

/// Common contract of the router backends.
pub trait Router: Send + Sync {
    /// Bind `handler` to exactly `method` and `path`.
    fn register(&mut self, method: &Method, path: &str, handler: Handler) -> Result<(), RouterError>;

    /// Handler used when no route matches method and path.
    fn set_not_found_handler(&mut self, handler: Handler);

    /// Route a request to its handler.
    fn dispatch(&self, request: Request<Body>) -> BoxFuture<'static, Response>;

    /// Backend name, as accepted by [`create_router`].
    fn name(&self) -> &'static str;
}

/// Available router backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    /// Path-only multiplexer with an emulated method guard.
    Mux,
    /// Segment tree with native methods and `:name` parameters.
    Tree,
    /// `axum::Router`, which needs `{name}` parameters.
    Axum,
}

impl RouterKind {
    pub const ALL: [RouterKind; 3] = [RouterKind::Mux, RouterKind::Tree, RouterKind::Axum];

    pub fn name(self) -> &'static str {
        match self {
            RouterKind::Mux => mux::NAME,
            RouterKind::Tree => tree::NAME,
            RouterKind::Axum => axum_router::NAME,
        }
    }

    /// Build an empty router of this kind.
    pub fn create(self) -> Box<dyn Router> {
        match self {
            RouterKind::Mux => Box::new(MuxRouter::new()),
            RouterKind::Tree => Box::new(TreeRouter::new()),
            RouterKind::Axum => Box::new(AxumRouter::new()),
        }
    }
}

impl FromStr for RouterKind {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouterKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RouterError::UnknownBackend(s.to_string()))
    }
}

/// Create a router by case-insensitive backend name.
///
/// Returns `None` for an unknown name; callers must treat that as a fatal
/// configuration error.
pub fn create_router(name: &str) -> Option<Box<dyn Router>> {
    name.parse::<RouterKind>().ok().map(RouterKind::create)
}

/// Parameters captured from the request path, stored as a request extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, String)>> for PathParams {
    fn from(params: Vec<(String, String)>) -> Self {
        Self(params)
    }
}

const ALLOWED_METHODS: [Method; 7] = [
    Method::HEAD,
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

pub(crate) fn check_route(method: &Method, path: &str) -> Result<(), RouterError> {
    if !ALLOWED_METHODS.contains(method) {
        return Err(RouterError::UnsupportedMethod(method.clone()));
    }
    if !path.starts_with('/') {
        return Err(RouterError::InvalidPath {
            path: path.to_string(),
            reason: "must start with `/`".to_string(),
        });
    }
    Ok(())
}

/// Handler producing the default not-found response.
pub(crate) fn default_not_found() -> Handler {
    handler(|| async { write_error(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE) })
}

/// Call a handler, or answer with the default not-found response.
pub(crate) fn call(handler: Option<Handler>, request: Request<Body>) -> BoxFuture<'static, Response> {
    Box::pin(async move {
        match handler {
            Some(handler) => match handler.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            },
            None => write_error(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
        }
    })
}
