//! Route tables served by the two deployments.
//!
//! A route table is plain data: method, path and a constructor that builds
//! the handler from the runtime it is registered on.

use axum::http::{Method, StatusCode};
use axum::Json;
use serde::Serialize;

use crate::config::Deployment;
use crate::http::response::StatusResponder;
use crate::http::server::{ServerError, ServerRuntime};
use crate::routing::{handler, Handler, NOT_FOUND_MESSAGE};

/// Path of the main deployment's health check.
pub const HEALTH_PATH: &str = "/_healthz";

/// Path of the SOCKS deployment's health check.
pub const SOCKS_HEALTH_PATH: &str = "/socks_healthz";

/// Builds a route's handler from the runtime it is registered on.
pub type RouteHandler = fn(&ServerRuntime) -> Handler;

/// One entry of a route table.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    /// Path in `:name` parameter syntax.
    pub path: &'static str,
    pub handler: RouteHandler,
}

impl Route {
    pub fn new(method: Method, path: &'static str, handler: RouteHandler) -> Self {
        Self { method, path, handler }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Routes of the main server.
pub fn default_routes() -> Vec<Route> {
    vec![Route::new(Method::GET, HEALTH_PATH, wireguard_health)]
}

/// Routes of the SOCKS proxy's companion server.
pub fn socks_routes() -> Vec<Route> {
    vec![Route::new(Method::GET, SOCKS_HEALTH_PATH, socks_health)]
}

/// Register the route table of `deployment` on `server`.
///
/// The SOCKS deployment answers unknown paths with 422 instead of 404.
pub fn install(server: &mut ServerRuntime, deployment: Deployment) -> Result<(), ServerError> {
    match deployment {
        Deployment::Wireguard => server.register_routes(&default_routes()),
        Deployment::Socks => {
            server.register_routes(&socks_routes())?;
            server.set_not_found_handler(
                StatusResponder::new(StatusCode::UNPROCESSABLE_ENTITY, NOT_FOUND_MESSAGE).into_handler(),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    name: &'static str,
    status: &'static str,
}

fn health(name: &'static str) -> Handler {
    handler(move || async move { Json(HealthStatus { name, status: "OK" }) })
}

fn wireguard_health(_: &ServerRuntime) -> Handler {
    health("wireguard")
}

fn socks_health(_: &ServerRuntime) -> Handler {
    health("socks proxy")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::test_support::request;
    use axum::body::to_bytes;
    use axum::http::header;
    use tower::ServiceExt;

    async fn call(handler: Handler) -> (StatusCode, String, String) {
        let response = handler.oneshot(request(Method::GET, "/")).await.unwrap();
        let status = response.status();
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn tables_hold_one_health_route_each() {
        let main = default_routes();
        assert_eq!(main.len(), 1);
        assert_eq!(main[0].method, Method::GET);
        assert_eq!(main[0].path, "/_healthz");

        let socks = socks_routes();
        assert_eq!(socks.len(), 1);
        assert_eq!(socks[0].path, "/socks_healthz");
    }

    #[tokio::test]
    async fn wireguard_health_body() {
        let (status, content_type, body) = call(health("wireguard")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        assert_eq!(body, r#"{"name":"wireguard","status":"OK"}"#);
    }

    #[tokio::test]
    async fn socks_health_body() {
        let (_, _, body) = call(health("socks proxy")).await;
        assert_eq!(body, r#"{"name":"socks proxy","status":"OK"}"#);
    }
}
