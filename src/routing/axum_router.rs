//! `axum::Router` backend.
//!
//! axum matches methods natively but spells parameters `{name}`, so every
//! path goes through [`format_path`] first. The axum router is rebuilt from
//! the registered routes whenever they change; that only happens at startup.
//!
//! axum picks the path before it looks at the method, so a static route
//! shadows a parameter route at the same position for every method: with
//! `GET /users/me` and `POST /users/:id`, `POST /users/me` is a not-found.
//! The tree backend backtracks in that case.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter};
use futures_util::future::BoxFuture;
use tower::ServiceExt;

use crate::lifecycle::group::panic_message;
use crate::routing::{check_route, default_not_found, format_path, Handler, Router, RouterError};

pub const NAME: &str = "axum";

struct Registered {
    method: Method,
    /// Path in axum syntax.
    path: String,
    handler: Handler,
}

/// Router backed by `axum::Router`.
pub struct AxumRouter {
    routes: Vec<Registered>,
    not_found: Option<Handler>,
    router: axum::Router,
}

impl Default for AxumRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl AxumRouter {
    pub fn new() -> Self {
        let mut router = Self {
            routes: Vec::new(),
            not_found: None,
            router: axum::Router::new(),
        };
        router.router = router.build();
        router
    }

    fn not_found(&self) -> Handler {
        self.not_found.clone().unwrap_or_else(default_not_found)
    }

    fn build(&self) -> axum::Router {
        let not_found = self.not_found();

        let mut by_path: BTreeMap<&str, Vec<&Registered>> = BTreeMap::new();
        for route in &self.routes {
            by_path.entry(route.path.as_str()).or_default().push(route);
        }

        let mut router = axum::Router::new();
        for (path, routes) in by_path {
            let mut methods = MethodRouter::new();
            for route in &routes {
                // Registration only accepts methods with a matching filter.
                if let Ok(filter) = MethodFilter::try_from(route.method.clone()) {
                    methods = methods.on_service(filter, route.handler.clone());
                }
            }
            // axum answers HEAD with the GET route unless HEAD has its own.
            let has = |m: &Method| routes.iter().any(|r| r.method == *m);
            if has(&Method::GET) && !has(&Method::HEAD) {
                methods = methods.on_service(MethodFilter::HEAD, not_found.clone());
            }
            router = router.route(path, methods.fallback_service(not_found.clone()));
        }
        router.fallback_service(not_found)
    }

    /// Rebuild the axum router, turning axum's panics on bad paths into errors.
    fn rebuild(&mut self, original_path: &str) -> Result<(), RouterError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.build())) {
            Ok(router) => {
                self.router = router;
                Ok(())
            }
            Err(panic) => Err(RouterError::InvalidPath {
                path: original_path.to_string(),
                reason: panic_message(panic.as_ref()),
            }),
        }
    }
}

impl Router for AxumRouter {
    fn register(&mut self, method: &Method, path: &str, handler: Handler) -> Result<(), RouterError> {
        check_route(method, path)?;
        MethodFilter::try_from(method.clone()).map_err(|_| RouterError::UnsupportedMethod(method.clone()))?;

        let native = format_path(NAME, path);
        if native.is_empty() {
            return Err(RouterError::UnsupportedPathSyntax {
                backend: NAME,
                path: path.to_string(),
            });
        }

        if self.routes.iter().any(|r| r.method == *method && r.path == native) {
            return Err(RouterError::DuplicateRoute {
                method: method.clone(),
                path: path.to_string(),
            });
        }

        self.routes.push(Registered {
            method: method.clone(),
            path: native,
            handler,
        });
        if let Err(e) = self.rebuild(path) {
            self.routes.pop();
            return Err(e);
        }
        Ok(())
    }

    fn set_not_found_handler(&mut self, handler: Handler) {
        self.not_found = Some(handler);
        self.router = self.build();
    }

    fn dispatch(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        let router = self.router.clone();
        Box::pin(async move {
            match router.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler;
    use crate::routing::test_support::*;
    use axum::extract::Path;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn colon_parameters_reach_path_extractor() {
        let mut router = AxumRouter::new();
        router
            .register(
                &Method::GET,
                "/peers/:id",
                handler(|Path(id): Path<String>| async move { format!("peer {id}") }),
            )
            .unwrap();

        assert_eq!(send(&router, Method::GET, "/peers/9").await.1, "peer 9");
    }

    #[tokio::test]
    async fn explicit_head_route_is_kept() {
        let mut router = AxumRouter::new();
        router.register(&Method::GET, "/x", text("get")).unwrap();
        router.register(&Method::HEAD, "/x", text("head")).unwrap();

        assert_eq!(send(&router, Method::HEAD, "/x").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn static_path_shadows_parameter_path_for_other_methods() {
        let mut router = AxumRouter::new();
        router.register(&Method::GET, "/users/me", text("static")).unwrap();
        router.register(&Method::POST, "/users/:id", text("param")).unwrap();

        assert_eq!(send(&router, Method::GET, "/users/me").await.1, "static");
        assert_eq!(send(&router, Method::POST, "/users/you").await.1, "param");
        assert_eq!(send(&router, Method::POST, "/users/me").await.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflicting_parameters_are_an_error_not_a_panic() {
        let mut router = AxumRouter::new();
        router.register(&Method::GET, "/users/:id", text("a")).unwrap();

        let err = router.register(&Method::GET, "/users/:name", text("b")).unwrap_err();
        assert!(matches!(err, RouterError::InvalidPath { .. }));

        // The failed route was rolled back.
        assert_eq!(router.routes.len(), 1);
    }
}
