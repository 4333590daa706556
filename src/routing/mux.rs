//! Plain path multiplexer backend.
//!
//! # Responsibilities
//! - Match requests by path only (`PathMux`)
//! - Emulate method matching with an explicit `MethodGuard` per path
//!
//! # Design Decisions
//! - Exact patterns win over subtree patterns
//! - A pattern ending in `/` matches its whole subtree; longest one wins
//! - No parameter syntax: `:id` is a literal segment here

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::routing::{call, check_route, Handler, Router, RouterError};

pub const NAME: &str = "mux";

/// Path-only matcher. Knows nothing about methods.
#[derive(Debug, Clone)]
pub struct PathMux<T> {
    exact: HashMap<String, T>,
    /// Subtree patterns, longest first.
    subtrees: Vec<(String, T)>,
}

impl<T> Default for PathMux<T> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            subtrees: Vec::new(),
        }
    }
}

impl<T> PathMux<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry registered under exactly `pattern`, inserting a default one.
    pub fn entry(&mut self, pattern: &str) -> &mut T
    where
        T: Default,
    {
        if pattern.ends_with('/') {
            let idx = match self.subtrees.iter().position(|(p, _)| p == pattern) {
                Some(idx) => idx,
                None => {
                    let idx = self
                        .subtrees
                        .iter()
                        .position(|(p, _)| p.len() < pattern.len())
                        .unwrap_or(self.subtrees.len());
                    self.subtrees.insert(idx, (pattern.to_string(), T::default()));
                    idx
                }
            };
            &mut self.subtrees[idx].1
        } else {
            self.exact.entry(pattern.to_string()).or_default()
        }
    }

    /// Find the entry serving `path`.
    pub fn lookup(&self, path: &str) -> Option<&T> {
        self.exact.get(path).or_else(|| {
            self.subtrees
                .iter()
                .find(|(pattern, _)| path.starts_with(pattern.as_str()))
                .map(|(_, value)| value)
        })
    }
}

/// Per-path method filter wrapped around the path-only mux.
#[derive(Clone, Default)]
pub struct MethodGuard {
    handlers: HashMap<Method, Handler>,
}

impl MethodGuard {
    /// Handler for `method`, if one was registered.
    pub fn route(&self, method: &Method) -> Option<&Handler> {
        self.handlers.get(method)
    }
}

/// Router backed by [`PathMux`] plus [`MethodGuard`].
#[derive(Clone, Default)]
pub struct MuxRouter {
    mux: PathMux<MethodGuard>,
    not_found: Option<Handler>,
}

impl MuxRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Router for MuxRouter {
    fn register(&mut self, method: &Method, path: &str, handler: Handler) -> Result<(), RouterError> {
        check_route(method, path)?;

        let guard = self.mux.entry(path);
        if guard.handlers.contains_key(method) {
            return Err(RouterError::DuplicateRoute {
                method: method.clone(),
                path: path.to_string(),
            });
        }
        guard.handlers.insert(method.clone(), handler);
        Ok(())
    }

    fn set_not_found_handler(&mut self, handler: Handler) {
        self.not_found = Some(handler);
    }

    fn dispatch(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        let matched = self
            .mux
            .lookup(request.uri().path())
            .and_then(|guard| guard.route(request.method()))
            .or(self.not_found.as_ref())
            .cloned();
        call(matched, request)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
