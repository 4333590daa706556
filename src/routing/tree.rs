//! Segment tree router backend.
//!
//! Understands route syntax natively: `:name` matches one non-empty
//! segment, a trailing `*name` matches the rest of the path. Each node keeps
//! its own method table, so method matching needs no emulation.
//!
//! Priority at each level: static segment, then parameter, then catch-all.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::routing::{call, check_route, Handler, PathParams, Router, RouterError};

pub const NAME: &str = "tree";

type MethodTable = HashMap<Method, Handler>;

#[derive(Clone, Default)]
struct Node {
    statics: HashMap<String, Node>,
    param: Option<Box<(String, Node)>>,
    catch_all: Option<(String, MethodTable)>,
    handlers: MethodTable,
}

enum Segment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

fn segments(path: &str) -> Vec<&str> {
    match path {
        "/" => Vec::new(),
        _ => path[1..].split('/').collect(),
    }
}

fn invalid(path: &str, reason: &str) -> RouterError {
    RouterError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn parse(path: &str) -> Result<Vec<Segment<'_>>, RouterError> {
    let raw = segments(path);
    let last = raw.len().saturating_sub(1);
    raw.iter()
        .enumerate()
        .map(|(i, seg)| {
            if let Some(name) = seg.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid(path, "parameter without a name"));
                }
                Ok(Segment::Param(name))
            } else if let Some(name) = seg.strip_prefix('*') {
                if name.is_empty() {
                    return Err(invalid(path, "catch-all without a name"));
                }
                if i != last {
                    return Err(invalid(path, "catch-all must be the last segment"));
                }
                Ok(Segment::CatchAll(name))
            } else {
                Ok(Segment::Static(seg))
            }
        })
        .collect()
}

impl Node {
    fn table_for(&mut self, path: &str, route: &[Segment<'_>]) -> Result<&mut MethodTable, RouterError> {
        let Some((head, rest)) = route.split_first() else {
            return Ok(&mut self.handlers);
        };

        match head {
            Segment::Static(seg) => self.statics.entry(seg.to_string()).or_default().table_for(path, rest),
            Segment::Param(name) => {
                let child = self
                    .param
                    .get_or_insert_with(|| Box::new((name.to_string(), Node::default())));
                if child.0 != *name {
                    return Err(invalid(path, "conflicts with a differently named parameter"));
                }
                child.1.table_for(path, rest)
            }
            Segment::CatchAll(name) => {
                let (existing, table) = self
                    .catch_all
                    .get_or_insert_with(|| (name.to_string(), MethodTable::new()));
                if existing.as_str() != *name {
                    return Err(invalid(path, "conflicts with a differently named catch-all"));
                }
                Ok(table)
            }
        }
    }

    /// Find the handler for `method` along `segments`.
    ///
    /// A node whose table lacks `method` is a dead end, so the search keeps
    /// backtracking into parameter and catch-all branches.
    fn find(&self, method: &Method, segments: &[&str], params: &mut Vec<(String, String)>) -> Option<&Handler> {
        let Some((head, rest)) = segments.split_first() else {
            return self.handlers.get(method);
        };

        if let Some(found) = self.statics.get(*head).and_then(|child| child.find(method, rest, params)) {
            return Some(found);
        }

        if let Some(child) = &self.param {
            if !head.is_empty() {
                params.push((child.0.clone(), head.to_string()));
                if let Some(found) = child.1.find(method, rest, params) {
                    return Some(found);
                }
                params.pop();
            }
        }

        let (name, table) = self.catch_all.as_ref()?;
        let found = table.get(method)?;
        params.push((name.clone(), segments.join("/")));
        Some(found)
    }
}

/// Router backed by a segment tree.
#[derive(Clone, Default)]
pub struct TreeRouter {
    root: Node,
    not_found: Option<Handler>,
}

impl TreeRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Router for TreeRouter {
    fn register(&mut self, method: &Method, path: &str, handler: Handler) -> Result<(), RouterError> {
        check_route(method, path)?;
        let route = parse(path)?;

        let table = self.root.table_for(path, &route)?;
        if table.contains_key(method) {
            return Err(RouterError::DuplicateRoute {
                method: method.clone(),
                path: path.to_string(),
            });
        }
        table.insert(method.clone(), handler);
        Ok(())
    }

    fn set_not_found_handler(&mut self, handler: Handler) {
        self.not_found = Some(handler);
    }

    fn dispatch(&self, mut request: Request<Body>) -> BoxFuture<'static, Response> {
        let mut params = Vec::new();
        let path_segments = segments(request.uri().path());

        let matched = self
            .root
            .find(request.method(), &path_segments, &mut params)
            .cloned();

        match matched {
            Some(handler) => {
                request.extensions_mut().insert(PathParams::from(params));
                call(Some(handler), request)
            }
            None => call(self.not_found.clone(), request),
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
