//! Route path syntax translation.
//!
//! Route tables use `:name` for a parameter segment and `*name` for a
//! trailing catch-all. Backends with a different native syntax get their
//! paths rewritten token by token.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn param_tokens() -> &'static Regex {
    static PARAM_TOKENS: OnceLock<Regex> = OnceLock::new();
    PARAM_TOKENS.get_or_init(|| Regex::new(r"[:*]\w+").expect("parameter token pattern is valid"))
}

/// Rewrite `path` into the native syntax of `backend`.
///
/// Returns an empty string when the backend has no known mapping. Callers
/// must treat that as a configuration error, not as an empty path.
pub fn format_path(backend: &str, path: &str) -> String {
    let convert: fn(&str) -> Cow<'_, str> = if backend.eq_ignore_ascii_case(super::axum_router::NAME) {
        to_axum_token
    } else {
        return String::new();
    };

    param_tokens()
        .replace_all(path, |caps: &Captures<'_>| convert(&caps[0]).into_owned())
        .into_owned()
}

fn to_axum_token(token: &str) -> Cow<'_, str> {
    if let Some(name) = token.strip_prefix(':') {
        Cow::Owned(format!("{{{name}}}"))
    } else if let Some(name) = token.strip_prefix('*') {
        Cow::Owned(format!("{{*{name}}}"))
    } else {
        Cow::Borrowed(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axum_gets_brace_parameters() {
        assert_eq!(format_path("axum", ":id"), "{id}");
        assert_eq!(format_path("axum", "/users/:id/keys/:key"), "/users/{id}/keys/{key}");
        assert_eq!(format_path("AXUM", "/files/*rest"), "/files/{*rest}");
    }

    #[test]
    fn static_paths_are_unchanged() {
        assert_eq!(format_path("axum", "/_healthz"), "/_healthz");
        assert_eq!(format_path("axum", "/"), "/");
    }

    #[test]
    fn backends_without_mapping_yield_empty() {
        assert_eq!(format_path("unsupported", ":id"), "");
        assert_eq!(format_path("mux", "/users/:id"), "");
        assert_eq!(format_path("tree", "/users/:id"), "");
    }
}
