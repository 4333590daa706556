//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Provide the labelled `Logger` handed to the server
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - RUST_LOG overrides the configured level

use std::fmt;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Install the global tracing subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match parse_level(&config.log_level) {
            Some(level) => LevelFilter::from_level(level),
            None => LevelFilter::OFF,
        };
        EnvFilter::default().add_directive(level.into())
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    }
}

/// Map a level name to a tracing level.
///
/// `nil` disables logging and yields `None`. `panic` and `fatal` map to
/// error; unknown names fall back to info.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_ascii_lowercase().as_str() {
        "nil" => None,
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "warn" | "warning" => Some(Level::WARN),
        "err" | "error" | "panic" | "fatal" => Some(Level::ERROR),
        _ => Some(Level::INFO),
    }
}

/// Logger value threaded into the server.
///
/// Carries a level threshold and flat key/value labels attached to every
/// event the server emits through it.
#[derive(Clone)]
pub struct Logger {
    level: Option<Level>,
    labels: Arc<str>,
}

impl Logger {
    /// Create a logger from a level name and key/value labels.
    pub fn create(level: &str, labels: &[(&str, &str)]) -> Self {
        let labels = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            level: parse_level(level),
            labels: labels.into(),
        }
    }

    /// Logger that discards everything.
    pub fn nil() -> Self {
        Self {
            level: None,
            labels: Arc::from(""),
        }
    }

    /// Returns true if events at `level` are emitted.
    pub fn enabled(&self, level: Level) -> bool {
        // tracing orders levels by verbosity: ERROR < WARN < ... < TRACE.
        self.level.is_some_and(|threshold| level <= threshold)
    }

    pub fn labels(&self) -> &str {
        &self.labels
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::create("info", &[])
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("labels", &self.labels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level("warning"), Some(Level::WARN));
        assert_eq!(parse_level("err"), Some(Level::ERROR));
        assert_eq!(parse_level("fatal"), Some(Level::ERROR));
        assert_eq!(parse_level("whatever"), Some(Level::INFO));
        assert_eq!(parse_level("nil"), None);
    }

    #[test]
    fn threshold_filters_verbose_levels() {
        let logger = Logger::create("warn", &[]);
        assert!(logger.enabled(Level::ERROR));
        assert!(logger.enabled(Level::WARN));
        assert!(!logger.enabled(Level::INFO));
    }

    #[test]
    fn nil_logger_is_silent() {
        let logger = Logger::nil();
        assert!(!logger.enabled(Level::ERROR));
        assert!(!Logger::create("nil", &[]).enabled(Level::ERROR));
    }

    #[test]
    fn labels_are_flat_pairs() {
        let logger = Logger::create("info", &[("app", "wireguard"), ("type", "server")]);
        assert_eq!(logger.labels(), "app=wireguard type=server");
    }
}
