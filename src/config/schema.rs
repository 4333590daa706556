//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// HTTP server settings.
    pub server: ServerSection,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host; empty is rejected by validation.
    pub host: String,

    /// Bind port; 0 picks an ephemeral port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

impl ListenerConfig {
    /// `host:port` as handed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Routing backend: "mux", "tree" or "axum" (case-insensitive).
    pub router: String,

    /// Grace period for in-flight requests on shutdown.
    pub drain_time_secs: u64,

    /// Which route table to serve.
    pub deployment: Deployment,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            router: "axum".to_string(),
            drain_time_secs: 5,
            deployment: Deployment::Wireguard,
        }
    }
}

impl ServerSection {
    pub fn drain_time(&self) -> Duration {
        Duration::from_secs(self.drain_time_secs)
    }
}

/// Route table selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    /// `/_healthz`, default 404 not-found.
    #[default]
    Wireguard,
    /// `/socks_healthz`, 422 not-found.
    Socks,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn/warning, err/error, panic, fatal).
    /// Unknown names fall back to info.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}
