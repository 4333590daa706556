//! WireGuard control-plane HTTP server.
//!
//! ```text
//!     CLI flags + optional TOML file
//!         → ServiceConfig (validated)
//!         → logging init
//!         → ServerRuntime (router backend + route table)
//!         → RunGroup [signals, serve, drain]
//!
//!     SIGINT/SIGTERM → signals task ends → stop fires
//!         → drain closes the listener → in-flight requests finish
//!         → all tasks return → exit
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use wireguard_server::config::loader::{parse_config, read_config};
use wireguard_server::config::validation::validate_config;
use wireguard_server::config::{ConfigError, Deployment, ServiceConfig};
use wireguard_server::http::routes;
use wireguard_server::lifecycle::{signals, GroupError, Interrupted, RunGroup};
use wireguard_server::observability::{logging, Logger};
use wireguard_server::ServerBuilder;

#[derive(Debug, Parser)]
#[command(name = "wireguard-server")]
#[command(about = "HTTP control plane for the WireGuard and SOCKS servers", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Routing backend: mux, tree or axum.
    #[arg(long)]
    router: Option<String>,

    /// Seconds in-flight requests get on shutdown.
    #[arg(long)]
    drain_time: Option<u64>,

    #[arg(long, value_enum)]
    deployment: Option<Deployment>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Read the file, apply flag overrides, then validate the result.
    fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => parse_config("")?,
        };

        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(router) = &self.router {
            config.server.router = router.clone();
        }
        if let Some(secs) = self.drain_time {
            config.server.drain_time_secs = secs;
        }
        if let Some(deployment) = self.deployment {
            config.server.deployment = deployment;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wireguard-server: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("wireguard-server: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = match config.server.deployment {
        Deployment::Wireguard => "wireguard",
        Deployment::Socks => "socks",
    };
    let logger = Logger::create(&config.observability.log_level, &[("app", app), ("type", "server")]);

    let mut server = ServerBuilder::from_config(&config).logger(logger).build()?;
    routes::install(&mut server, config.server.deployment)?;

    tracing::info!(
        address = server.address(),
        router = server.router_name(),
        deployment = app,
        drain_time = ?server.drain_time(),
        "Configuration loaded"
    );

    let mut group = RunGroup::new();
    group.add(signals::watch_task());
    for task in server.runnables() {
        group.add(task);
    }

    match group.run().await {
        Ok(()) => Ok(()),
        Err(GroupError::Task { source, .. }) if source.is::<Interrupted>() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
