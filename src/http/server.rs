//! HTTP server runtime.
//!
//! # Responsibilities
//! - Build a server from host, port, drain time, router backend and logger
//! - Register routes through the middleware chain
//! - Expose the server as two run-group tasks: serve and drain
//! - Serve HTTP/1.1 and HTTP/2 on every accepted connection
//! - Drain in-flight requests on stop, aborting them at the deadline
//!
//! # Design Decisions
//! - Two phases: `ServerBuilder::build` fixes settings, then routes are
//!   registered on the `ServerRuntime` until its tasks start
//! - The serve task never watches the stop signal; the drain task closes
//!   the listener, which ends serve with a benign `Ok`
//! - The not-found handler goes through the same middleware as routes
//!
//! # Data Flow
//! ```text
//! serve:  bind → accept → track connection → hyper (auto h1/h2)
//!             → ConnectInfo + body → router.dispatch
//! drain:  stop fired → close listener → graceful close per connection
//!             → wait (bounded by drain time) → abort stragglers
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use futures_util::FutureExt;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::config::ServiceConfig;
use crate::http::middleware::{self, ExceptionHook, MiddlewareContext};
use crate::http::routes::Route;
use crate::lifecycle::{BoxError, StopSignal, Task};
use crate::net::{ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::observability::Logger;
use crate::routing::{create_router, default_not_found, Handler, Router, RouterError};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4000;

/// Default grace period for in-flight requests.
pub const DEFAULT_DRAIN_TIME: Duration = Duration::from_secs(5);

/// Default router backend.
pub const DEFAULT_ROUTER: &str = "axum";

/// Errors raised while building, configuring or running a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("routes cannot be changed once the server is serving")]
    AlreadyServing,

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("drain did not complete within {timeout:?}: {remaining} connection(s) closed forcibly")]
    DrainTimeout { timeout: Duration, remaining: usize },
}

/// Lifecycle of a server runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built; tasks not started or listener not bound yet.
    Unstarted,
    /// Listener bound and accepting.
    Serving,
    /// Listener closed, waiting for in-flight requests.
    Draining,
    /// Drain finished, or the listener never came up.
    Stopped,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    state: ServerState,
    local_addr: Option<SocketAddr>,
}

/// State shared by the serve and drain tasks.
struct Shared {
    /// Cancelled by drain: stops the accept loop and starts graceful
    /// shutdown on every connection.
    closing: CancellationToken,
    connections: ConnectionTracker,
    status: watch::Sender<Status>,
}

impl Shared {
    fn new() -> Self {
        let (status, _) = watch::channel(Status {
            state: ServerState::Unstarted,
            local_addr: None,
        });
        Self {
            closing: CancellationToken::new(),
            connections: ConnectionTracker::new(),
            status,
        }
    }

    fn set_state(&self, state: ServerState) {
        self.status.send_modify(|status| status.state = state);
    }

    fn mark_serving(&self, local_addr: SocketAddr) {
        self.status.send_modify(|status| {
            status.state = ServerState::Serving;
            status.local_addr = Some(local_addr);
        });
    }
}

enum RouterSource {
    Named(String),
    Instance(Box<dyn Router>),
}

/// Settings of a server, fixed by [`ServerBuilder::build`].
pub struct ServerBuilder {
    host: String,
    port: u16,
    drain_time: Duration,
    router: RouterSource,
    logger: Logger,
    exception_hook: Option<ExceptionHook>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            drain_time: DEFAULT_DRAIN_TIME,
            router: RouterSource::Named(DEFAULT_ROUTER.to_string()),
            logger: Logger::default(),
            exception_hook: None,
        }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preset from the listener and server sections of `config`.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new()
            .host(&config.listener.host)
            .port(config.listener.port)
            .drain_time(config.server.drain_time())
            .router_name(&config.server.router)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn drain_time(mut self, drain_time: Duration) -> Self {
        self.drain_time = drain_time;
        self
    }

    /// Pick a router backend by name; resolved in `build`.
    pub fn router_name(mut self, name: impl Into<String>) -> Self {
        self.router = RouterSource::Named(name.into());
        self
    }

    /// Use an already constructed router.
    pub fn router(mut self, router: Box<dyn Router>) -> Self {
        self.router = RouterSource::Instance(router);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Called with every recovered handler panic.
    pub fn exception_hook(mut self, hook: ExceptionHook) -> Self {
        self.exception_hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<ServerRuntime, ServerError> {
        let mut router = match self.router {
            RouterSource::Named(name) => match create_router(&name) {
                Some(router) => router,
                None => return Err(RouterError::UnknownBackend(name).into()),
            },
            RouterSource::Instance(router) => router,
        };

        let mut middleware = MiddlewareContext::new(self.logger.clone());
        if let Some(hook) = self.exception_hook {
            middleware = middleware.with_exception_hook(hook);
        }

        router.set_not_found_handler(middleware::wrap(default_not_found(), &middleware));

        Ok(ServerRuntime {
            addr: format!("{}:{}", self.host, self.port),
            drain_time: self.drain_time,
            logger: self.logger,
            middleware,
            router: Arc::from(router),
            shared: Arc::new(Shared::new()),
        })
    }
}

/// A configured server, exposed as run-group tasks.
pub struct ServerRuntime {
    addr: String,
    drain_time: Duration,
    logger: Logger,
    middleware: MiddlewareContext,
    router: Arc<dyn Router>,
    shared: Arc<Shared>,
}

impl ServerRuntime {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Configured `host:port`.
    pub fn address(&self) -> &str {
        &self.addr
    }

    pub fn drain_time(&self) -> Duration {
        self.drain_time
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn router_name(&self) -> &'static str {
        self.router.name()
    }

    /// Register every route of `routes`.
    pub fn register_routes(&mut self, routes: &[Route]) -> Result<(), ServerError> {
        for route in routes {
            let handler = (route.handler)(self);
            self.handle(&route.method, route.path, handler)?;
        }
        Ok(())
    }

    /// Register one handler, wrapped in the middleware chain.
    pub fn handle(&mut self, method: &Method, path: &str, handler: Handler) -> Result<(), ServerError> {
        let handler = middleware::wrap(handler, &self.middleware);
        self.router_mut()?.register(method, path, handler)?;
        Ok(())
    }

    /// Replace the not-found handler, wrapped in the middleware chain.
    pub fn set_not_found_handler(&mut self, handler: Handler) -> Result<(), ServerError> {
        let handler = middleware::wrap(handler, &self.middleware);
        self.router_mut()?.set_not_found_handler(handler);
        Ok(())
    }

    fn router_mut(&mut self) -> Result<&mut (dyn Router + 'static), ServerError> {
        Arc::get_mut(&mut self.router).ok_or(ServerError::AlreadyServing)
    }

    /// The serve and drain tasks of this server, for a run group.
    ///
    /// Both tasks must run in the same group.
    pub fn runnables(&self) -> Vec<Task> {
        vec![self.serve_task(), self.drain_task()]
    }

    fn serve_task(&self) -> Task {
        let shared = Arc::clone(&self.shared);
        let router = Arc::clone(&self.router);
        let addr = self.addr.clone();
        let logger = self.logger.clone();
        Task::new("serve", move |_stop| async move {
            serve(shared, router, &addr, &logger).await.map_err(BoxError::from)
        })
    }

    fn drain_task(&self) -> Task {
        let shared = Arc::clone(&self.shared);
        let drain_time = self.drain_time;
        let logger = self.logger.clone();
        Task::new("drain", move |stop| async move {
            drain(shared, stop, drain_time, &logger).await.map_err(BoxError::from)
        })
    }

    /// Address the listener is bound to, once it is.
    ///
    /// Resolves to `None` if the server stopped without binding.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut status = self.shared.status.subscribe();
        let status = status
            .wait_for(|status| status.local_addr.is_some() || status.state == ServerState::Stopped)
            .await
            .ok()?;
        status.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.shared.status.borrow().state
    }

    /// Connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.shared.connections.active_count()
    }
}

impl std::fmt::Debug for ServerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRuntime")
            .field("addr", &self.addr)
            .field("drain_time", &self.drain_time)
            .field("router", &self.router.name())
            .field("state", &self.state())
            .finish()
    }
}

async fn serve(
    shared: Arc<Shared>,
    router: Arc<dyn Router>,
    addr: &str,
    logger: &Logger,
) -> Result<(), ServerError> {
    let listener = match Listener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            shared.set_state(ServerState::Stopped);
            if logger.enabled(Level::ERROR) {
                tracing::error!(labels = logger.labels(), address = addr, error = %e, "Listener failed");
            }
            return Err(e.into());
        }
    };
    let local_addr = listener.local_addr();
    shared.mark_serving(local_addr);

    if logger.enabled(Level::INFO) {
        tracing::info!(
            labels = logger.labels(),
            address = %local_addr,
            router = router.name(),
            "Server listening"
        );
    }

    loop {
        tokio::select! {
            biased;
            _ = shared.closing.cancelled() => break,
            (stream, peer) = listener.accept() => {
                let conn = serve_connection(stream, peer, Arc::clone(&router), shared.closing.clone());
                if !shared.connections.spawn(conn) {
                    break;
                }
            }
        }
    }

    if logger.enabled(Level::DEBUG) {
        tracing::debug!(labels = logger.labels(), address = %local_addr, "Listener closed");
    }
    Ok(())
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Arc<dyn Router>, closing: CancellationToken) {
    let id = ConnectionId::new();
    tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection opened");

    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        let mut request = request.map(Body::new);
        request.extensions_mut().insert(ConnectInfo(peer));
        router.dispatch(request).map(Ok::<_, Infallible>)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut closing_started = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %id, error = %e, "Connection error");
                }
                break;
            }
            _ = closing.cancelled(), if !closing_started => {
                closing_started = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    tracing::trace!(connection_id = %id, "Connection closed");
}

async fn drain(shared: Arc<Shared>, stop: StopSignal, drain_time: Duration, logger: &Logger) -> Result<(), ServerError> {
    stop.fired().await;

    shared.set_state(ServerState::Draining);
    shared.closing.cancel();

    let mut connections = shared.connections.close();
    if logger.enabled(Level::DEBUG) {
        tracing::debug!(
            labels = logger.labels(),
            in_flight = connections.len(),
            timeout = ?drain_time,
            "Draining connections"
        );
    }

    let result = match tokio::time::timeout(drain_time, connections.wait()).await {
        Ok(()) => Ok(()),
        Err(_) => {
            let remaining = connections.abort().await;
            Err(ServerError::DrainTimeout {
                timeout: drain_time,
                remaining,
            })
        }
    };

    let local_addr = shared.status.borrow().local_addr;
    shared.set_state(ServerState::Stopped);

    if logger.enabled(Level::INFO) {
        let addr = local_addr.map(|addr| addr.to_string()).unwrap_or_default();
        match &result {
            Ok(()) => tracing::info!(labels = logger.labels(), addr = %addr, "Shutdown completed"),
            Err(e) => tracing::info!(labels = logger.labels(), addr = %addr, error = %e, "Shutdown completed"),
        }
    }

    result
}
