//! Access logging.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use tracing::Level;

use crate::observability::Logger;

/// What the access log knows about a request before it is served.
struct RequestLine {
    begin: Instant,
    host: String,
    path: String,
    remote_addr: String,
    method: Method,
}

impl RequestLine {
    fn new(request: &Request) -> Self {
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| request.uri().host())
            .unwrap_or("-")
            .to_string();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".to_string());

        Self {
            begin: Instant::now(),
            host,
            path: request.uri().path().to_string(),
            remote_addr,
            method: request.method().clone(),
        }
    }

    fn emit(&self, logger: &Logger, status: StatusCode, content_len: u64) {
        tracing::info!(
            labels = logger.labels(),
            host = %self.host,
            path = %self.path,
            remote_addr = %self.remote_addr,
            method = %self.method,
            status = status.as_u16(),
            content_len,
            took = ?self.begin.elapsed(),
            "Request served"
        );
    }
}

/// Log host, path, peer, method, status, size and latency of each request.
///
/// A panicking handler is logged as a 500 before the panic continues to the
/// recover step.
pub async fn access_log(State(logger): State<Logger>, request: Request, next: Next) -> Response {
    if !logger.enabled(Level::INFO) {
        return next.run(request).await;
    }

    let line = RequestLine::new(&request);

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            line.emit(&logger, response.status(), content_len(&response));
            response
        }
        Err(panic) => {
            line.emit(&logger, StatusCode::INTERNAL_SERVER_ERROR, 0);
            std::panic::resume_unwind(panic)
        }
    }
}

fn content_len(response: &Response) -> u64 {
    response
        .body()
        .size_hint()
        .exact()
        .or_else(|| {
            response
                .headers()
                .get(header::CONTENT_LENGTH)?
                .to_str()
                .ok()?
                .parse()
                .ok()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{wrap, MiddlewareContext};
    use crate::routing::handler;
    use axum::body::Body;
    use axum::http;
    use axum::middleware::from_fn_with_state;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tower::{ServiceBuilder, ServiceExt};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    type Fields = HashMap<String, String>;

    /// Layer keeping the fields of every event.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<Fields>>>);

    impl Captured {
        fn served(&self) -> Vec<Fields> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|fields| fields.get("message").map(String::as_str) == Some("Request served"))
                .cloned()
                .collect()
        }
    }

    struct FieldMap<'a>(&'a mut Fields);

    impl Visit for FieldMap<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = Fields::new();
            event.record(&mut FieldMap(&mut fields));
            self.0.lock().unwrap().push(fields);
        }
    }

    fn logger() -> Logger {
        Logger::create("info", &[("app", "wireguard"), ("type", "server")])
    }

    #[tokio::test]
    async fn logs_every_request_field() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

        let svc = ServiceBuilder::new()
            .layer(from_fn_with_state(logger(), access_log))
            .service(handler(|| async { (StatusCode::CREATED, "hello") }));

        let mut request = http::Request::builder()
            .method(Method::POST)
            .uri("/peers?name=wg0")
            .header(header::HOST, "wg.example")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("10.0.0.7:5555".parse::<SocketAddr>().unwrap()));
        let response = svc.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let served = captured.served();
        assert_eq!(served.len(), 1);
        let line = &served[0];
        assert_eq!(line["labels"], "app=wireguard type=server");
        assert_eq!(line["host"], "wg.example");
        assert_eq!(line["path"], "/peers");
        assert_eq!(line["remote_addr"], "10.0.0.7:5555");
        assert_eq!(line["method"], "POST");
        assert_eq!(line["status"], "201");
        assert_eq!(line["content_len"], "5");
        assert!(line.contains_key("took"));
    }

    #[tokio::test]
    async fn missing_peer_and_host_are_dashes() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

        let svc = ServiceBuilder::new()
            .layer(from_fn_with_state(logger(), access_log))
            .service(handler(|| async { "ok" }));
        let request = http::Request::builder().uri("/_healthz").body(Body::empty()).unwrap();
        svc.oneshot(request).await.unwrap();

        let served = captured.served();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0]["remote_addr"], "-");
        assert_eq!(served[0]["host"], "-");
        assert_eq!(served[0]["method"], "GET");
        assert_eq!(served[0]["status"], "200");
    }

    #[tokio::test]
    async fn panicking_request_is_logged_as_500() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

        let wrapped = wrap(
            handler(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
            &MiddlewareContext::new(logger()),
        );
        let request = http::Request::builder().uri("/boom").body(Body::empty()).unwrap();
        let response = wrapped.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let served = captured.served();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0]["path"], "/boom");
        assert_eq!(served[0]["status"], "500");
        assert_eq!(served[0]["content_len"], "0");
    }

    #[tokio::test]
    async fn silent_logger_emits_nothing() {
        let captured = Captured::default();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

        let svc = ServiceBuilder::new()
            .layer(from_fn_with_state(Logger::nil(), access_log))
            .service(handler(|| async { "ok" }));
        svc.oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(captured.served().is_empty());
    }

    #[test]
    fn content_len_prefers_exact_body_size() {
        let response = Response::new(Body::from("twelve bytes"));
        assert_eq!(content_len(&response), 12);
    }

    #[test]
    fn empty_body_has_zero_length() {
        assert_eq!(content_len(&Response::new(Body::empty())), 0);
    }
}
