//! End-to-end request handling over real TCP connections.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::Value;

use wireguard_server::config::Deployment;
use wireguard_server::http::routes;
use wireguard_server::http::PanicReport;
use wireguard_server::routing::{handler, Handler, PathParams, RouterKind};

const BACKENDS: [&str; 3] = ["mux", "tree", "axum"];

#[tokio::test]
async fn health_check_on_every_backend() {
    for backend in BACKENDS {
        let mut server = common::local(backend).build().unwrap();
        routes::install(&mut server, Deployment::Wireguard).unwrap();
        let running = common::start(server).await;

        let res = reqwest::get(running.url("/_healthz")).await.unwrap();
        assert_eq!(res.status(), 200, "backend {backend}");
        assert_eq!(res.headers()["content-type"], "application/json");
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        assert_eq!(res.text().await.unwrap(), r#"{"name":"wireguard","status":"OK"}"#);

        running.stop().await.unwrap();
    }
}

#[tokio::test]
async fn unknown_paths_and_methods_are_not_found() {
    let client = reqwest::Client::new();
    for backend in BACKENDS {
        let mut server = common::local(backend).build().unwrap();
        routes::install(&mut server, Deployment::Wireguard).unwrap();
        let running = common::start(server).await;

        let res = client.get(running.url("/no-such-path")).send().await.unwrap();
        assert_eq!(res.status(), 404, "backend {backend}");
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "no matching route was found");

        for method in [Method::POST, Method::PUT, Method::DELETE] {
            let res = client.request(method.clone(), running.url("/_healthz")).send().await.unwrap();
            assert_eq!(res.status(), 404, "backend {backend}, method {method}");
        }

        running.stop().await.unwrap();
    }
}

#[tokio::test]
async fn socks_deployment_answers_unknown_paths_with_422() {
    let mut server = common::local("tree").build().unwrap();
    routes::install(&mut server, Deployment::Socks).unwrap();
    let running = common::start(server).await;

    let res = reqwest::get(running.url("/socks_healthz")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), r#"{"name":"socks proxy","status":"OK"}"#);

    let res = reqwest::get(running.url("/_healthz")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY.as_u16());
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn options_is_answered_without_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    for backend in BACKENDS {
        let mut server = common::local(backend).build().unwrap();
        let counter = calls.clone();
        server
            .handle(
                &Method::GET,
                "/counted",
                handler(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "counted"
                    }
                }),
            )
            .unwrap();
        let running = common::start(server).await;

        let res = reqwest::Client::new()
            .request(Method::OPTIONS, running.url("/counted"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "backend {backend}");
        assert_eq!(
            res.headers()["access-control-allow-methods"],
            "GET, POST, PUT, DELETE, PATCH, OPTIONS"
        );
        assert_eq!(res.headers()["access-control-allow-headers"], "Origin, Content-Type");
        assert!(res.text().await.unwrap().is_empty());

        running.stop().await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_handler_yields_500_and_server_keeps_serving() {
    let reports = Arc::new(AtomicUsize::new(0));
    let seen = reports.clone();
    let mut server = common::local("axum")
        .exception_hook(Arc::new(move |report: &PanicReport| {
            assert_eq!(report.message, "handler exploded");
            seen.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();
    server
        .handle(
            &Method::GET,
            "/boom",
            handler(|| async {
                if true {
                    panic!("handler exploded");
                }
                "unreachable"
            }),
        )
        .unwrap();
    routes::install(&mut server, Deployment::Wireguard).unwrap();
    let running = common::start(server).await;

    let client = reqwest::Client::new();
    let res = client.get(running.url("/boom")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        res.headers()["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, PATCH, OPTIONS"
    );
    assert_eq!(res.headers()["access-control-allow-headers"], "Origin, Content-Type");
    assert!(res.text().await.unwrap().is_empty());

    let res = client.get(running.url("/_healthz")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(reports.load(Ordering::SeqCst), 1);

    running.stop().await.unwrap();
}

fn echo_id() -> Handler {
    handler(|axum::Extension(params): axum::Extension<PathParams>| async move {
        params.get("id").unwrap_or_default().to_string()
    })
}

#[tokio::test]
async fn tree_backend_captures_path_parameters() {
    let mut server = common::local(RouterKind::Tree.name()).build().unwrap();
    server.handle(&Method::GET, "/peers/:id", echo_id()).unwrap();
    let running = common::start(server).await;

    let res = reqwest::get(running.url("/peers/wg0")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "wg0");

    let res = reqwest::get(running.url("/peers/wg0/extra")).await.unwrap();
    assert_eq!(res.status(), 404);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn axum_backend_translates_path_parameters() {
    let mut server = common::local(RouterKind::Axum.name()).build().unwrap();
    server
        .handle(
            &Method::GET,
            "/peers/:id",
            handler(|axum::extract::Path(id): axum::extract::Path<String>| async move { id }),
        )
        .unwrap();
    let running = common::start(server).await;

    let res = reqwest::get(running.url("/peers/wg1")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "wg1");

    running.stop().await.unwrap();
}
