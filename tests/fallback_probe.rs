//! Fallback resolution tests: unregistered names probed against a
//! patterned host.
//!
//! The pattern `127.0.0.{name}:{port}` with a service named `1` derives
//! `127.0.0.1:{port}`, so the probe and the forwarded request both land on
//! a local mock backend.

use std::net::SocketAddr;

use portal_proxy::config::ProxyConfig;
use portal_proxy::http::HttpServer;
use portal_proxy::lifecycle::Shutdown;
use reqwest::redirect::Policy;

mod common;

fn fallback_config(backend: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.scheme = "http".to_string();
    config.upstream.request_timeout_secs = 2;
    config.public.host = "proxy.example.com".to_string();
    config.fallback.enabled = true;
    config.fallback.host_pattern = format!("127.0.0.{{name}}:{}", backend.port());
    config.fallback.probe_timeout_secs = 1;
    config
}

async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });
    (addr, shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn successful_probe_resolves_and_forwards() {
    let response = common::http_response(
        "200 OK",
        &[("Content-Type", "text/html")],
        br#"<a href="/next">next</a>"#,
    );
    let (backend, requests) = common::start_canned_backend(response).await;
    let (proxy, shutdown) = start_proxy(fallback_config(backend)).await;

    let res = client()
        .get(format!("http://{proxy}/1/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    // Synthetic entries go through the full rewrite pipeline too.
    let text = res.text().await.unwrap();
    assert!(text.contains(r#"href="/1/next""#), "got: {text}");

    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 2, "expected probe then forward, got: {seen:?}");
    assert!(seen[0].starts_with("GET / HTTP/1.1"), "got: {}", seen[0]);
    assert!(seen[1].starts_with("GET /hello HTTP/1.1"), "got: {}", seen[1]);
    drop(seen);

    shutdown.trigger();
}

#[tokio::test]
async fn probe_404_leaves_the_name_unknown() {
    let response = common::http_response("404 Not Found", &[], b"no such app");
    let (backend, requests) = common::start_canned_backend(response).await;
    let (proxy, shutdown) = start_proxy(fallback_config(backend)).await;

    let res = client()
        .get(format!("http://{proxy}/1/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.text().await.unwrap().contains("Service not found"));
    // Only the probe reached the backend; nothing was forwarded.
    assert_eq!(requests.lock().unwrap().len(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn probe_body_marker_leaves_the_name_unknown() {
    // Some platforms answer 200 with an error page; the configured marker
    // catches those.
    let response = common::http_response(
        "200 OK",
        &[("Content-Type", "text/html")],
        b"<h1>Application not found</h1>",
    );
    let (backend, requests) = common::start_canned_backend(response).await;
    let (proxy, shutdown) = start_proxy(fallback_config(backend)).await;

    let res = client()
        .get(format!("http://{proxy}/1/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(requests.lock().unwrap().len(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn probe_transport_failure_leaves_the_name_unknown() {
    // Bind then drop: the derived host refuses connections.
    let (listener, backend) = common::bind_backend().await;
    drop(listener);
    let (proxy, shutdown) = start_proxy(fallback_config(backend)).await;

    let res = client()
        .get(format!("http://{proxy}/1/hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.text().await.unwrap().contains("Service not found"));

    shutdown.trigger();
}
