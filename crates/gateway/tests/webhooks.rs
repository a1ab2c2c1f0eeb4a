//! Integration tests for signed inbound webhooks.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    reqwest::{Client, StatusCode},
    secrecy::Secret,
    serde_json::{Value, json},
    tokio::net::TcpListener,
};

use {
    warden_auth::webhook,
    warden_config::{WardenConfig, WebhookSourceConfig},
    warden_gateway::{
        server::build_gateway_app,
        services::{GatewayServices, ServiceResult, WebhookEvent, WebhookService},
        state::GatewayState,
    },
};

const SECRET: &str = "It's a Secret to Everybody";

/// Records every event it is handed.
#[derive(Default)]
struct RecordingWebhooks {
    events: Mutex<Vec<WebhookEvent>>,
}

#[async_trait]
impl WebhookService for RecordingWebhooks {
    async fn dispatch(&self, event: WebhookEvent) -> ServiceResult {
        let name = event.event.clone();
        self.events.lock().unwrap().push(event);
        Ok(json!({ "handled": name }))
    }
}

async fn start_server(services: GatewayServices) -> SocketAddr {
    let mut config = WardenConfig::default();
    config.auth.token_secret = Some(Secret::new("webhook-test-secret-0123456789abc".into()));
    config
        .webhooks
        .insert("github".into(), WebhookSourceConfig::new(SECRET));
    let mut custom = WebhookSourceConfig::new("custom-source-secret-value");
    custom.signature_header = "x-signature".into();
    custom.event_header = "x-event".into();
    config.webhooks.insert("custom".into(), custom);

    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let state = GatewayState::new(&config, pool, services).await.unwrap();
    let app = build_gateway_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn deliver(
    addr: SocketAddr,
    source: &str,
    body: &[u8],
    headers: &[(&str, &str)],
) -> reqwest::Response {
    let mut request = Client::new()
        .post(format!("http://{addr}/api/webhooks/{source}"))
        .header("content-type", "application/json")
        .body(body.to_vec());
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn signed_ping_is_answered() {
    let addr = start_server(GatewayServices::noop()).await;
    let body = br#"{"zen":"Keep it logically awesome."}"#;
    let signature = webhook::sign(body, SECRET.as_bytes()).unwrap();

    let resp = deliver(addr, "github", body, &[
        ("x-hub-signature-256", signature.as_str()),
        ("x-github-event", "ping"),
        ("x-github-delivery", "d-1"),
    ])
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let out: Value = resp.json().await.unwrap();
    assert_eq!(out["message"], "pong");
}

#[tokio::test]
async fn verified_event_reaches_service() {
    let recorder = Arc::new(RecordingWebhooks::default());
    let addr = start_server(GatewayServices::noop().with_webhooks(recorder.clone())).await;
    let body = br#"{"action":"opened","number":7}"#;
    let signature = webhook::sign(body, SECRET.as_bytes()).unwrap();

    let resp = deliver(addr, "github", body, &[
        ("x-hub-signature-256", signature.as_str()),
        ("x-github-event", "pull_request"),
        ("x-github-delivery", "d-42"),
    ])
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "github");
    assert_eq!(events[0].event, "pull_request");
    assert_eq!(events[0].delivery_id.as_deref(), Some("d-42"));
    assert_eq!(events[0].payload["number"], 7);
}

#[tokio::test]
async fn tampered_body_never_reaches_service() {
    let recorder = Arc::new(RecordingWebhooks::default());
    let addr = start_server(GatewayServices::noop().with_webhooks(recorder.clone())).await;
    let body = br#"{"action":"opened","number":7}"#;
    let signature = webhook::sign(body, SECRET.as_bytes()).unwrap();

    let resp = deliver(addr, "github", br#"{"action":"opened","number":8}"#, &[
        ("x-hub-signature-256", signature.as_str()),
        ("x-github-event", "pull_request"),
    ])
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let out: Value = resp.json().await.unwrap();
    assert_eq!(out["error"], "invalid signature");

    let resp = deliver(addr, "github", body, &[("x-github-event", "pull_request")]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert!(recorder.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn each_source_uses_its_own_secret_and_headers() {
    let addr = start_server(GatewayServices::noop()).await;
    let body = br#"{"id":1}"#;

    // Signed with the github secret, delivered to the custom source.
    let wrong = webhook::sign(body, SECRET.as_bytes()).unwrap();
    let headers = [("x-signature", wrong.as_str()), ("x-event", "thing")];
    let resp = deliver(addr, "custom", body, &headers).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let right = webhook::sign(body, b"custom-source-secret-value").unwrap();
    let headers = [("x-signature", right.as_str()), ("x-event", "thing")];
    let resp = deliver(addr, "custom", body, &headers).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let addr = start_server(GatewayServices::noop()).await;
    let resp = deliver(addr, "gitlab", b"{}", &[("x-hub-signature-256", "sha256=00")]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_but_unparseable_payload_is_bad_request() {
    let addr = start_server(GatewayServices::noop()).await;
    let body = b"not json";
    let signature = webhook::sign(body, SECRET.as_bytes()).unwrap();

    let resp = deliver(addr, "github", body, &[
        ("x-hub-signature-256", signature.as_str()),
        ("x-github-event", "push"),
    ])
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = b"{}";
    let signature = webhook::sign(body, SECRET.as_bytes()).unwrap();
    let resp = deliver(addr, "github", body, &[("x-hub-signature-256", signature.as_str())]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
