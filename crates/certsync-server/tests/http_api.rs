// crates/certsync-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end requests against a live registry listener.
// Purpose: Ensure routes, headers, and status codes are wired correctly.
// Dependencies: certsync-server, reqwest, tokio
// ============================================================================

//! ## Overview
//! Serves the router on `127.0.0.1:0` and drives it with an HTTP client.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use certsync_server::IngestionService;
use certsync_server::build_router;
use common::ADMIN_TOKEN;
use common::INGEST_TOKEN;
use common::INSTANCE;
use common::allow;
use common::bearer;
use common::fixture;
use common::issued_payload;
use serde_json::Value;
use serde_json::json;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serves the router and returns its base URL.
async fn spawn_server(service: Arc<IngestionService>) -> (String, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, build_router(service))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    (format!("http://{addr}"), shutdown_tx)
}

/// Reads a response as status and JSON body.
async fn read(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap();
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn submission_and_reads_over_http() {
    let fixture = fixture();
    allow(&fixture.registry, "CA01");
    let (base, shutdown) = spawn_server(fixture.service.clone()).await;
    let client = reqwest::Client::new();
    let payload = issued_payload("77AA", "2027-01-05T10:00:00Z");

    let response = client
        .post(format!("{base}/api/certificate-data"))
        .header("Authorization", bearer(INGEST_TOKEN))
        .header("X-Producer-Instance-Id", INSTANCE)
        .header("Content-Type", "application/json")
        .body(payload.to_string())
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "created");

    let response = client
        .post(format!("{base}/api/certificate-data"))
        .header("X-Producer-Instance-Id", INSTANCE)
        .body(payload.to_string())
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "unauthenticated");

    let response = client
        .get(format!("{base}/api/certificates/CA01/77AA"))
        .header("Authorization", bearer(INGEST_TOKEN))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["serialNumber"], "77AA");
    assert_eq!(body["templateName"], "WebServer");

    let response = client
        .get(format!("{base}/api/certificates/expiring?days=3650"))
        .header("Authorization", bearer(INGEST_TOKEN))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["certificates"][0]["serialNumber"], "77AA");

    let response = client
        .get(format!("{base}/api/certificates/CA01/MISSING"))
        .header("Authorization", bearer(INGEST_TOKEN))
        .send()
        .await
        .unwrap();
    assert_eq!(read(response).await.0, 404);
    let _ = shutdown.send(());
}

#[tokio::test(flavor = "multi_thread")]
async fn producer_management_over_http() {
    let fixture = fixture();
    let (base, shutdown) = spawn_server(fixture.service.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/api/manage/producers"))
        .header("Authorization", bearer(ADMIN_TOKEN))
        .body(json!({ "producerAccount": "ca09", "instanceId": INSTANCE }).to_string())
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, 201);
    let id = body["producerId"].as_i64().unwrap();

    let response = client
        .delete(format!("{base}/api/manage/producers/{id}"))
        .header("Authorization", bearer(ADMIN_TOKEN))
        .send()
        .await
        .unwrap();
    let (status, body) = read(response).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "inactive");

    let response = client
        .get(format!("{base}/api/manage/producers"))
        .header("Authorization", bearer(INGEST_TOKEN))
        .send()
        .await
        .unwrap();
    assert_eq!(read(response).await.0, 401);
    let _ = shutdown.send(());
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_body_is_rejected() {
    let fixture = common::fixture_with_limit(128);
    let (base, shutdown) = spawn_server(fixture.service.clone()).await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{base}/api/certificate-data"))
        .header("Authorization", bearer(INGEST_TOKEN))
        .header("X-Producer-Instance-Id", INSTANCE)
        .body(vec![b' '; 129])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 413);
    let _ = shutdown.send(());
}
