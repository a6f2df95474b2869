//! Session registry behavior observed through the HTTP surface.

use crate::*;
use std::time::{Duration, Instant};

const MAC: &str = "cc-28-aa-cd-5c-74";

#[tokio::test(flavor = "multi_thread")]
async fn connectors_listing_shows_live_sessions() {
    let router = spawn_router().await;
    let _channel = PushChannel::connect(&router.base_url, MAC).await;

    let resp = client()
        .get(format!("{}/connectors", router.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let list = body.as_array().expect("array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["mac"], MAC);
    assert!(list[0]["connected_at"].as_u64().is_some());
}

/// The MAC is normalized, so colon-separated uppercase input lands on
/// the same session key.
#[tokio::test(flavor = "multi_thread")]
async fn mac_normalization_unifies_spellings() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, "CC:28:AA:CD:5C:74").await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-sync",
            json!({ "mac": "cc-28-aa-cd-5c-74", "dataset": "ds.json" }),
        )
        .await
    });

    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();
    upload_result_data(&router.base_url, &request_id, b"ok").await;

    assert_eq!(app.await.unwrap().status(), 200);
}

/// A request for a node with no session answers 503 immediately.
#[tokio::test(flavor = "multi_thread")]
async fn no_connector_fails_fast_with_503() {
    let router = spawn_router().await;

    let started = Instant::now();
    let resp = post_json(
        &router.base_url,
        "/datasets/request-sync",
        json!({ "mac": "aa-bb-cc-dd-ee-ff", "dataset": "ds.json" }),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "no_such_connector");
    assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
}

/// A second channel for the same MAC evicts the first. The request
/// dispatched to the old channel fails with connector_disconnected; a
/// new request is served by the replacement.
#[tokio::test(flavor = "multi_thread")]
async fn session_replacement_is_last_writer_wins() {
    let router = spawn_router().await;
    let mut first = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-sync",
            json!({ "mac": MAC, "dataset": "ds.json" }),
        )
        .await
    });

    // the command reaches the first channel, which never answers
    let command = first.next_command().await;
    assert!(command["request_id"].is_string());

    // replacement arrives
    let mut second = PushChannel::connect(&router.base_url, MAC).await;

    let resp = app.await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "connector_disconnected");

    // exactly one live session remains
    let listing: Value = client()
        .get(format!("{}/connectors", router.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing.as_array().unwrap().len(), 1);

    // and the replacement serves new requests
    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-sync",
            json!({ "mac": MAC, "dataset": "ds2.json" }),
        )
        .await
    });
    let command = second.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();
    upload_result_data(&router.base_url, &request_id, b"served by replacement").await;
    assert_eq!(app.await.unwrap().status(), 200);
}

/// A connector vanishing after dispatch fails the request
/// well inside two keepalive intervals.
#[tokio::test(flavor = "multi_thread")]
async fn connector_disconnect_fails_inflight_request() {
    let router = spawn_router_with(|config| {
        config.channel.keepalive_interval_s = 1;
    })
    .await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-sync",
            json!({ "mac": MAC, "dataset": "ds.json", "timeout_s": 10 }),
        )
        .await
    });

    let command = channel.next_command().await;
    assert!(command["request_id"].is_string());

    // connector drops off the network
    let started = Instant::now();
    drop(channel);

    let resp = app.await.unwrap();
    let elapsed = started.elapsed();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "connector_disconnected");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_ok() {
    let router = spawn_router().await;
    let resp = client()
        .get(format!("{}/health", router.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

/// Metrics counters reflect completed work.
#[tokio::test(flavor = "multi_thread")]
async fn metrics_count_completed_requests() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-sync",
            json!({ "mac": MAC, "dataset": "ds.json" }),
        )
        .await
    });
    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();
    upload_result_data(&router.base_url, &request_id, b"counted").await;
    assert_eq!(app.await.unwrap().status(), 200);

    let metrics: Value = client()
        .get(format!("{}/metrics", router.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["requests_sync"], 1);
    assert_eq!(metrics["requests_fulfilled"], 1);
    assert_eq!(metrics["buffered_bytes_total"], 7);
    assert_eq!(metrics["active_sessions"], 1);
}
