//! Offloaded pattern, end to end.

use crate::*;

const MAC: &str = "cc-28-aa-cd-5c-74";

/// The connector uploads to the object store out of band and hands
/// back a URL; the router never touches the bytes.
#[tokio::test(flavor = "multi_thread")]
async fn offload_happy_path_hands_back_url() {
    let router = spawn_router_with(|config| {
        config.offload.object_store_url = "http://minio:9000/ds".to_string();
    })
    .await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-offload",
            json!({ "mac": MAC, "dataset": "dataset_100mb.csv" }),
        )
        .await
    });

    let command = channel.next_command().await;
    assert_eq!(command["command"], "get_dataset_offload");
    // the store hint travels with the command
    assert_eq!(command["object_store_url"], "http://minio:9000/ds");
    let request_id = command["request_id"].as_str().unwrap().to_string();

    let ack = post_json(
        &router.base_url,
        "/datasets/result",
        json!({
            "request_id": request_id,
            "download_url": "http://minio:9000/ds/xyz",
            "size_bytes": 104857600u64,
        }),
    )
    .await;
    assert!(ack.status().is_success());

    let resp = app.await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["download_url"], "http://minio:9000/ds/xyz");
    assert_eq!(body["size_bytes"], 104857600u64);
}

/// The connector reports an upload failure instead of a URL.
#[tokio::test(flavor = "multi_thread")]
async fn offload_failure_report_surfaces_as_502() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-offload",
            json!({ "mac": MAC, "dataset": "dataset_100mb.csv" }),
        )
        .await
    });

    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();

    let ack = post_json(
        &router.base_url,
        "/datasets/result",
        json!({ "request_id": request_id, "error": "bucket unavailable" }),
    )
    .await;
    assert!(ack.status().is_success());

    let resp = app.await.unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "offload_failed");
    assert!(body["message"].as_str().unwrap().contains("bucket unavailable"));
}

/// A data-shaped upload against an offload request is rejected without
/// killing the request; the right-shaped upload still completes it.
#[tokio::test(flavor = "multi_thread")]
async fn offload_pattern_mismatch_is_rejected_not_fatal() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-offload",
            json!({ "mac": MAC, "dataset": "ds.csv" }),
        )
        .await
    });

    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();

    let wrong = upload_result_data(&router.base_url, &request_id, b"not a url").await;
    assert_eq!(wrong.status(), 400);
    let wrong_body: Value = wrong.json().await.unwrap();
    assert_eq!(wrong_body["error"], "protocol_violation");

    let right = post_json(
        &router.base_url,
        "/datasets/result",
        json!({ "request_id": request_id, "download_url": "http://store/obj", "size_bytes": 9 }),
    )
    .await;
    assert!(right.status().is_success());

    let resp = app.await.unwrap();
    assert_eq!(resp.status(), 200);
}
