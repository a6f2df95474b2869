//! Streamed pattern, end to end.

use crate::*;

const MAC: &str = "cc-28-aa-cd-5c-74";

/// Several chunks relayed in order; the application
/// receives the exact concatenation.
#[tokio::test(flavor = "multi_thread")]
async fn stream_happy_path_preserves_order_and_bytes() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    // 5 chunks of distinct content
    let chunks: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 1024]).collect();
    let expected: Vec<u8> = chunks.iter().flatten().copied().collect();

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-stream",
            json!({ "mac": MAC, "dataset": "dataset_5kb.csv" }),
        )
        .await
    });

    let command = channel.next_command().await;
    assert_eq!(command["command"], "get_dataset_stream");
    let request_id = command["request_id"].as_str().unwrap().to_string();

    let chunk_refs: Vec<&[u8]> = chunks.iter().map(|c| c.as_slice()).collect();
    upload_stream(&router.base_url, &request_id, &chunk_refs).await;

    let resp = app.await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("x-request-id").unwrap().to_str().unwrap(),
        request_id
    );
    let body = resp.bytes().await.expect("full body");
    assert_eq!(&body[..], &expected[..]);

    let (_, status) = get_status(&router.base_url, &request_id).await;
    assert_eq!(status["state"], "fulfilled");
    assert_eq!(status["total_chunks"], 5);
    assert_eq!(status["size_bytes"], 5 * 1024);
}

/// An empty dataset streams as one empty chunk plus the
/// terminal record.
#[tokio::test(flavor = "multi_thread")]
async fn stream_empty_dataset_succeeds() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        post_json(
            &base,
            "/datasets/request-stream",
            json!({ "mac": MAC, "dataset": "empty.csv" }),
        )
        .await
    });

    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();
    upload_stream(&router.base_url, &request_id, &[b"".as_slice()]).await;

    let resp = app.await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.bytes().await.unwrap();
    assert!(body.is_empty());

    let (_, status) = get_status(&router.base_url, &request_id).await;
    assert_eq!(status["state"], "fulfilled");
    assert_eq!(status["total_chunks"], 1);
}

/// A sequence gap is rejected before it reaches the application and
/// terminates the request as protocol_violation.
#[tokio::test(flavor = "multi_thread")]
async fn stream_sequence_gap_aborts_request() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        let resp = post_json(
            &base,
            "/datasets/request-stream",
            json!({ "mac": MAC, "dataset": "gappy.csv" }),
        )
        .await;
        // headers are already out; the gap can only abort the body
        let status = resp.status();
        let body = resp.bytes().await;
        (status, body)
    });

    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();

    post_json(
        &router.base_url,
        "/datasets/stream/init",
        json!({ "request_id": request_id }),
    )
    .await;
    let ok = post_json(
        &router.base_url,
        "/datasets/stream/chunk",
        json!({ "request_id": request_id, "seq": 0, "data": b64(b"first") }),
    )
    .await;
    assert!(ok.status().is_success());

    // seq jumps 1 → 3
    let gap = post_json(
        &router.base_url,
        "/datasets/stream/chunk",
        json!({ "request_id": request_id, "seq": 3, "data": b64(b"gap") }),
    )
    .await;
    assert_eq!(gap.status(), 400);
    let gap_body: Value = gap.json().await.unwrap();
    assert_eq!(gap_body["error"], "protocol_violation");

    let (status, body) = app.await.unwrap();
    assert_eq!(status, 200);
    assert!(body.is_err(), "truncated stream must surface as an error");

    let (_, snapshot) = get_status(&router.base_url, &request_id).await;
    assert_eq!(snapshot["state"], "failed");
    assert_eq!(snapshot["error"]["error"], "protocol_violation");
}

/// A connector-reported stream error aborts the body and marks the
/// request failed.
#[tokio::test(flavor = "multi_thread")]
async fn stream_error_report_aborts_request() {
    let router = spawn_router().await;
    let mut channel = PushChannel::connect(&router.base_url, MAC).await;

    let base = router.base_url.clone();
    let app = tokio::spawn(async move {
        let resp = post_json(
            &base,
            "/datasets/request-stream",
            json!({ "mac": MAC, "dataset": "broken.csv" }),
        )
        .await;
        resp.bytes().await
    });

    let command = channel.next_command().await;
    let request_id = command["request_id"].as_str().unwrap().to_string();

    post_json(
        &router.base_url,
        "/datasets/stream/init",
        json!({ "request_id": request_id }),
    )
    .await;
    post_json(
        &router.base_url,
        "/datasets/stream/chunk",
        json!({ "request_id": request_id, "seq": 0, "data": b64(b"partial") }),
    )
    .await;
    let report = post_json(
        &router.base_url,
        "/datasets/stream/error",
        json!({ "request_id": request_id, "message": "disk read failed" }),
    )
    .await;
    assert!(report.status().is_success());

    let body = app.await.unwrap();
    assert!(body.is_err(), "aborted stream must surface as an error");

    let (_, snapshot) = get_status(&router.base_url, &request_id).await;
    assert_eq!(snapshot["state"], "failed");
}

/// Chunks for a request nobody started are 404.
#[tokio::test(flavor = "multi_thread")]
async fn stream_chunk_for_unknown_request_is_404() {
    let router = spawn_router().await;

    let resp = post_json(
        &router.base_url,
        "/datasets/stream/chunk",
        json!({ "request_id": "ffffffffffffffffffffffffffffffff", "seq": 0, "data": "" }),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "unknown_request");
}
