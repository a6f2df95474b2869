//! ferry-api — the router's HTTP surface.
//!
//! Applications block on the request endpoints; connectors upload through
//! the result/stream endpoints and hold push channels on /connect. The
//! route table is the whole external interface of the router.

pub mod body;
pub mod error;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use error::ApiError;
pub use handlers::ApiState;

use handlers::{app, connect, connector};

/// Slack over the decoded limit: base64 expansion plus JSON envelope.
fn body_limit_for(payload_limit: u64) -> usize {
    let encoded = payload_limit.saturating_mul(4).div_ceil(3);
    usize::try_from(encoded.saturating_add(64 * 1024)).unwrap_or(usize::MAX)
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let result_limit = body_limit_for(state.max_buffered_bytes);
    let chunk_limit = body_limit_for(state.max_chunk_size);

    Router::new()
        .route("/health", get(app::handle_health))
        .route("/metrics", get(app::handle_metrics))
        .route("/connectors", get(app::handle_connectors))
        .route("/connect", get(connect::handle_connect))
        .route("/datasets/request-sync", post(app::handle_request_sync))
        .route("/datasets/request-stream", post(app::handle_request_stream))
        .route("/datasets/request-offload", post(app::handle_request_offload))
        .route("/datasets/status/{request_id}", get(app::handle_status))
        .route(
            "/datasets/result",
            post(connector::handle_result).layer(DefaultBodyLimit::max(result_limit)),
        )
        .route("/datasets/stream/init", post(connector::handle_stream_init))
        .route(
            "/datasets/stream/chunk",
            post(connector::handle_stream_chunk).layer(DefaultBodyLimit::max(chunk_limit)),
        )
        .route(
            "/datasets/stream/complete",
            post(connector::handle_stream_complete),
        )
        .route("/datasets/stream/error", post(connector::handle_stream_error))
        .with_state(state)
        .layer(cors)
}

/// Serve the surface until `shutdown` resolves, then finish in-flight
/// connections. Draining broker and registry is the daemon's job once
/// this returns.
pub async fn serve(
    state: ApiState,
    listener: TcpListener,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "router listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
