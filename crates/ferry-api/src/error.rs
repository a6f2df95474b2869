//! Maps the request failure taxonomy onto the HTTP surface.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use ferry_core::error::ErrorBody;
use ferry_core::RequestError;

/// Wrapper so handlers can `?` a RequestError straight into a response.
#[derive(Debug)]
pub struct ApiError(pub RequestError);

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &RequestError) -> StatusCode {
    match err {
        RequestError::NoSuchConnector => StatusCode::SERVICE_UNAVAILABLE,
        RequestError::ConnectorDisconnected => StatusCode::BAD_GATEWAY,
        RequestError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        RequestError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        RequestError::ProtocolViolation(_) => StatusCode::BAD_REQUEST,
        RequestError::OffloadFailed(_) => StatusCode::BAD_GATEWAY,
        RequestError::UnknownRequest => StatusCode::NOT_FOUND,
        RequestError::Backpressure => StatusCode::SERVICE_UNAVAILABLE,
        RequestError::StreamGone | RequestError::AppDisconnected => StatusCode::GONE,
        RequestError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        RequestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(ErrorBody::from_error(&self.0));

        let mut response = (status, body).into_response();
        if matches!(self.0, RequestError::Backpressure) {
            // momentary condition; tell the connector when to retry
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}
