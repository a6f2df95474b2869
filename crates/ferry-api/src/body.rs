//! The streamed response body for stream-pattern requests.
//!
//! Hand-implemented `http_body::Body` so the response can end with a
//! trailers frame carrying the request timings. Chunks are written in
//! the order the pipe delivers them; a pipe that ends without a terminal
//! record aborts the body with an error, which makes the truncation
//! visible to the application instead of looking like a clean EOF.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use http_body::{Body, Frame};

use ferry_core::RequestError;
use ferry_services::{PendingRequest, RequestBroker, StreamConsumer, StreamItem};

pub const TIMINGS_TRAILER: HeaderName = HeaderName::from_static("x-ferry-timings");

type BoxError = Box<dyn std::error::Error + Send + Sync>;

enum BodyState {
    Streaming,
    Done,
}

pub struct StreamBody {
    broker: RequestBroker,
    request: Arc<PendingRequest>,
    consumer: StreamConsumer,
    deadline: Pin<Box<tokio::time::Sleep>>,
    state: BodyState,
}

impl StreamBody {
    pub fn new(broker: RequestBroker, request: Arc<PendingRequest>, consumer: StreamConsumer) -> Self {
        let deadline = tokio::time::sleep_until(tokio::time::Instant::from_std(request.deadline));
        Self {
            broker,
            request,
            consumer,
            deadline: Box::pin(deadline),
            state: BodyState::Streaming,
        }
    }

    fn trailers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Ok(json) = serde_json::to_string(&self.request.timings()) {
            if let Ok(value) = HeaderValue::from_str(&json) {
                map.insert(TIMINGS_TRAILER, value);
            }
        }
        map
    }
}

impl Body for StreamBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if matches!(this.state, BodyState::Done) {
            return Poll::Ready(None);
        }

        if this.deadline.as_mut().poll(cx).is_ready() {
            this.state = BodyState::Done;
            return Poll::Ready(Some(Err("request deadline expired mid-stream".into())));
        }

        loop {
            return match this.consumer.poll_recv(cx) {
                Poll::Ready(Some(StreamItem::Chunk { data, .. })) => {
                    if data.is_empty() {
                        // nothing to write; an empty DATA frame would end
                        // a chunked response early
                        continue;
                    }
                    Poll::Ready(Some(Ok(Frame::data(data))))
                }
                Poll::Ready(Some(StreamItem::Complete { .. })) => {
                    this.broker.mark_responded(&this.request);
                    let trailers = this.trailers();
                    this.state = BodyState::Done;
                    Poll::Ready(Some(Ok(Frame::trailers(trailers))))
                }
                Poll::Ready(Some(StreamItem::Failed { message })) => {
                    this.state = BodyState::Done;
                    Poll::Ready(Some(Err(message.into())))
                }
                Poll::Ready(None) => {
                    this.state = BodyState::Done;
                    Poll::Ready(Some(Err("stream closed before completion".into())))
                }
                Poll::Pending => Poll::Pending,
            };
        }
    }
}

impl Drop for StreamBody {
    fn drop(&mut self) {
        // application walked away (or the body finished; then this is a
        // no-op against the terminal record)
        let _ = self
            .broker
            .cancel(&self.request.id, RequestError::AppDisconnected);
    }
}
