//! Per-request timing capture.
//!
//! All timestamps are nanoseconds on a monotonic clock whose epoch is the
//! first call into this module (process start, in practice). They are
//! comparable to each other within one router process and nothing else.

use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process epoch.
pub fn now_nanos() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// Timing points of one request's life.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RequestTimings {
    /// Router accepted the application request.
    pub t1_router_recv: Option<u64>,
    /// Command frame enqueued on the connector's push channel.
    pub t_dispatch: Option<u64>,
    /// First byte of the connector's upload accepted
    /// (result POST for sync/offload, stream init for streaming).
    pub t_result_recv: Option<u64>,
    /// Response to the application completed, or terminal transition.
    pub t_respond: Option<u64>,
}

impl RequestTimings {
    pub fn mark_recv(&mut self) {
        self.t1_router_recv = Some(now_nanos());
    }

    pub fn mark_dispatch(&mut self) {
        self.t_dispatch = Some(now_nanos());
    }

    pub fn mark_result_recv(&mut self) {
        // first upload wins; retried uploads must not move the mark
        if self.t_result_recv.is_none() {
            self.t_result_recv = Some(now_nanos());
        }
    }

    pub fn mark_respond(&mut self) {
        if self.t_respond.is_none() {
            self.t_respond = Some(now_nanos());
        }
    }
}
