//! Stream pipe — the bounded chunk queue between a connector's uploads
//! and the application's open response body.
//!
//! Single producer (the connector-facing endpoints, serialized by the
//! broker), single consumer (the application-facing response body). The
//! producer validates sequence density before anything is enqueued; the
//! consumer therefore only ever sees `0, 1, 2, …` followed by exactly one
//! terminal record.

use bytes::Bytes;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

/// One record in the pipe.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Chunk { seq: u64, data: Bytes },
    /// Terminal: the connector finished cleanly.
    Complete { total_chunks: u64 },
    /// Terminal: the connector reported an error mid-stream.
    Failed { message: String },
}

/// Why an enqueue was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum EnqueueError {
    /// Sequence number is not the next expected one.
    Gap { expected: u64, got: u64 },
    /// A terminal record was already enqueued.
    Finished,
    /// The pipe stayed full past the bounded wait.
    Full,
    /// The consumer dropped its end.
    Closed,
}

/// Create a pipe of the given depth.
pub fn stream_pipe(depth: usize) -> (StreamProducer, StreamConsumer) {
    let (tx, rx) = mpsc::channel(depth);
    (
        StreamProducer {
            tx,
            next_seq: 0,
            finished: false,
        },
        StreamConsumer { rx },
    )
}

/// Producer half. Owned by the broker's pending-request entry; access is
/// serialized by an async lock so concurrent chunk uploads cannot
/// interleave.
#[derive(Debug)]
pub struct StreamProducer {
    tx: mpsc::Sender<StreamItem>,
    next_seq: u64,
    finished: bool,
}

impl StreamProducer {
    /// Sequence number the next chunk must carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Enqueue a chunk, waiting up to `wait` for pipe capacity.
    pub async fn push_chunk(
        &mut self,
        seq: u64,
        data: Bytes,
        wait: Duration,
    ) -> Result<(), EnqueueError> {
        if self.finished {
            return Err(EnqueueError::Finished);
        }
        if seq != self.next_seq {
            return Err(EnqueueError::Gap {
                expected: self.next_seq,
                got: seq,
            });
        }

        self.send_bounded(StreamItem::Chunk { seq, data }, wait)
            .await?;
        self.next_seq += 1;
        Ok(())
    }

    /// Enqueue the clean-completion sentinel. `total_chunks` must equal
    /// the number of chunks accepted so far.
    pub async fn finish(&mut self, total_chunks: u64, wait: Duration) -> Result<(), EnqueueError> {
        if self.finished {
            return Err(EnqueueError::Finished);
        }
        if total_chunks != self.next_seq {
            return Err(EnqueueError::Gap {
                expected: self.next_seq,
                got: total_chunks,
            });
        }

        self.send_bounded(StreamItem::Complete { total_chunks }, wait)
            .await?;
        self.finished = true;
        Ok(())
    }

    /// Enqueue the error sentinel.
    pub async fn fail(&mut self, message: String, wait: Duration) -> Result<(), EnqueueError> {
        if self.finished {
            return Err(EnqueueError::Finished);
        }
        self.send_bounded(StreamItem::Failed { message }, wait)
            .await?;
        self.finished = true;
        Ok(())
    }

    async fn send_bounded(&self, item: StreamItem, wait: Duration) -> Result<(), EnqueueError> {
        match tokio::time::timeout(wait, self.tx.send(item)).await {
            Err(_) => Err(EnqueueError::Full),
            Ok(Err(_)) => Err(EnqueueError::Closed),
            Ok(Ok(())) => Ok(()),
        }
    }
}

/// Consumer half. Lives inside the application's response body.
#[derive(Debug)]
pub struct StreamConsumer {
    rx: mpsc::Receiver<StreamItem>,
}

impl StreamConsumer {
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    /// Poll-style receive for the body implementation.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<StreamItem>> {
        self.rx.poll_recv(cx)
    }
}
