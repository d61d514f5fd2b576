//! Multi-producer, single-consumer result queue.
//!
//! Workers push [`WriteRequest::Batch`] messages; the orchestrator pushes a
//! single [`WriteRequest::Stop`] once every worker has joined. Ordering is
//! FIFO per producer only: batches from different workers interleave freely.
//!
//! The queue is either bounded (producers wait when it is full) or unbounded.
//! The receiving end can be drained from async code or from a blocking
//! thread, which is how the checkpoint writer consumes it.

use crate::common::{Batch, Error, Result};
use tokio::sync::mpsc;

/// Messages understood by the checkpoint writer.
#[derive(Debug)]
pub enum WriteRequest {
    /// Results from one worker. Never empty.
    Batch(Batch),
    /// No more batches will follow.
    Stop,
}

/// Creates a result queue. `capacity` is counted in messages; `None` makes
/// the queue unbounded.
pub fn result_queue(capacity: Option<usize>) -> (ResultSender, ResultReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (
                ResultSender(SenderInner::Bounded(tx)),
                ResultReceiver(ReceiverInner::Bounded(rx)),
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                ResultSender(SenderInner::Unbounded(tx)),
                ResultReceiver(ReceiverInner::Unbounded(rx)),
            )
        }
    }
}

/// Producer handle; cheap to clone, one per worker.
#[derive(Debug, Clone)]
pub struct ResultSender(SenderInner);

#[derive(Debug, Clone)]
enum SenderInner {
    Bounded(mpsc::Sender<WriteRequest>),
    Unbounded(mpsc::UnboundedSender<WriteRequest>),
}

impl ResultSender {
    /// Pushes a message, waiting for space if the queue is bounded and full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the consumer has gone away.
    pub async fn send(&self, request: WriteRequest) -> Result<()> {
        let delivered = match &self.0 {
            SenderInner::Bounded(tx) => tx.send(request).await.is_ok(),
            SenderInner::Unbounded(tx) => tx.send(request).is_ok(),
        };

        if delivered {
            Ok(())
        } else {
            Err(Error::ChannelError {
                context: "result queue closed".to_string(),
            })
        }
    }
}

/// Consumer handle. There is exactly one per queue.
#[derive(Debug)]
pub struct ResultReceiver(ReceiverInner);

#[derive(Debug)]
enum ReceiverInner {
    Bounded(mpsc::Receiver<WriteRequest>),
    Unbounded(mpsc::UnboundedReceiver<WriteRequest>),
}

impl ResultReceiver {
    pub async fn recv(&mut self) -> Option<WriteRequest> {
        match &mut self.0 {
            ReceiverInner::Bounded(rx) => rx.recv().await,
            ReceiverInner::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Blocking variant for use outside the async runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_recv(&mut self) -> Option<WriteRequest> {
        match &mut self.0 {
            ReceiverInner::Bounded(rx) => rx.blocking_recv(),
            ReceiverInner::Unbounded(rx) => rx.blocking_recv(),
        }
    }
}
