use crate::common::{Address, ApiKey, GeocodeResult, Result};
use crate::geocoder::Geocoder;
use crate::pipeline::queue::{ResultSender, WriteRequest};
use crate::telemetry::{increment_batches_enqueued, increment_resolved, increment_unresolved};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-worker outcome counts, logged by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub attempted: usize,
    pub resolved: usize,
}

/// Worker task that resolves one shard with one API key.
///
/// Addresses are processed strictly in shard order, one request at a time.
/// Results are grouped into batches of `batch_size` and pushed onto the result
/// queue; a trailing partial batch is pushed before the worker returns.
///
/// Every lookup failure (timeout, transport error, bad status, empty or
/// malformed payload) is downgraded to an unresolved result. The only thing
/// that ends the loop early is the `shutdown` token, in which case the
/// in-flight request is abandoned and the address stays unrecorded.
///
/// # Arguments
///
/// - `worker_id`: Index of this worker (used for logs/tracing).
/// - `key`: The API key owned by this worker.
/// - `shard`: Addresses assigned to this worker.
/// - `geocoder`: Shared geocoder; the key is passed per call.
/// - `queue`: Producer side of the result queue.
/// - `batch_size`: Number of results per pushed batch.
/// - `shutdown`: Cooperative cancellation for interrupted runs.
///
/// # Errors
///
/// Returns [`Error::ChannelError`](crate::Error::ChannelError) if the queue
/// is closed. This ends only this worker.
pub async fn worker_loop<G: Geocoder>(
    worker_id: usize,
    key: ApiKey,
    shard: Vec<Address>,
    geocoder: Arc<G>,
    queue: ResultSender,
    batch_size: usize,
    shutdown: CancellationToken,
) -> Result<WorkerReport> {
    tracing::debug!(
        "Worker {worker_id} ({}) started with {} addresses",
        key.fingerprint(),
        shard.len()
    );

    let mut report = WorkerReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    for address in shard {
        let outcome = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::debug!("Worker {worker_id} stopping early on shutdown");
                break;
            }
            outcome = geocoder.geocode(&key, &address) => outcome,
        };

        let result = match outcome {
            Ok(coordinates) => GeocodeResult::resolved(address, coordinates),
            Err(e) => {
                tracing::debug!("Worker {worker_id} could not resolve {address:?}: {e}");
                GeocodeResult::unresolved(address)
            }
        };
        if result.is_resolved() {
            increment_resolved();
            report.resolved += 1;
        } else {
            increment_unresolved();
        }
        report.attempted += 1;
        batch.push(result);

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            queue.send(WriteRequest::Batch(full)).await?;
            increment_batches_enqueued();
        }
    }

    // Flush final partial batch if anything remains.
    if !batch.is_empty() {
        queue.send(WriteRequest::Batch(batch)).await?;
        increment_batches_enqueued();
    }

    tracing::debug!(
        "Worker {worker_id} finished: {}/{} resolved",
        report.resolved,
        report.attempted
    );
    Ok(report)
}
