use crate::checkpoint::{CheckpointStore, CheckpointTable};
use crate::common::{Address, ApiKey, Error, Result};
use crate::config::PipelineConfig;
use crate::geocoder::Geocoder;
use crate::pipeline::queue::{WriteRequest, result_queue};
use crate::pipeline::sharder::shard;
use crate::pipeline::worker::worker_loop;
use crate::pipeline::writer::CheckpointWriter;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one geocoding pass: load checkpoint, dispatch pending addresses to one
/// worker per API key, and collect every result through a single checkpoint
/// writer.
///
/// Each API key gets exactly one worker; there is no further pooling. The
/// number of keys is expected to be small.
pub struct Pipeline<G: Geocoder, S: CheckpointStore> {
    geocoder: Arc<G>,
    store: S,
    config: PipelineConfig,
    shutdown: CancellationToken,
}

impl<G: Geocoder, S: CheckpointStore> Pipeline<G, S> {
    pub fn new(geocoder: G, store: S, config: PipelineConfig) -> Self {
        Self {
            geocoder: Arc::new(geocoder),
            store,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses `shutdown` to stop workers early. Whatever was already resolved
    /// is still flushed before [`Pipeline::run`] returns.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Resolves every address in `addresses` not already settled in the
    /// checkpoint and returns the full checkpoint table.
    ///
    /// Worker `k` uses `keys[k]` for the `k`th shard. If nothing is pending
    /// the loaded table is returned as-is and nothing is persisted.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] / [`Error::NoApiKeys`] before any work
    ///   starts.
    /// - Any error loading the checkpoint.
    /// - The final checkpoint flush failing.
    ///
    /// Per-address lookup failures are never errors; they are recorded as
    /// unresolved rows.
    pub async fn run(self, addresses: &[Address], keys: Vec<ApiKey>) -> Result<CheckpointTable> {
        self.config.validate()?;
        if keys.is_empty() {
            return Err(Error::NoApiKeys);
        }

        let Self {
            geocoder,
            store,
            config,
            shutdown,
        } = self;

        let (store, table) = tokio::task::spawn_blocking(move || {
            let table = store.load()?;
            Ok::<_, Error>((store, table))
        })
        .await??;

        let pending = table.pending(addresses, config.resume_policy);
        tracing::info!(
            "Geocoding {} of {} requested addresses with {} keys ({} rows in checkpoint)",
            pending.len(),
            addresses.len(),
            keys.len(),
            table.len()
        );
        if pending.is_empty() {
            tracing::info!("Nothing pending, checkpoint is up to date");
            return Ok(table);
        }

        let (tx, rx) = result_queue(config.queue_capacity);
        let writer = CheckpointWriter::new(store, table, pending.len(), config.flush_every);
        let writer_handle = tokio::task::spawn_blocking(move || writer.run(rx));

        // Cannot fail with at least one key; on error the dropped sender
        // still lets the writer finish.
        let shards = shard(pending, keys.len())?;

        let workers = keys
            .into_iter()
            .zip(shards)
            .enumerate()
            .map(|(worker_id, (key, shard))| {
                tokio::spawn(worker_loop(
                    worker_id,
                    key,
                    shard,
                    Arc::clone(&geocoder),
                    tx.clone(),
                    config.batch_size,
                    shutdown.clone(),
                ))
            })
            .collect::<Vec<_>>();

        for (worker_id, joined) in join_all(workers).await.into_iter().enumerate() {
            match joined {
                Ok(Ok(report)) => tracing::debug!(
                    "Worker {worker_id} resolved {}/{}",
                    report.resolved,
                    report.attempted
                ),
                Ok(Err(e)) => tracing::error!("Worker {worker_id} failed: {e}"),
                Err(e) => tracing::error!("Worker {worker_id} panicked: {e}"),
            }
        }

        // Every worker has joined, so no batch can arrive after Stop.
        if let Err(e) = tx.send(WriteRequest::Stop).await {
            tracing::warn!("Could not signal checkpoint writer: {e}");
        }
        drop(tx);

        writer_handle.await?
    }
}
