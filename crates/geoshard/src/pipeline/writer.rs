//! # Checkpoint writer
//!
//! The single consumer of the result queue and the only code that mutates
//! the [`CheckpointTable`] during a run.
//!
//! Batches are appended to an in-memory buffer. Once the buffer holds at
//! least `flush_every` results, the buffer is merged into the table and the
//! full table is persisted. A failed persist is logged and the buffer is
//! kept, so the same results are merged again on the next attempt; nothing
//! accepted by the writer is ever dropped. On [`WriteRequest::Stop`] any
//! remaining results are flushed one last time, and a failure there is
//! returned to the caller.

use crate::checkpoint::{CheckpointStore, CheckpointTable};
use crate::common::{Batch, Result};
use crate::pipeline::progress::Progress;
use crate::pipeline::queue::{ResultReceiver, WriteRequest};
use crate::telemetry::{increment_flush_failures, increment_flushes, record_flush_duration};
use std::time::Instant;

pub struct CheckpointWriter<S: CheckpointStore> {
    store: S,
    table: CheckpointTable,
    buffer: Batch,
    flush_every: usize,
    total: usize,
    written: usize,
    started: Instant,
}

impl<S: CheckpointStore> CheckpointWriter<S> {
    /// Creates a writer over an already loaded `table`.
    ///
    /// `total` is the number of pending addresses for this run and is only
    /// used for progress reporting.
    pub fn new(store: S, table: CheckpointTable, total: usize, flush_every: usize) -> Self {
        Self {
            store,
            table,
            buffer: Vec::with_capacity(flush_every),
            flush_every,
            total,
            written: 0,
            started: Instant::now(),
        }
    }

    /// Rows persisted so far in this run.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Results accepted but not yet persisted.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn table(&self) -> &CheckpointTable {
        &self.table
    }

    pub fn progress(&self) -> Progress {
        Progress {
            processed: self.written,
            total: self.total,
            elapsed: self.started.elapsed(),
        }
    }

    /// Accepts one batch, flushing once the buffer reaches the threshold.
    ///
    /// Flush failures are not returned here; the buffer is retained and the
    /// flush is retried on the next batch or on stop.
    pub fn on_batch(&mut self, batch: Batch) {
        self.buffer.extend(batch);
        if self.buffer.len() >= self.flush_every {
            if let Err(e) = self.flush() {
                tracing::warn!(
                    "Checkpoint flush failed, keeping {} buffered results: {e}",
                    self.buffer.len()
                );
            }
        }
    }

    /// Merges the buffer into the table and persists the full table.
    ///
    /// # Errors
    ///
    /// Returns the store error. The buffer is left intact; merging it again
    /// is idempotent.
    pub fn flush(&mut self) -> Result<()> {
        let flush_started = Instant::now();
        self.table.merge(self.buffer.iter().cloned());

        if let Err(e) = self.store.persist(&self.table) {
            increment_flush_failures();
            return Err(e);
        }

        self.written += self.buffer.len();
        self.buffer.clear();
        increment_flushes();
        record_flush_duration(flush_started.elapsed().as_secs_f64() * 1000.0);

        tracing::info!("✓ {}", self.progress());
        Ok(())
    }

    /// Final flush of whatever is still buffered.
    ///
    /// # Errors
    ///
    /// Returns the store error if the final persist fails. Results that were
    /// only in the buffer are then not durable.
    pub fn on_stop(mut self) -> Result<CheckpointTable> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }

        let summary = self.table.summary();
        tracing::info!(
            "Checkpoint complete: {} rows written this run, {} total ({} resolved)",
            self.written,
            summary.total,
            summary.resolved
        );
        Ok(self.table)
    }

    /// Drains `rx` until [`WriteRequest::Stop`], then performs the final
    /// flush. Blocks the current thread; run it via
    /// [`tokio::task::spawn_blocking`].
    ///
    /// # Errors
    ///
    /// See [`CheckpointWriter::on_stop`].
    pub fn run(mut self, mut rx: ResultReceiver) -> Result<CheckpointTable> {
        loop {
            match rx.blocking_recv() {
                Some(WriteRequest::Batch(batch)) => self.on_batch(batch),
                Some(WriteRequest::Stop) => break,
                None => {
                    tracing::warn!("Result queue closed without a stop request");
                    break;
                }
            }
        }
        self.on_stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::testing::MemoryStore;
    use crate::common::{Coordinates, Error, GeocodeResult};
    use crate::pipeline::queue::result_queue;

    fn batch(prefix: &str, n: usize) -> Batch {
        (0..n)
            .map(|i| GeocodeResult::unresolved(format!("{prefix}{i}").into()))
            .collect()
    }

    #[test]
    fn flushes_only_at_threshold() {
        let store = MemoryStore::default();
        let mut writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 10, 3);

        writer.on_batch(batch("a", 2));
        assert_eq!(store.persist_count(), 0);
        assert_eq!(writer.buffered(), 2);

        writer.on_batch(batch("b", 2));
        assert_eq!(store.persist_count(), 1);
        assert_eq!(writer.buffered(), 0);
        assert_eq!(writer.written(), 4);
        assert_eq!(store.last_snapshot().unwrap().len(), 4);
    }

    #[test]
    fn failed_flush_keeps_buffer_and_retries() {
        let store = MemoryStore::default();
        store.fail_next(1);
        let mut writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 10, 3);

        writer.on_batch(batch("a", 4));
        assert_eq!(store.persist_count(), 0);
        assert_eq!(writer.buffered(), 4);
        assert_eq!(writer.written(), 0);

        writer.on_batch(batch("b", 1));
        assert_eq!(store.persist_count(), 1);
        assert_eq!(writer.buffered(), 0);
        assert_eq!(writer.written(), 5);
        assert_eq!(store.last_snapshot().unwrap().len(), 5);
    }

    #[test]
    fn stop_flushes_remainder_below_threshold() {
        let store = MemoryStore::default();
        let mut writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 2, 1000);

        writer.on_batch(vec![GeocodeResult::resolved(
            "A".into(),
            Coordinates::new(55.7, 37.6),
        )]);
        writer.on_batch(batch("x", 1));
        assert_eq!(store.persist_count(), 0);

        let table = writer.on_stop().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(store.persist_count(), 1);
        assert_eq!(store.last_snapshot().unwrap().rows(), table.rows());
    }

    #[test]
    fn stop_without_new_results_does_not_persist() {
        let store = MemoryStore::default();
        let writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 0, 10);
        writer.on_stop().unwrap();
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn failed_final_flush_is_an_error() {
        let store = MemoryStore::default();
        store.fail_next(1);
        let mut writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 1, 10);
        writer.on_batch(batch("a", 1));

        let err = writer.on_stop().unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn existing_rows_are_kept_and_replaced_in_place() {
        let initial = CheckpointTable::from_rows(batch("a", 2));
        let store = MemoryStore::default();
        let mut writer = CheckpointWriter::new(store.clone(), initial, 1, 1);

        writer.on_batch(vec![GeocodeResult::resolved(
            "a1".into(),
            Coordinates::new(1.0, 2.0),
        )]);

        let snapshot = store.last_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rows()[1].latitude(), Some(1.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_drains_every_accepted_result() {
        let store = MemoryStore::default();
        let writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 250, 100);
        let (tx, rx) = result_queue(Some(4));
        let handle = tokio::task::spawn_blocking(move || writer.run(rx));

        for worker in 0..5 {
            for chunk in 0..5 {
                tx.send(WriteRequest::Batch(batch(&format!("w{worker}c{chunk}-"), 10)))
                    .await
                    .unwrap();
            }
        }
        tx.send(WriteRequest::Stop).await.unwrap();

        let table = handle.await.unwrap().unwrap();
        assert_eq!(table.len(), 250);
        assert_eq!(store.last_snapshot().unwrap().len(), 250);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn closed_queue_without_stop_still_flushes() {
        let store = MemoryStore::default();
        let writer = CheckpointWriter::new(store.clone(), CheckpointTable::new(), 3, 100);
        let (tx, rx) = result_queue(None);
        let handle = tokio::task::spawn_blocking(move || writer.run(rx));

        tx.send(WriteRequest::Batch(batch("a", 3))).await.unwrap();
        drop(tx);

        let table = handle.await.unwrap().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(store.persist_count(), 1);
    }
}
