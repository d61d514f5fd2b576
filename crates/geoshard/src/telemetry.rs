//! # Pipeline metrics
//!
//! With the `metrics` feature enabled, the pipeline records OpenTelemetry
//! instruments through handles registered by [`init_metric_handles`]. The
//! binary owns the meter provider and exporters; this module only records.
//!
//! Without the feature every recording function compiles to a no-op, so call
//! sites never need `cfg` guards.
//!
//! ## Instruments
//!
//! - `addresses_resolved` / `addresses_unresolved`: per-address outcomes
//! - `batches_enqueued`: batches pushed onto the result queue
//! - `checkpoint_flushes` / `checkpoint_flush_failures`: persistence attempts
//! - `checkpoint_flush_duration` (ms): time spent merging and persisting

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(feature = "metrics")]
static ADDRESSES_RESOLVED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ADDRESSES_UNRESOLVED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BATCHES_ENQUEUED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CHECKPOINT_FLUSHES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CHECKPOINT_FLUSH_FAILURES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CHECKPOINT_FLUSH_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

/// Registers the pipeline's instruments on `meter`. Later calls are ignored.
#[cfg(feature = "metrics")]
pub fn init_metric_handles(meter: &Meter) {
    let _ = ADDRESSES_RESOLVED.set(
        meter
            .u64_counter("addresses_resolved")
            .with_description("Addresses resolved to coordinates")
            .build(),
    );

    let _ = ADDRESSES_UNRESOLVED.set(
        meter
            .u64_counter("addresses_unresolved")
            .with_description("Addresses attempted without usable coordinates")
            .build(),
    );

    let _ = BATCHES_ENQUEUED.set(
        meter
            .u64_counter("batches_enqueued")
            .with_description("Result batches pushed to the checkpoint writer")
            .build(),
    );

    let _ = CHECKPOINT_FLUSHES.set(
        meter
            .u64_counter("checkpoint_flushes")
            .with_description("Successful checkpoint flushes")
            .build(),
    );

    let _ = CHECKPOINT_FLUSH_FAILURES.set(
        meter
            .u64_counter("checkpoint_flush_failures")
            .with_description("Checkpoint flushes that failed and were retained for retry")
            .build(),
    );

    let _ = CHECKPOINT_FLUSH_DURATION_MS.set(
        meter
            .f64_histogram("checkpoint_flush_duration")
            .with_unit("ms")
            .with_description("Time spent merging and persisting a checkpoint")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_resolved() {
    if let Some(counter) = ADDRESSES_RESOLVED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_resolved() {}

#[cfg(feature = "metrics")]
pub fn increment_unresolved() {
    if let Some(counter) = ADDRESSES_UNRESOLVED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_unresolved() {}

#[cfg(feature = "metrics")]
pub fn increment_batches_enqueued() {
    if let Some(counter) = BATCHES_ENQUEUED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_batches_enqueued() {}

#[cfg(feature = "metrics")]
pub fn increment_flushes() {
    if let Some(counter) = CHECKPOINT_FLUSHES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_flushes() {}

#[cfg(feature = "metrics")]
pub fn increment_flush_failures() {
    if let Some(counter) = CHECKPOINT_FLUSH_FAILURES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_flush_failures() {}

#[cfg(feature = "metrics")]
pub fn record_flush_duration(duration_ms: f64) {
    if let Some(histogram) = CHECKPOINT_FLUSH_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_flush_duration(_duration_ms: f64) {}
