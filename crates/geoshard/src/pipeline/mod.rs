//! The concurrent geocoding pipeline.
//!
//! ```text
//! Pipeline ─► shard ─► worker × N ─► result queue ─► CheckpointWriter ─► CheckpointStore
//! ```
//!
//! One worker runs per API key; exactly one writer consumes the queue and is
//! the only code that mutates the checkpoint table.

mod orchestrator;
pub mod progress;
pub mod queue;
pub mod sharder;
pub mod worker;
pub mod writer;

pub use orchestrator::Pipeline;
pub use progress::Progress;
pub use queue::{ResultReceiver, ResultSender, WriteRequest, result_queue};
pub use sharder::shard;
pub use worker::{WorkerReport, worker_loop};
pub use writer::CheckpointWriter;
