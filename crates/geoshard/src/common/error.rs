//! Error types for the geocoding pipeline.
//!
//! Two families of errors exist and they are never mixed:
//!
//! - [`Error`] covers everything that can stop a run: configuration problems
//!   detected before any worker starts, channel failures between tasks,
//!   checkpoint storage failures and input loading failures.
//! - [`GeocodeError`] covers a single failed lookup. Workers only ever log
//!   and downgrade it to an unresolved result; it never escapes a worker.
//!
//! ## Error Cases
//! - `NoApiKeys`: The run was started without credentials.
//! - `MissingColumn`: The address source lacks the expected column.
//! - `InvalidShardCount`: Work was sharded across zero workers.
//! - `InvalidConfig`: A tuning value is out of range.
//! - `ChannelError`: The result queue was closed underneath a producer.
//! - `Io`, `Parquet`, `Arrow`, `CorruptCheckpoint`: The checkpoint could not
//!   be read or written.
//! - `Csv`: A tabular input could not be parsed.
//! - `HttpClient`: The HTTP client could not be constructed.
//! - `Join`: A worker or writer task panicked or was aborted.

use std::path::PathBuf;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for a geocoding run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No credentials were supplied, so no worker can run.
    #[error("At least one API key is required")]
    NoApiKeys,

    /// The input table does not carry the address identifier column.
    #[error("Input {} has no `{column}` column", path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// Sharding was requested across zero workers.
    #[error("Cannot shard work across zero workers")]
    InvalidShardCount,

    /// A configuration value is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Internal channel send/receive failure (e.g., the writer went away).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The checkpoint file exists but does not match the expected schema.
    #[error("Corrupt checkpoint: {reason}")]
    CorruptCheckpoint { reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// A spawned task panicked or was cancelled by the runtime.
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Why a single lookup produced no coordinates.
///
/// Workers treat every variant the same way: the address is recorded as
/// attempted with absent coordinates.
#[derive(thiserror::Error, Debug)]
pub enum GeocodeError {
    /// Timeout, connection failure or an unreadable body.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("geocoder returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("no candidates in response")]
    NoCandidates,

    #[error("malformed response: {reason}")]
    Malformed { reason: String },
}
