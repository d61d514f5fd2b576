#![doc = include_str!("../README.md")]

pub mod checkpoint;
mod common;
pub mod config;
pub mod geocoder;
pub mod input;
pub mod pipeline;
pub mod telemetry;

pub use common::*;
pub use checkpoint::{CheckpointStore, CheckpointTable, ParquetStore, TableSummary};
pub use config::{GeocoderConfig, PipelineConfig, ResumePolicy};
pub use geocoder::{Geocoder, YandexGeocoder};
pub use pipeline::Pipeline;
