//! Tuning knobs for a geocoding run.
//!
//! [`PipelineConfig`] controls batching, flushing and queueing;
//! [`GeocoderConfig`] controls the outbound request. Defaults match the
//! production settings the pipeline was tuned with.

use crate::common::{Error, Result};
use core::time::Duration;

/// Default Yandex Geocoder endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://geocode-maps.yandex.ru/1.x/";

/// Which checkpoint rows count as done when computing pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// Any recorded row is settled, resolved or not. One attempt per address
    /// across all runs.
    #[default]
    SkipAttempted,
    /// Only rows with coordinates are settled. Unresolved addresses are
    /// dispatched again and their row is replaced when the new result lands.
    RetryUnresolved,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of results a worker accumulates before pushing a batch (B).
    pub batch_size: usize,
    /// Number of buffered results that triggers a checkpoint flush (F).
    pub flush_every: usize,
    /// Result queue capacity in batches. `None` means unbounded.
    pub queue_capacity: Option<usize>,
    pub resume_policy: ResumePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_every: 1000,
            queue_capacity: None,
            resume_policy: ResumePolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::invalid_config("batch_size must be greater than 0"));
        }
        if self.flush_every == 0 {
            return Err(Error::invalid_config("flush_every must be greater than 0"));
        }
        if self.queue_capacity == Some(0) {
            return Err(Error::invalid_config(
                "queue_capacity must be greater than 0 when bounded",
            ));
        }
        Ok(())
    }
}

/// Outbound request settings.
///
/// Every query is sent as `"<address>, <city>, <country>"`.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub city: String,
    pub country: String,
    pub lang: String,
    /// Hard per-request timeout. Expiry downgrades to an unresolved result.
    pub timeout: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            city: "Москва".to_string(),
            country: "Россия".to_string(),
            lang: "ru_RU".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GeocoderConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty endpoint or a zero
    /// timeout.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::invalid_config("endpoint must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(Error::invalid_config("timeout must be greater than 0"));
        }
        Ok(())
    }

    pub fn query_for(&self, address: &str) -> String {
        format!("{address}, {}, {}", self.city, self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
        GeocoderConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let config = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        let config = PipelineConfig {
            queue_capacity: Some(0),
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn query_appends_locality() {
        let config = GeocoderConfig::default();
        assert_eq!(
            config.query_for("Тверская ул., 7"),
            "Тверская ул., 7, Москва, Россия"
        );
    }
}
