//! Throughput and ETA reporting for the checkpoint writer.

use core::fmt;
use core::time::Duration;

/// A snapshot of run progress taken at a flush point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Rows persisted during this run.
    pub processed: usize,
    /// Pending addresses at run start.
    pub total: usize,
    /// Time since the run started.
    pub elapsed: Duration,
}

impl Progress {
    /// Persisted rows per second, or 0 when no time has elapsed.
    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Minutes until every pending address is processed at the current
    /// rate. Infinite while the rate is 0.
    pub fn eta_minutes(&self) -> f64 {
        let rps = self.requests_per_sec();
        if rps > 0.0 {
            self.total.saturating_sub(self.processed) as f64 / rps / 60.0
        } else {
            f64::INFINITY
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} | {:.1} req/s | ETA ≈ {:.1} min",
            self.processed,
            self.total,
            self.requests_per_sec(),
            self.eta_minutes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_elapsed_means_zero_rate_and_infinite_eta() {
        let progress = Progress {
            processed: 1000,
            total: 5000,
            elapsed: Duration::ZERO,
        };
        assert_eq!(progress.requests_per_sec(), 0.0);
        assert!(progress.eta_minutes().is_infinite());
    }

    #[test]
    fn nothing_processed_yet_is_infinite_eta() {
        let progress = Progress {
            processed: 0,
            total: 10,
            elapsed: Duration::from_secs(3),
        };
        assert_eq!(progress.requests_per_sec(), 0.0);
        assert!(progress.eta_minutes().is_infinite());
    }

    #[test]
    fn rate_and_eta() {
        let progress = Progress {
            processed: 1200,
            total: 13200,
            elapsed: Duration::from_secs(60),
        };
        assert!((progress.requests_per_sec() - 20.0).abs() < 1e-9);
        // 12000 remaining at 20 req/s is 600 s.
        assert!((progress.eta_minutes() - 10.0).abs() < 1e-9);
        assert_eq!(
            progress.to_string(),
            "1200/13200 | 20.0 req/s | ETA ≈ 10.0 min"
        );
    }

    #[test]
    fn finished_run_has_zero_eta() {
        let progress = Progress {
            processed: 10,
            total: 10,
            elapsed: Duration::from_millis(500),
        };
        assert!(progress.requests_per_sec().is_finite());
        assert_eq!(progress.eta_minutes(), 0.0);
    }
}
