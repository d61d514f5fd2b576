//! # Core record types
//!
//! These types form the contract between workers, the result queue, the
//! checkpoint writer and downstream consumers of the checkpoint table.
//!
//! - [`Address`] - opaque address key, compared by exact string equality
//! - [`ApiKey`] - geocoder credential, redacted in `Debug` output
//! - [`Coordinates`] - a `(latitude, longitude)` pair
//! - [`GeocodeResult`] - one attempted address and its coordinates, if any
//! - [`Batch`] - the unit a worker pushes onto the result queue

use core::borrow::Borrow;
use core::fmt;

/// A normalized free-text address.
///
/// No normalization happens here: two addresses are the same key only when
/// their strings are byte-for-byte equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for Address {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A geocoder API key.
///
/// The raw value is only reachable through [`ApiKey::expose`] so that keys
/// never end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw key for use in an outbound request.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A short, log-safe fingerprint (last four characters).
    pub fn fingerprint(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("…{tail}")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.fingerprint())
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A resolved coordinate pair in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the pair can be used downstream.
    ///
    /// A zero latitude or longitude is what the geocoder hands back for
    /// garbage input, so such pairs are treated as unusable.
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude != 0.0
            && self.longitude != 0.0
    }
}

/// The outcome of one attempted address.
///
/// `coordinates == None` means "attempted but unresolved", which is distinct
/// from an address that was never attempted (and so has no result at all).
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub address: Address,
    pub coordinates: Option<Coordinates>,
}

impl GeocodeResult {
    pub fn resolved(address: Address, coordinates: Coordinates) -> Self {
        Self {
            address,
            coordinates: Some(coordinates),
        }
    }

    pub fn unresolved(address: Address) -> Self {
        Self {
            address,
            coordinates: None,
        }
    }

    /// Whether the attempt produced usable coordinates.
    ///
    /// Rows with unusable pairs (zero or non-finite) count as unresolved
    /// everywhere: in resume decisions, summaries and metrics.
    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some_and(|c| c.is_usable())
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }
}

/// Results produced by one worker, pushed onto the queue as a unit.
pub type Batch = Vec<GeocodeResult>;
