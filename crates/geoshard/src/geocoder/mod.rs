//! Outbound geocoding.
//!
//! [`Geocoder`] is the seam between workers and the external service. The
//! production implementation is [`yandex::YandexGeocoder`]; tests plug in
//! in-memory fakes.

pub mod yandex;

use crate::common::{Address, ApiKey, Coordinates, GeocodeError};
use core::future::Future;

pub use yandex::YandexGeocoder;

/// Resolves one address with one credential.
///
/// Implementations must bound every call in time. Workers do not add their
/// own timeout and never distinguish between error kinds.
pub trait Geocoder: Send + Sync + 'static {
    fn geocode(
        &self,
        key: &ApiKey,
        address: &Address,
    ) -> impl Future<Output = Result<Coordinates, GeocodeError>> + Send;
}
