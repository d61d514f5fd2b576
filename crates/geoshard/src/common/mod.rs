pub mod error;
pub mod types;

pub use error::{Error, GeocodeError, Result};
pub use types::{Address, ApiKey, Batch, Coordinates, GeocodeResult};
