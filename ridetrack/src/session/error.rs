use thiserror::Error;

use crate::geolocation::GeolocationError;
use crate::map::MapError;
use crate::store::StoreError;
use crate::types::Role;

/// Errors surfaced by [`super::TrackingSession`] operations.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("geolocation error: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("map error: {0}")]
    Map(#[from] MapError),

    #[error("{operation} is not available to the {role} role")]
    WrongRole { role: Role, operation: &'static str },

    #[error("tracking session already disposed")]
    Disposed,
}
