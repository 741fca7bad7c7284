//! Errors reported by the positioning capability.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while reading the device position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    /// The user refused the location permission prompt.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The platform could not determine a position.
    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    /// No fix arrived within the configured timeout.
    #[error("Timed out after {0:?} waiting for a position")]
    Timeout(Duration),

    /// The platform has no positioning capability at all.
    #[error("Geolocation is not supported on this device")]
    Unsupported,
}

impl GeolocationError {
    /// Whether the error ends the current tracking session.
    ///
    /// Terminal errors must not be retried silently; only an explicit user
    /// start may try again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GeolocationError::PermissionDenied | GeolocationError::Unsupported
        )
    }
}
