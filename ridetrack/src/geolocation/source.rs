//! The positioning capability seam and its read options.

use std::time::Duration;

use crate::position::Position;
use crate::types::BoxFuture;

use super::GeolocationError;

/// Client-side timeout for a single position read.
pub const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(10);

/// How old a previously captured fix may be and still satisfy a one-shot read.
pub const DEFAULT_MAXIMUM_AGE: Duration = Duration::from_secs(60);

/// Options for a single position read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask the platform for a high-accuracy (GPS-grade) fix where supported.
    pub high_accuracy: bool,
    /// Fail with [`GeolocationError::Timeout`] if no fix arrives in time.
    pub timeout: Duration,
    /// Accept a cached fix no older than this. Zero forces a fresh fix.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// Options for an on-demand read (map mount, first tracking capture).
    pub fn one_shot() -> Self {
        Self {
            high_accuracy: true,
            timeout: DEFAULT_POSITION_TIMEOUT,
            maximum_age: DEFAULT_MAXIMUM_AGE,
        }
    }

    /// Options for scheduled captures; never served from cache.
    pub fn periodic() -> Self {
        Self {
            maximum_age: Duration::ZERO,
            ..Self::one_shot()
        }
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the maximum cached-fix age.
    pub fn with_maximum_age(mut self, maximum_age: Duration) -> Self {
        self.maximum_age = maximum_age;
        self
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::one_shot()
    }
}

/// Platform positioning capability.
///
/// Implementations wrap whatever the host offers (a browser API bridge, a
/// GNSS receiver, a simulator). The first call may trigger a permission
/// prompt; a refusal is reported as [`GeolocationError::PermissionDenied`].
///
/// Timeouts and fix caching are applied by [`super::Geolocator`], so
/// implementations may simply wait for the platform.
pub trait GeolocationSource: Send + Sync {
    /// Whether the host has a positioning capability at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Request a single position fix.
    fn request_position(
        &self,
        options: &PositionOptions,
    ) -> BoxFuture<'_, Result<Position, GeolocationError>>;
}
