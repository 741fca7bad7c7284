//! Geographic position samples.
//!
//! A [`Position`] is an ephemeral "latest known" fix: where a device was at
//! the moment it was captured. Nothing in this crate keeps a history of
//! positions; every new fix replaces the previous one.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Maximum absolute latitude in degrees.
pub const MAX_LATITUDE: f64 = 90.0;

/// Maximum absolute longitude in degrees.
pub const MAX_LONGITUDE: f64 = 180.0;

/// A single position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When this fix was captured (or stored, for fixes read back from the store).
    pub captured_at: DateTime<Utc>,
}

impl Position {
    /// Create a position captured now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    /// Create a position with an explicit capture time.
    pub fn at(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }

    /// Whether both coordinates are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= MAX_LATITUDE
            && self.longitude.abs() <= MAX_LONGITUDE
    }

    /// Whether two positions refer to the same coordinates, ignoring capture time.
    pub fn same_place(&self, other: &Position) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// Capture time rendered as local wall-clock time (`HH:MM:SS`).
    pub fn local_time_label(&self) -> String {
        self.captured_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_validity() {
        assert!(Position::new(33.97, -6.85).is_valid());
        assert!(Position::new(-90.0, 180.0).is_valid());
        assert!(!Position::new(90.5, 0.0).is_valid());
        assert!(!Position::new(0.0, -180.1).is_valid());
        assert!(!Position::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_same_place_ignores_time() {
        let a = Position::new(33.97, -6.85);
        let b = Position::at(33.97, -6.85, a.captured_at - chrono::Duration::seconds(30));
        assert!(a.same_place(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_rounds_to_five_places() {
        let p = Position::new(33.9716, -6.8498);
        assert_eq!(p.to_string(), "33.97160, -6.84980");
    }

    #[test]
    fn test_local_time_label_format() {
        let label = Position::new(0.0, 0.0).local_time_label();
        assert_eq!(label.len(), 8);
        assert_eq!(label.matches(':').count(), 2);
    }
}
