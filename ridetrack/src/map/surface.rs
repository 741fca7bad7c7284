//! Map engine seam and marker descriptions.

use std::fmt;

use crate::position::Position;

use super::MapError;

/// Initial map center when nothing is known yet (Rabat).
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 33.9716,
    lng: -6.8498,
};

/// Zoom level for the initial view and for driver recentering.
pub const DEFAULT_ZOOM: u8 = 13;

/// Base map tile URL template.
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Attribution shown with the base tiles.
pub const DEFAULT_ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// A map coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<&Position> for LatLng {
    fn from(position: &Position) -> Self {
        Self::new(position.latitude, position.longitude)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lng)
    }
}

/// Base map settings applied when a surface is created.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    /// Initial center.
    pub center: LatLng,
    /// Initial zoom, reused when recentering on the driver.
    pub zoom: u8,
    /// Tile URL template.
    pub tile_url: String,
    /// Tile attribution.
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            tile_url: DEFAULT_TILE_URL.to_string(),
            attribution: DEFAULT_ATTRIBUTION.to_string(),
        }
    }
}

/// Identifies the host element a map is drawn into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapContainer(String);

impl MapContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Surface-assigned marker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

/// Which slot a marker occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Red marker following the trip's driver.
    Driver,
    /// Blue marker at the viewing user's own position.
    Viewer,
}

/// Popup attached to a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub lines: Vec<String>,
}

impl Popup {
    /// Popup text, one line per entry, title first.
    pub fn text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything a surface needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub kind: MarkerKind,
    pub at: LatLng,
    pub popup: Popup,
}

impl MarkerSpec {
    /// Driver marker with name and last-update time.
    pub fn driver(position: &Position, label: Option<&str>) -> Self {
        let mut lines: Vec<String> = label.map(str::to_string).into_iter().collect();
        lines.push(format!("Last updated: {}", position.local_time_label()));
        Self {
            kind: MarkerKind::Driver,
            at: position.into(),
            popup: Popup {
                title: "Driver".to_string(),
                lines,
            },
        }
    }

    /// Viewer marker at the user's own position.
    pub fn viewer(position: &Position, label: Option<&str>) -> Self {
        let mut lines: Vec<String> = label.map(str::to_string).into_iter().collect();
        lines.push("Your current location".to_string());
        Self {
            kind: MarkerKind::Viewer,
            at: position.into(),
            popup: Popup {
                title: "Passenger".to_string(),
                lines,
            },
        }
    }
}

/// A live map engine instance bound to one container.
pub trait MapSurface: Send {
    /// Place a marker and return its handle.
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId;

    /// Remove a marker. Returns `false` if the handle is unknown.
    fn remove_marker(&mut self, id: MarkerId) -> bool;

    /// Move the viewport.
    fn set_view(&mut self, center: LatLng, zoom: u8);

    /// Destroy the instance and release its resources.
    fn destroy(&mut self);
}

/// Creates map surfaces for containers.
pub trait MapSurfaceFactory: Send + Sync {
    /// Create a surface in `container` with the base layer from `config`.
    fn create(
        &self,
        container: &MapContainer,
        config: &MapConfig,
    ) -> Result<Box<dyn MapSurface>, MapError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_popup_contents() {
        let position = Position::new(33.97, -6.85);
        let spec = MarkerSpec::driver(&position, Some("Karim"));
        assert_eq!(spec.kind, MarkerKind::Driver);
        assert_eq!(spec.at, LatLng::new(33.97, -6.85));
        let text = spec.popup.text();
        assert!(text.starts_with("Driver\nKarim\nLast updated: "));
    }

    #[test]
    fn test_viewer_popup_without_label() {
        let spec = MarkerSpec::viewer(&Position::new(1.0, 2.0), None);
        assert_eq!(spec.popup.text(), "Passenger\nYour current location");
    }

    #[test]
    fn test_default_map_config() {
        let config = MapConfig::default();
        assert_eq!(config.center, LatLng::new(33.9716, -6.8498));
        assert_eq!(config.zoom, 13);
        assert!(config.tile_url.contains("openstreetmap"));
    }
}
