//! INI-backed configuration file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use tracing::debug;

use crate::map::{DEFAULT_ATTRIBUTION, DEFAULT_CENTER, DEFAULT_TILE_URL, DEFAULT_ZOOM};
use crate::publisher::DEFAULT_PUBLISH_INTERVAL;
use crate::subscriber::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};

use super::ConfigError;

/// Directory holding RideTrack configuration.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ridetrack")
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// `[tracking]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    pub publish_interval_secs: u64,
    pub position_timeout_secs: u64,
    /// Refresh period for the viewer's own marker. Zero disables refresh.
    pub own_position_refresh_secs: u64,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            publish_interval_secs: DEFAULT_PUBLISH_INTERVAL.as_secs(),
            position_timeout_secs: 10,
            own_position_refresh_secs: 0,
        }
    }
}

/// `[feed]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub reconnect_initial_ms: u64,
    pub reconnect_max_secs: u64,
    pub reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            reconnect_initial_ms: DEFAULT_INITIAL_DELAY.as_millis() as u64,
            reconnect_max_secs: DEFAULT_MAX_DELAY.as_secs(),
            reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `[map]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
    pub tile_url: String,
    pub attribution: String,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            center_lat: DEFAULT_CENTER.lat,
            center_lng: DEFAULT_CENTER.lng,
            zoom: DEFAULT_ZOOM,
            tile_url: DEFAULT_TILE_URL.to_string(),
            attribution: DEFAULT_ATTRIBUTION.to_string(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub tracking: TrackingSettings,
    pub feed: FeedSettings,
    pub map: MapSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Save to the default path, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        self.to_ini().write_to_file(path).map_err(write_error)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let d = &mut config;

        read(ini, "tracking", "publish_interval_secs", &mut d.tracking.publish_interval_secs)?;
        read(ini, "tracking", "position_timeout_secs", &mut d.tracking.position_timeout_secs)?;
        read(
            ini,
            "tracking",
            "own_position_refresh_secs",
            &mut d.tracking.own_position_refresh_secs,
        )?;

        read(ini, "feed", "reconnect_initial_ms", &mut d.feed.reconnect_initial_ms)?;
        read(ini, "feed", "reconnect_max_secs", &mut d.feed.reconnect_max_secs)?;
        read(ini, "feed", "reconnect_attempts", &mut d.feed.reconnect_attempts)?;

        read(ini, "map", "center_lat", &mut d.map.center_lat)?;
        read(ini, "map", "center_lng", &mut d.map.center_lng)?;
        read(ini, "map", "zoom", &mut d.map.zoom)?;
        read(ini, "map", "tile_url", &mut d.map.tile_url)?;
        read(ini, "map", "attribution", &mut d.map.attribution)?;

        read(ini, "logging", "level", &mut d.logging.level)?;
        if let Some(file) = value(ini, "logging", "file") {
            d.logging.file = Some(PathBuf::from(file));
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("tracking"))
            .set("publish_interval_secs", self.tracking.publish_interval_secs.to_string())
            .set("position_timeout_secs", self.tracking.position_timeout_secs.to_string())
            .set(
                "own_position_refresh_secs",
                self.tracking.own_position_refresh_secs.to_string(),
            );
        ini.with_section(Some("feed"))
            .set("reconnect_initial_ms", self.feed.reconnect_initial_ms.to_string())
            .set("reconnect_max_secs", self.feed.reconnect_max_secs.to_string())
            .set("reconnect_attempts", self.feed.reconnect_attempts.to_string());
        ini.with_section(Some("map"))
            .set("center_lat", self.map.center_lat.to_string())
            .set("center_lng", self.map.center_lng.to_string())
            .set("zoom", self.map.zoom.to_string())
            .set("tile_url", self.map.tile_url.clone())
            .set("attribution", self.map.attribution.clone());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set(
                "file",
                self.logging
                    .file
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            );
        ini
    }
}

/// Non-empty trimmed value of `section.key`.
fn value<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn read<T>(ini: &Ini, section: &str, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = value(ini, section, key) {
        *target = raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: format!("{}.{}", section, key),
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.tracking.publish_interval_secs, 30);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.tracking.publish_interval_secs = 15;
        config.map.zoom = 16;
        config.logging.file = Some(PathBuf::from("/tmp/ridetrack.log"));
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[feed]\nreconnect_attempts = 2\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.feed.reconnect_attempts, 2);
        assert_eq!(config.feed.reconnect_max_secs, 30);
        assert_eq!(config.map, MapSettings::default());
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[map]\nzoom = high\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "map.zoom"));
    }
}
