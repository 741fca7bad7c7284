//! `section.key` addressing of single settings.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    TrackingPublishIntervalSecs,
    TrackingPositionTimeoutSecs,
    TrackingOwnPositionRefreshSecs,
    FeedReconnectInitialMs,
    FeedReconnectMaxSecs,
    FeedReconnectAttempts,
    MapCenterLat,
    MapCenterLng,
    MapZoom,
    MapTileUrl,
    MapAttribution,
    LoggingLevel,
    LoggingFile,
}

const ALL_KEYS: [ConfigKey; 13] = [
    ConfigKey::TrackingPublishIntervalSecs,
    ConfigKey::TrackingPositionTimeoutSecs,
    ConfigKey::TrackingOwnPositionRefreshSecs,
    ConfigKey::FeedReconnectInitialMs,
    ConfigKey::FeedReconnectMaxSecs,
    ConfigKey::FeedReconnectAttempts,
    ConfigKey::MapCenterLat,
    ConfigKey::MapCenterLng,
    ConfigKey::MapZoom,
    ConfigKey::MapTileUrl,
    ConfigKey::MapAttribution,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingFile,
];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    pub fn section(&self) -> &'static str {
        match self {
            Self::TrackingPublishIntervalSecs
            | Self::TrackingPositionTimeoutSecs
            | Self::TrackingOwnPositionRefreshSecs => "tracking",
            Self::FeedReconnectInitialMs
            | Self::FeedReconnectMaxSecs
            | Self::FeedReconnectAttempts => "feed",
            Self::MapCenterLat
            | Self::MapCenterLng
            | Self::MapZoom
            | Self::MapTileUrl
            | Self::MapAttribution => "map",
            Self::LoggingLevel | Self::LoggingFile => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            Self::TrackingPublishIntervalSecs => "publish_interval_secs",
            Self::TrackingPositionTimeoutSecs => "position_timeout_secs",
            Self::TrackingOwnPositionRefreshSecs => "own_position_refresh_secs",
            Self::FeedReconnectInitialMs => "reconnect_initial_ms",
            Self::FeedReconnectMaxSecs => "reconnect_max_secs",
            Self::FeedReconnectAttempts => "reconnect_attempts",
            Self::MapCenterLat => "center_lat",
            Self::MapCenterLng => "center_lng",
            Self::MapZoom => "zoom",
            Self::MapTileUrl => "tile_url",
            Self::MapAttribution => "attribution",
            Self::LoggingLevel => "level",
            Self::LoggingFile => "file",
        }
    }

    /// Current value as a string. Unset optional values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::TrackingPublishIntervalSecs => config.tracking.publish_interval_secs.to_string(),
            Self::TrackingPositionTimeoutSecs => config.tracking.position_timeout_secs.to_string(),
            Self::TrackingOwnPositionRefreshSecs => {
                config.tracking.own_position_refresh_secs.to_string()
            }
            Self::FeedReconnectInitialMs => config.feed.reconnect_initial_ms.to_string(),
            Self::FeedReconnectMaxSecs => config.feed.reconnect_max_secs.to_string(),
            Self::FeedReconnectAttempts => config.feed.reconnect_attempts.to_string(),
            Self::MapCenterLat => config.map.center_lat.to_string(),
            Self::MapCenterLng => config.map.center_lng.to_string(),
            Self::MapZoom => config.map.zoom.to_string(),
            Self::MapTileUrl => config.map.tile_url.clone(),
            Self::MapAttribution => config.map.attribution.clone(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            Self::TrackingPublishIntervalSecs => {
                config.tracking.publish_interval_secs = self.parse_positive(value)?
            }
            Self::TrackingPositionTimeoutSecs => {
                config.tracking.position_timeout_secs = self.parse_positive(value)?
            }
            Self::TrackingOwnPositionRefreshSecs => {
                config.tracking.own_position_refresh_secs = self.parse(value)?
            }
            Self::FeedReconnectInitialMs => {
                config.feed.reconnect_initial_ms = self.parse_positive(value)?
            }
            Self::FeedReconnectMaxSecs => {
                config.feed.reconnect_max_secs = self.parse_positive(value)?
            }
            Self::FeedReconnectAttempts => config.feed.reconnect_attempts = self.parse(value)?,
            Self::MapCenterLat => {
                config.map.center_lat = self.parse_in_range(value, -90.0, 90.0)?
            }
            Self::MapCenterLng => {
                config.map.center_lng = self.parse_in_range(value, -180.0, 180.0)?
            }
            Self::MapZoom => {
                let zoom: u8 = self.parse(value)?;
                if zoom > 19 {
                    return Err(self.invalid(value, "zoom must be between 0 and 19"));
                }
                config.map.zoom = zoom;
            }
            Self::MapTileUrl => {
                if !value.contains("{z}") {
                    return Err(self.invalid(value, "tile URL must contain {z}, {x} and {y}"));
                }
                config.map.tile_url = value.to_string();
            }
            Self::MapAttribution => config.map.attribution = value.to_string(),
            Self::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(value, "expected trace, debug, info, warn or error"));
                }
                config.logging.level = level;
            }
            Self::LoggingFile => {
                config.logging.file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn parse_positive(&self, value: &str) -> Result<u64, ConfigError> {
        match self.parse::<u64>(value)? {
            0 => Err(self.invalid(value, "must be greater than zero")),
            n => Ok(n),
        }
    }

    fn parse_in_range(&self, value: &str, min: f64, max: f64) -> Result<f64, ConfigError> {
        let parsed: f64 = self.parse(value)?;
        if !(min..=max).contains(&parsed) {
            return Err(self.invalid(value, format!("must be between {} and {}", min, max)));
        }
        Ok(parsed)
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown_keys() {
        let key: ConfigKey = "tracking.publish_interval_secs".parse().unwrap();
        assert_eq!(key, ConfigKey::TrackingPublishIntervalSecs);
        assert_eq!("MAP.ZOOM".parse::<ConfigKey>().unwrap(), ConfigKey::MapZoom);
        assert!(matches!(
            "map.colour".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_key_round_trips_its_name() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
    }

    #[test]
    fn test_set_validates_values() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::TrackingPublishIntervalSecs.set(&mut config, "0").is_err());
        assert!(ConfigKey::MapCenterLat.set(&mut config, "91").is_err());
        assert!(ConfigKey::MapZoom.set(&mut config, "25").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());

        ConfigKey::TrackingPublishIntervalSecs.set(&mut config, " 20 ").unwrap();
        ConfigKey::LoggingLevel.set(&mut config, "DEBUG").unwrap();
        assert_eq!(config.tracking.publish_interval_secs, 20);
        assert_eq!(ConfigKey::LoggingLevel.get(&config), "debug");
    }

    #[test]
    fn test_logging_file_can_be_cleared() {
        let mut config = ConfigFile::default();
        ConfigKey::LoggingFile.set(&mut config, "/var/log/rt.log").unwrap();
        assert_eq!(ConfigKey::LoggingFile.get(&config), "/var/log/rt.log");
        ConfigKey::LoggingFile.set(&mut config, "").unwrap();
        assert!(config.logging.file.is_none());
        assert_eq!(ConfigKey::LoggingFile.get(&config), "");
    }
}
