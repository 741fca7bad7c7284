//! Runtime settings derived from the configuration file.

use std::time::Duration;

use crate::map::{LatLng, MapConfig};
use crate::publisher::PublisherConfig;
use crate::subscriber::ReconnectPolicy;

use super::ConfigFile;

/// Settings for tracking sessions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackingConfig {
    pub publisher: PublisherConfig,
    pub reconnect: ReconnectPolicy,
    /// Refresh period for the viewer's own marker after the first capture.
    pub own_position_refresh: Option<Duration>,
    pub map: MapConfig,
}

impl TrackingConfig {
    /// Build runtime settings from a loaded config file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let tracking = &config.tracking;
        let publisher = PublisherConfig::default()
            .with_interval(Duration::from_secs(tracking.publish_interval_secs.max(1)))
            .with_position_timeout(Duration::from_secs(tracking.position_timeout_secs.max(1)));

        let reconnect = ReconnectPolicy::default()
            .with_initial_delay(Duration::from_millis(config.feed.reconnect_initial_ms.max(1)))
            .with_max_delay(Duration::from_secs(config.feed.reconnect_max_secs.max(1)))
            .with_max_attempts(config.feed.reconnect_attempts);

        let own_position_refresh = (tracking.own_position_refresh_secs > 0)
            .then(|| Duration::from_secs(tracking.own_position_refresh_secs));

        let map = MapConfig {
            center: LatLng {
                lat: config.map.center_lat,
                lng: config.map.center_lng,
            },
            zoom: config.map.zoom,
            tile_url: config.map.tile_url.clone(),
            attribution: config.map.attribution.clone(),
        };

        Self {
            publisher,
            reconnect,
            own_position_refresh,
            map,
        }
    }

    pub fn with_publisher(mut self, publisher: PublisherConfig) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// A zero period turns the refresh off, as in the config file.
    pub fn with_own_position_refresh(mut self, period: Option<Duration>) -> Self {
        self.own_position_refresh = period.filter(|period| !period.is_zero());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_default_file() {
        let from_file = TrackingConfig::from_config_file(&ConfigFile::default());
        assert_eq!(from_file, TrackingConfig::default());
    }

    #[test]
    fn test_file_values_are_applied() {
        let mut file = ConfigFile::default();
        file.tracking.publish_interval_secs = 5;
        file.tracking.own_position_refresh_secs = 20;
        file.feed.reconnect_attempts = 0;
        file.map.zoom = 15;

        let config = TrackingConfig::from_config_file(&file);
        assert_eq!(config.publisher.interval, Duration::from_secs(5));
        assert_eq!(config.own_position_refresh, Some(Duration::from_secs(20)));
        assert!(!config.reconnect.is_enabled());
        assert_eq!(config.map.zoom, 15);
    }

    #[test]
    fn test_zero_periods_are_not_accepted() {
        let config = TrackingConfig::default()
            .with_publisher(PublisherConfig::default().with_interval(Duration::ZERO))
            .with_own_position_refresh(Some(Duration::ZERO));

        assert_eq!(config.publisher.interval, crate::publisher::MIN_PUBLISH_INTERVAL);
        assert_eq!(config.own_position_refresh, None);
    }
}
