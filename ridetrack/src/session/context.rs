//! Shared dependencies and per-view options.

use std::sync::Arc;

use crate::config::TrackingConfig;
use crate::geolocation::Geolocator;
use crate::map::{MapArena, MapContainer};
use crate::notify::Notifier;
use crate::store::{AccountService, LocationStore};
use crate::types::{Role, TripId};

/// Dependencies shared by every session of an application.
#[derive(Clone)]
pub struct TrackingContext {
    pub geolocator: Arc<Geolocator>,
    pub store: Arc<dyn LocationStore>,
    pub account: Arc<dyn AccountService>,
    pub notifier: Arc<dyn Notifier>,
    pub maps: Arc<MapArena>,
    pub config: TrackingConfig,
}

impl TrackingContext {
    /// Create a context with default tracking settings.
    pub fn new(
        geolocator: Arc<Geolocator>,
        store: Arc<dyn LocationStore>,
        account: Arc<dyn AccountService>,
        notifier: Arc<dyn Notifier>,
        maps: Arc<MapArena>,
    ) -> Self {
        Self {
            geolocator,
            store,
            account,
            notifier,
            maps,
            config: TrackingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TrackingConfig) -> Self {
        self.config = config;
        self
    }
}

/// What one view tracks and where it draws.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub trip_id: TripId,
    pub role: Role,
    pub container: MapContainer,
    /// Extra popup line on the driver marker, usually the driver's name.
    pub driver_label: Option<String>,
    /// Extra popup line on the viewer marker.
    pub viewer_label: Option<String>,
}

impl SessionOptions {
    pub fn new(trip_id: impl Into<TripId>, role: Role, container: MapContainer) -> Self {
        Self {
            trip_id: trip_id.into(),
            role,
            container,
            driver_label: None,
            viewer_label: None,
        }
    }

    pub fn with_driver_label(mut self, label: impl Into<String>) -> Self {
        self.driver_label = Some(label.into());
        self
    }

    pub fn with_viewer_label(mut self, label: impl Into<String>) -> Self {
        self.viewer_label = Some(label.into());
        self
    }
}
