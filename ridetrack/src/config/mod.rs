//! Configuration file and runtime tracking settings.
//!
//! Settings live in an INI file at `~/.config/ridetrack/config.ini`:
//!
//! ```ini
//! [tracking]
//! publish_interval_secs = 30
//! position_timeout_secs = 10
//! own_position_refresh_secs = 0
//!
//! [feed]
//! reconnect_initial_ms = 1000
//! reconnect_max_secs = 30
//! reconnect_attempts = 5
//!
//! [map]
//! center_lat = 33.9716
//! center_lng = -6.8498
//! zoom = 13
//! tile_url = https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Missing keys fall back to defaults. [`ConfigKey`] addresses single
//! settings as `section.key` for the `ridetrack config` command.

mod error;
mod file;
mod keys;
mod tracking;

pub use error::ConfigError;
pub use file::{
    config_directory, config_file_path, ConfigFile, FeedSettings, LoggingSettings, MapSettings,
    TrackingSettings,
};
pub use keys::ConfigKey;
pub use tracking::TrackingConfig;
