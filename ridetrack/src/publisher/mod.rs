//! Driver location publishing.
//!
//! While tracking is enabled the [`LocationPublisher`] captures the driver's
//! position on a fixed schedule and upserts it into the location store.
//!
//! # Schedule
//!
//! ```text
//! t=0        t=30s      t=60s      t=90s
//!  │ cycle 1  │ cycle 2  │ cycle 3  │ ...
//!  ▼          ▼          ▼          ▼
//! capture ─► publish (each cycle runs on its own task)
//! ```
//!
//! Cycles are fire-and-forget: a slow position read or a slow write never
//! delays the next tick. A failed read skips that cycle only. A permission
//! denial stops the schedule until the user starts tracking again.

mod cycle;
mod stats;
mod tracker;

pub use stats::{PublisherStats, PublisherStatsSnapshot};
pub use tracker::{
    LocationPublisher, PublisherConfig, DEFAULT_PUBLISH_INTERVAL, MIN_PUBLISH_INTERVAL,
};
