//! Per-view tracking sessions.
//!
//! A [`TrackingSession`] is the owned-resource record of one mounted
//! tracking view: its map renderer, its driver-location subscriber, the
//! driver's publisher (driver role only) and the background tasks that
//! connect them.
//!
//! ```text
//!                      ┌──────────────────── TrackingSession ───────────────────┐
//!   LocationStore ───► │ LocationSubscriber ──watch──► render task ──► renderer │
//!        ▲             │                                                         │
//!        └──────────── │ LocationPublisher (driver)   own-position task ──────► │
//!                      └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything a session starts is stopped by [`TrackingSession::dispose`],
//! which also runs on drop.

mod context;
mod error;
mod tracking;

pub use context::{SessionOptions, TrackingContext};
pub use error::TrackingError;
pub use tracking::{TrackingSession, TrackingSnapshot, TrackingStatus};
