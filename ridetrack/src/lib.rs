//! RideTrack - Live driver location tracking for shared trips
//!
//! This library provides the tracking core of a ride-sharing marketplace:
//! capturing the driver's position, publishing it to a shared store,
//! following the store's change feed from any viewer, and reconciling the
//! driver and passenger markers on a map surface.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐
//! │  Geolocator  │──►│ LocationPublisher│──►│ LocationStore │
//! └──────────────┘   └──────────────────┘   └───────┬───────┘
//!                                                   │ change feed
//!                    ┌──────────────────┐   ┌───────▼───────────┐
//!                    │   MapRenderer    │◄──│ LocationSubscriber│
//!                    └──────────────────┘   └───────────────────┘
//! ```
//!
//! A [`session::TrackingSession`] owns one of each per mounted view and
//! releases all of them on [`session::TrackingSession::dispose`].
//!
//! The backend, the device positioning capability and the map engine are
//! trait seams. In-memory and headless implementations are provided for
//! tests and for the `ridetrack simulate` command.

pub mod chat;
pub mod config;
pub mod geolocation;
pub mod logging;
pub mod map;
pub mod notify;
pub mod position;
pub mod publisher;
pub mod session;
pub mod store;
pub mod subscriber;
pub mod types;

pub use position::Position;
pub use types::{BookingId, BoxFuture, Role, TripId, UserId, ViewId};
