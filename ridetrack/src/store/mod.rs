//! Backend seams: location store, change feed and account service.
//!
//! The tracking core treats the backend as an eventually-consistent store
//! holding one driver-location row per trip, plus a push feed of changes to
//! those rows. [`MemoryLocationStore`] implements both in process, with
//! failure and latency injection for tests.
//!
//! # Feed lifecycle
//!
//! ```text
//! subscribe(trip) ──► FeedSubscription ──► next_event() ... ──► None (dropped)
//!        │                                                        │
//!        └──────────── unsubscribe(id) (explicit close) ◄─────────┘
//! ```

mod account;
mod error;
mod feed;
mod memory;
mod record;

pub use account::{AccountService, CurrentUser, StaticAccount};
pub use error::StoreError;
pub use feed::{FeedHub, FeedSubscription, SubscriptionId};
pub use memory::MemoryLocationStore;
pub use record::{ChangeEvent, ChangeKind, DriverLocationRecord, LocationUpdate};

use crate::types::{BoxFuture, TripId};

/// Subscription to driver-location changes of one trip.
pub type LocationFeed = FeedSubscription<TripId, ChangeEvent>;

/// Keyed driver-location store with a per-trip change feed.
///
/// # Semantics
///
/// - `upsert_driver_location` replaces the trip's row (last writer wins) and
///   stamps `updated_at`.
/// - `fetch_latest` returns the most recently updated row for the trip.
/// - `subscribe` delivers every subsequent insert/update/delete for the
///   trip, in store order. The subscription ends (yields `None`) if the
///   backend drops it.
/// - `unsubscribe` is synchronous and idempotent.
pub trait LocationStore: Send + Sync {
    /// Write the driver's position for a trip.
    fn upsert_driver_location(
        &self,
        update: LocationUpdate,
    ) -> BoxFuture<'_, Result<DriverLocationRecord, StoreError>>;

    /// Read the most recent location row for a trip.
    fn fetch_latest(
        &self,
        trip_id: &TripId,
    ) -> BoxFuture<'_, Result<Option<DriverLocationRecord>, StoreError>>;

    /// Open a change feed filtered to one trip.
    fn subscribe(&self, trip_id: &TripId) -> BoxFuture<'_, Result<LocationFeed, StoreError>>;

    /// Release a feed subscription.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Number of open feed subscriptions (all trips).
    fn active_subscriptions(&self) -> usize;
}
