//! In-process location store.
//!
//! Holds one row per trip and fans changes out through a [`FeedHub`]. Tests
//! use the injection hooks to exercise failure paths:
//!
//! - [`MemoryLocationStore::fail_next_writes`] / `fail_next_reads` / `fail_next_subscribes`
//! - [`MemoryLocationStore::set_write_delay`] for slow writes
//! - [`MemoryLocationStore::drop_feeds`] to drop subscriptions backend-side

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::types::{BoxFuture, TripId};

use super::{
    ChangeEvent, ChangeKind, DriverLocationRecord, FeedHub, LocationFeed, LocationStore,
    LocationUpdate, StoreError, SubscriptionId,
};

#[derive(Debug, Default)]
struct FailurePlan {
    writes: u32,
    reads: u32,
    subscribes: u32,
}

#[derive(Debug, Default)]
struct StoreState {
    rows: HashMap<TripId, DriverLocationRecord>,
    sequence: u64,
}

/// Location store backed by process memory.
pub struct MemoryLocationStore {
    state: Mutex<StoreState>,
    feed: FeedHub<TripId, ChangeEvent>,
    failures: Mutex<FailurePlan>,
    write_delay: Mutex<Option<Duration>>,
    writes: AtomicU64,
}

impl Default for MemoryLocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLocationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            feed: FeedHub::new(),
            failures: Mutex::new(FailurePlan::default()),
            write_delay: Mutex::new(None),
            writes: AtomicU64::new(0),
        }
    }

    /// Make the next `count` writes fail with `WriteFailed`.
    pub fn fail_next_writes(&self, count: u32) {
        self.failures.lock().writes = count;
    }

    /// Make the next `count` reads fail with `ReadFailed`.
    pub fn fail_next_reads(&self, count: u32) {
        self.failures.lock().reads = count;
    }

    /// Make the next `count` subscribe calls fail with `SubscriptionDropped`.
    pub fn fail_next_subscribes(&self, count: u32) {
        self.failures.lock().subscribes = count;
    }

    /// Delay every write by `delay` before it is applied.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    /// Drop every feed subscription for a trip, as a backend disconnect would.
    pub fn drop_feeds(&self, trip_id: &TripId) -> usize {
        self.feed.drop_key(trip_id)
    }

    /// Number of open feed subscriptions for one trip.
    pub fn active_subscriptions_for(&self, trip_id: &TripId) -> usize {
        self.feed.active_for(trip_id)
    }

    /// Current row for a trip, read synchronously.
    pub fn row(&self, trip_id: &TripId) -> Option<DriverLocationRecord> {
        self.state.lock().rows.get(trip_id).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Delete a trip's row and notify subscribers.
    pub fn delete(&self, trip_id: &TripId) -> bool {
        let event = {
            let mut state = self.state.lock();
            if state.rows.remove(trip_id).is_none() {
                return false;
            }
            state.sequence += 1;
            ChangeEvent {
                kind: ChangeKind::Delete,
                record: None,
                sequence: state.sequence,
            }
        };
        self.feed.publish(trip_id, event);
        true
    }

    fn take_failure(&self, pick: impl FnOnce(&mut FailurePlan) -> &mut u32) -> bool {
        let mut plan = self.failures.lock();
        let remaining = pick(&mut plan);
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

impl LocationStore for MemoryLocationStore {
    fn upsert_driver_location(
        &self,
        update: LocationUpdate,
    ) -> BoxFuture<'_, Result<DriverLocationRecord, StoreError>> {
        Box::pin(async move {
            let delay = *self.write_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.take_failure(|plan| &mut plan.writes) {
                return Err(StoreError::WriteFailed("injected write failure".to_string()));
            }
            if !(-90.0..=90.0).contains(&update.latitude)
                || !(-180.0..=180.0).contains(&update.longitude)
            {
                return Err(StoreError::WriteFailed(
                    "coordinates out of range".to_string(),
                ));
            }

            let (record, event) = {
                let mut state = self.state.lock();
                state.sequence += 1;
                let kind = if state.rows.contains_key(&update.trip_id) {
                    ChangeKind::Update
                } else {
                    ChangeKind::Insert
                };
                let record = DriverLocationRecord {
                    trip_id: update.trip_id,
                    driver_id: update.driver_id,
                    latitude: update.latitude,
                    longitude: update.longitude,
                    updated_at: Utc::now(),
                };
                state.rows.insert(record.trip_id.clone(), record.clone());
                let event = ChangeEvent {
                    kind,
                    record: Some(record.clone()),
                    sequence: state.sequence,
                };
                (record, event)
            };

            self.writes.fetch_add(1, Ordering::Relaxed);
            let delivered = self.feed.publish(&record.trip_id, event);
            trace!(trip = %record.trip_id, delivered, "Driver location stored");
            Ok(record)
        })
    }

    fn fetch_latest(
        &self,
        trip_id: &TripId,
    ) -> BoxFuture<'_, Result<Option<DriverLocationRecord>, StoreError>> {
        let trip_id = trip_id.clone();
        Box::pin(async move {
            if self.take_failure(|plan| &mut plan.reads) {
                return Err(StoreError::ReadFailed("injected read failure".to_string()));
            }
            Ok(self.row(&trip_id))
        })
    }

    fn subscribe(&self, trip_id: &TripId) -> BoxFuture<'_, Result<LocationFeed, StoreError>> {
        let trip_id = trip_id.clone();
        Box::pin(async move {
            if self.take_failure(|plan| &mut plan.subscribes) {
                return Err(StoreError::SubscriptionDropped(format!(
                    "driver-location feed for trip {} refused",
                    trip_id
                )));
            }
            Ok(self.feed.subscribe(trip_id))
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if !self.feed.unsubscribe(id) {
            debug!(subscription = %id, "Unsubscribe for a feed that is already closed");
        }
    }

    fn active_subscriptions(&self) -> usize {
        self.feed.active()
    }
}
