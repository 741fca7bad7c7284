//! Change-feed listener for one trip.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::notify::{Notice, Notifier};
use crate::position::Position;
use crate::store::{ChangeEvent, LocationFeed, LocationStore, SubscriptionId};
use crate::types::TripId;

use super::ReconnectPolicy;

/// State shared by the subscriber handle and its listener task.
struct FeedShared {
    trip_id: TripId,
    store: Arc<dyn LocationStore>,
    notifier: Arc<dyn Notifier>,
    policy: ReconnectPolicy,
    latest: watch::Sender<Option<Position>>,
}

/// Handle on a running listener.
struct ActiveFeed {
    cancellation: CancellationToken,
    slot: Arc<Mutex<Option<SubscriptionId>>>,
}

/// Follows the driver location of one trip.
///
/// # Example
///
/// ```ignore
/// let subscriber = LocationSubscriber::new(trip_id, store, notifier, ReconnectPolicy::default());
/// subscriber.start().await;
/// let mut updates = subscriber.watch();
/// while updates.changed().await.is_ok() {
///     render(*updates.borrow());
/// }
/// ```
pub struct LocationSubscriber {
    shared: Arc<FeedShared>,
    active: Mutex<Option<ActiveFeed>>,
}

impl LocationSubscriber {
    pub fn new(
        trip_id: TripId,
        store: Arc<dyn LocationStore>,
        notifier: Arc<dyn Notifier>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            shared: Arc::new(FeedShared {
                trip_id,
                store,
                notifier,
                policy,
                latest,
            }),
            active: Mutex::new(None),
        }
    }

    /// Trip being followed.
    pub fn trip_id(&self) -> &TripId {
        &self.shared.trip_id
    }

    /// Load the stored position, then open the change feed.
    ///
    /// Failures are reported through the notifier. If the feed cannot be
    /// opened the listener keeps retrying per the reconnect policy. Calling
    /// `start` on a started subscriber does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) {
        let listener = {
            let mut active = self.active.lock();
            if active.is_some() {
                debug!(trip = %self.shared.trip_id, "Subscriber already started");
                return;
            }
            let feed = ActiveFeed {
                cancellation: CancellationToken::new(),
                slot: Arc::new(Mutex::new(None)),
            };
            let listener = FeedListener {
                shared: Arc::clone(&self.shared),
                cancellation: feed.cancellation.clone(),
                slot: Arc::clone(&feed.slot),
            };
            *active = Some(feed);
            listener
        };

        listener.refresh().await;
        if listener.cancellation.is_cancelled() {
            return;
        }

        let feed = listener.open().await;
        if feed.is_none() && !listener.cancellation.is_cancelled() {
            self.shared.notifier.notify(Notice::warning(
                "Live updates unavailable",
                "Retrying the driver location feed",
            ));
        }
        info!(
            trip = %self.shared.trip_id,
            connected = feed.is_some(),
            "Driver location subscriber started"
        );
        tokio::spawn(listener.run(feed));
    }

    /// Close the feed and stop the listener.
    ///
    /// Synchronous and idempotent. Returns `false` if nothing was running.
    pub fn close(&self) -> bool {
        let Some(feed) = self.active.lock().take() else {
            return false;
        };
        let subscription = {
            let mut slot = feed.slot.lock();
            feed.cancellation.cancel();
            slot.take()
        };
        if let Some(id) = subscription {
            self.shared.store.unsubscribe(id);
        }
        debug!(trip = %self.shared.trip_id, "Driver location subscriber closed");
        true
    }

    /// Latest known driver position.
    pub fn latest(&self) -> Option<Position> {
        *self.shared.latest.borrow()
    }

    /// Receiver notified on every position change.
    pub fn watch(&self) -> watch::Receiver<Option<Position>> {
        self.shared.latest.subscribe()
    }

    /// Whether a change feed is currently open.
    pub fn is_active(&self) -> bool {
        self.active_subscriptions() > 0
    }

    /// Number of open change feeds held by this subscriber (0 or 1).
    pub fn active_subscriptions(&self) -> usize {
        self.active
            .lock()
            .as_ref()
            .map_or(0, |feed| usize::from(feed.slot.lock().is_some()))
    }
}

impl Drop for LocationSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

/// Listener task state. Sole writer of the latest position.
struct FeedListener {
    shared: Arc<FeedShared>,
    cancellation: CancellationToken,
    slot: Arc<Mutex<Option<SubscriptionId>>>,
}

impl FeedListener {
    async fn run(self, initial: Option<LocationFeed>) {
        let mut next = initial;
        loop {
            let feed = match next.take() {
                Some(feed) => feed,
                None => match self.reopen().await {
                    Some(feed) => feed,
                    None => break,
                },
            };
            if !self.follow(feed).await {
                break;
            }
            warn!(trip = %self.shared.trip_id, "Driver location feed dropped");
            self.shared.notifier.notify(Notice::warning(
                "Live updates interrupted",
                "Reconnecting to the driver location feed",
            ));
        }
        debug!(trip = %self.shared.trip_id, "Driver location listener exited");
    }

    /// Apply events until the feed drops (`true`) or the listener is cancelled (`false`).
    async fn follow(&self, mut feed: LocationFeed) -> bool {
        loop {
            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => {
                    self.release(feed.id());
                    return false;
                }

                event = feed.next_event() => match event {
                    Some(event) => self.apply(event),
                    None => {
                        self.forget(feed.id());
                        return !self.cancellation.is_cancelled();
                    }
                }
            }
        }
    }

    fn apply(&self, event: ChangeEvent) {
        let Some(position) = event.position() else {
            debug!(kind = ?event.kind, sequence = event.sequence, "Change without a location row");
            return;
        };
        if !position.is_valid() {
            warn!(position = %position, "Ignoring out-of-range driver location");
            return;
        }
        trace!(sequence = event.sequence, position = %position, "Driver location changed");
        self.shared.latest.send_replace(Some(position));
    }

    /// Read the stored row into the latest position.
    async fn refresh(&self) {
        match self.shared.store.fetch_latest(&self.shared.trip_id).await {
            Ok(Some(record)) => {
                let position = record.position();
                if self.cancellation.is_cancelled() || !position.is_valid() {
                    return;
                }
                self.shared.latest.send_replace(Some(position));
            }
            Ok(None) => debug!(trip = %self.shared.trip_id, "No driver location stored yet"),
            Err(err) => {
                warn!(trip = %self.shared.trip_id, error = %err, "Driver location read failed");
                self.shared.notifier.notify(Notice::warning(
                    "Could not load driver location",
                    err.to_string(),
                ));
            }
        }
    }

    /// Open the feed and record its id, unless the listener was cancelled meanwhile.
    async fn open(&self) -> Option<LocationFeed> {
        match self.shared.store.subscribe(&self.shared.trip_id).await {
            Ok(feed) => {
                let mut slot = self.slot.lock();
                if self.cancellation.is_cancelled() {
                    drop(slot);
                    self.shared.store.unsubscribe(feed.id());
                    return None;
                }
                *slot = Some(feed.id());
                Some(feed)
            }
            Err(err) => {
                warn!(
                    trip = %self.shared.trip_id,
                    error = %err,
                    "Could not open driver location feed"
                );
                None
            }
        }
    }

    async fn reopen(&self) -> Option<LocationFeed> {
        let mut attempt = 1;
        while let Some(delay) = self.shared.policy.delay_for(attempt) {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Reopening driver location feed");
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(feed) = self.open().await {
                info!(trip = %self.shared.trip_id, attempt, "Driver location feed reopened");
                self.shared.notifier.notify(Notice::info(
                    "Live updates restored",
                    "Following the driver again",
                ));
                self.refresh().await;
                return Some(feed);
            }
            if self.cancellation.is_cancelled() {
                return None;
            }
            attempt += 1;
        }

        error!(
            trip = %self.shared.trip_id,
            attempts = attempt - 1,
            "Giving up on driver location feed"
        );
        self.shared.notifier.notify(Notice::error(
            "Live updates unavailable",
            "Reopen the trip to follow the driver again",
        ));
        None
    }

    fn release(&self, id: SubscriptionId) {
        self.forget(id);
        self.shared.store.unsubscribe(id);
    }

    fn forget(&self, id: SubscriptionId) {
        let mut slot = self.slot.lock();
        if *slot == Some(id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::notify::{NoticeLevel, RecordingNotifier};
    use crate::store::{LocationUpdate, MemoryLocationStore};
    use crate::types::UserId;
    use proptest::prelude::*;

    fn trip() -> TripId {
        TripId::new("trip-7")
    }

    fn update(lat: f64, lon: f64) -> LocationUpdate {
        LocationUpdate {
            trip_id: trip(),
            driver_id: UserId::new("driver-1"),
            latitude: lat,
            longitude: lon,
        }
    }

    fn subscriber(
        store: &Arc<MemoryLocationStore>,
        notifier: &Arc<RecordingNotifier>,
        policy: ReconnectPolicy,
    ) -> LocationSubscriber {
        LocationSubscriber::new(trip(), store.clone(), notifier.clone(), policy)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_eager_fetch_shows_stored_row() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        store.upsert_driver_location(update(33.97, -6.85)).await.unwrap();

        let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
        sub.start().await;

        let latest = sub.latest().unwrap();
        assert_eq!((latest.latitude, latest.longitude), (33.97, -6.85));
        assert!(sub.is_active());
        assert_eq!(store.active_subscriptions_for(&trip()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_event_wins() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
        sub.start().await;
        assert!(sub.latest().is_none());

        store.upsert_driver_location(update(1.0, 1.0)).await.unwrap();
        store.upsert_driver_location(update(2.0, 2.0)).await.unwrap();
        settle().await;

        assert_eq!(sub.latest().unwrap().latitude, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
        assert!(!sub.close());

        sub.start().await;
        assert!(sub.close());
        assert!(!sub.close());
        assert_eq!(sub.active_subscriptions(), 0);
        assert_eq!(store.active_subscriptions(), 0);

        // No events are applied after close.
        store.upsert_driver_location(update(5.0, 5.0)).await.unwrap();
        settle().await;
        assert!(sub.latest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_notifies_and_still_subscribes() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        store.fail_next_reads(1);

        let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
        sub.start().await;

        assert_eq!(notifier.count(NoticeLevel::Warning), 1);
        assert!(sub.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_feed_reopens_and_refetches() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
        sub.start().await;

        store.drop_feeds(&trip());
        settle().await;
        assert!(!sub.is_active());
        assert_eq!(notifier.count(NoticeLevel::Warning), 1);

        // Written while the feed is down.
        store.upsert_driver_location(update(3.0, 3.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(sub.is_active());
        assert_eq!(sub.latest().unwrap().latitude, 3.0);
        assert_eq!(notifier.count(NoticeLevel::Info), 1);
        assert_eq!(store.active_subscriptions_for(&trip()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let policy = ReconnectPolicy::default().with_max_attempts(2);
        let sub = subscriber(&store, &notifier, policy);
        sub.start().await;

        store.fail_next_subscribes(10);
        store.drop_feeds(&trip());
        // 1s + 2s of backoff.
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert!(!sub.is_active());
        assert_eq!(notifier.count(NoticeLevel::Error), 1);
        assert_eq!(store.active_subscriptions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_backoff_stops_reopening() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
        sub.start().await;

        store.drop_feeds(&trip());
        settle().await;
        sub.close();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(store.active_subscriptions(), 0);
        assert_eq!(notifier.count(NoticeLevel::Info), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_policy_reports_immediately() {
        let store = Arc::new(MemoryLocationStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let sub = subscriber(&store, &notifier, ReconnectPolicy::disabled());
        sub.start().await;

        store.drop_feeds(&trip());
        settle().await;
        assert_eq!(notifier.count(NoticeLevel::Error), 1);
    }

    proptest! {
        #[test]
        fn test_latest_is_last_write(
            points in prop::collection::vec((-90.0f64..=90.0, -180.0f64..=180.0), 1..20)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();
            let last = runtime.block_on(async {
                let store = Arc::new(MemoryLocationStore::new());
                let notifier = Arc::new(RecordingNotifier::new());
                let sub = subscriber(&store, &notifier, ReconnectPolicy::default());
                sub.start().await;
                for (lat, lon) in &points {
                    store.upsert_driver_location(update(*lat, *lon)).await.unwrap();
                }
                settle().await;
                sub.latest()
            });
            let (lat, lon) = points[points.len() - 1];
            let last = last.unwrap();
            prop_assert_eq!((last.latitude, last.longitude), (lat, lon));
        }
    }
}
