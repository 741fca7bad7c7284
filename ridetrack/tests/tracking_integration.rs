//! End-to-end tests for driver publishing and viewer tracking.
//!
//! These tests drive a driver session and a viewer session against one
//! in-memory store and check what the viewer's map shows:
//! - driver position reaches the viewer's map and recenters it
//! - later positions replace earlier ones
//! - skipped cycles do not stop the schedule
//! - disposing releases timers, feeds and maps
//!
//! Run with: `cargo test --test tracking_integration`

use std::sync::Arc;
use std::time::Duration;

use ridetrack::geolocation::{GeolocationError, Geolocator, ScriptStep, ScriptedGeolocation};
use ridetrack::map::{HeadlessMapFactory, MapArena, MapConfig, MapContainer, MarkerKind};
use ridetrack::notify::{NoticeLevel, RecordingNotifier};
use ridetrack::session::{SessionOptions, TrackingContext, TrackingSession, TrackingStatus};
use ridetrack::store::{CurrentUser, LocationStore, MemoryLocationStore, StaticAccount};
use ridetrack::{Role, TripId};

// ============================================================================
// Helper Functions
// ============================================================================

const TRIP: &str = "trip-rabat-casa";

struct World {
    store: Arc<MemoryLocationStore>,
    factory: Arc<HeadlessMapFactory>,
    maps: Arc<MapArena>,
    driver_notices: Arc<RecordingNotifier>,
}

impl World {
    fn new() -> Self {
        let factory = Arc::new(HeadlessMapFactory::new());
        Self {
            store: Arc::new(MemoryLocationStore::new()),
            maps: Arc::new(MapArena::new(factory.clone(), MapConfig::default())),
            factory,
            driver_notices: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Context for a device whose positioning follows `steps`.
    fn device(
        &self,
        user: &str,
        steps: Vec<ScriptStep>,
        notices: Arc<RecordingNotifier>,
    ) -> TrackingContext {
        TrackingContext::new(
            Arc::new(Geolocator::new(Arc::new(ScriptedGeolocation::new(steps)))),
            self.store.clone(),
            Arc::new(StaticAccount::signed_in(CurrentUser::new(format!("auth-{}", user), user))),
            notices,
            self.maps.clone(),
        )
    }

    async fn driver(&self, steps: Vec<ScriptStep>) -> TrackingSession {
        let ctx = self.device("driver-1", steps, self.driver_notices.clone());
        TrackingSession::mount(
            ctx,
            SessionOptions::new(TRIP, Role::Driver, MapContainer::new("driver-map"))
                .with_driver_label("Youssef"),
        )
        .await
        .unwrap()
    }

    async fn viewer(&self, container: &str) -> TrackingSession {
        let ctx = self.device(
            "passenger-1",
            vec![ScriptStep::Fix(34.02, -6.83)],
            Arc::new(RecordingNotifier::new()),
        );
        let options = SessionOptions::new(TRIP, Role::Viewer, MapContainer::new(container));
        TrackingSession::mount(ctx, options).await.unwrap()
    }
}

async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Driver captures (33.97, -6.85); the viewer's map shows exactly one driver
/// marker there and is centered on it.
#[tokio::test(start_paused = true)]
async fn test_driver_position_reaches_viewer_map() {
    let world = World::new();
    let driver = world.driver(vec![ScriptStep::Fix(33.97, -6.85)]).await;
    let viewer = world.viewer("viewer-map").await;

    driver.start_tracking().unwrap();
    advance(Duration::from_millis(50)).await;

    let map = world
        .factory
        .live_in(&MapContainer::new("viewer-map"))
        .expect("viewer map mounted");
    let drivers = map.markers_of(MarkerKind::Driver);
    assert_eq!(drivers.len(), 1);
    assert_eq!((drivers[0].at.lat, drivers[0].at.lng), (33.97, -6.85));
    assert_eq!(drivers[0].popup.title, "Driver");

    let (center, zoom) = map.view.unwrap();
    assert_eq!((center.lat, center.lng), (33.97, -6.85));
    assert_eq!(zoom, MapConfig::default().zoom);

    // The viewer also sees their own marker, without it moving the viewport.
    assert_eq!(map.markers_of(MarkerKind::Viewer).len(), 1);
    assert_eq!(viewer.status(), TrackingStatus::Live);
}

/// A viewer mounted after the driver already published sees the stored
/// position immediately, before any new change arrives.
#[tokio::test(start_paused = true)]
async fn test_late_viewer_sees_last_known_position() {
    let world = World::new();
    let driver = world.driver(vec![ScriptStep::Fix(33.97, -6.85)]).await;
    driver.start_tracking().unwrap();
    advance(Duration::from_millis(50)).await;
    driver.stop_tracking().unwrap();

    let viewer = world.viewer("late-viewer").await;
    let position = viewer.latest_driver_position().unwrap();
    assert_eq!((position.latitude, position.longitude), (33.97, -6.85));
}

/// P1 then P2 from the driver: the viewer ends on P2 with one driver marker.
#[tokio::test(start_paused = true)]
async fn test_viewer_follows_successive_positions() {
    let world = World::new();
    let driver = world
        .driver(vec![ScriptStep::Fix(33.97, -6.85), ScriptStep::Fix(33.99, -6.80)])
        .await;
    let viewer = world.viewer("viewer-map").await;

    driver.start_tracking().unwrap();
    advance(Duration::from_secs(31)).await;

    let latest = viewer.latest_driver_position().unwrap();
    assert_eq!((latest.latitude, latest.longitude), (33.99, -6.80));

    let map = world.factory.live_in(&MapContainer::new("viewer-map")).unwrap();
    let drivers = map.markers_of(MarkerKind::Driver);
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].at.lat, 33.99);
    assert_eq!(driver.publisher_stats().unwrap().published, 2);
}

/// A cycle whose position read times out is skipped; the cycle 30s later
/// publishes normally.
#[tokio::test(start_paused = true)]
async fn test_timed_out_cycle_is_skipped() {
    let world = World::new();
    let driver = world
        .driver(vec![
            ScriptStep::Fix(33.97, -6.85),
            ScriptStep::Hang,
            ScriptStep::Fix(34.00, -6.70),
        ])
        .await;
    let viewer = world.viewer("viewer-map").await;

    driver.start_tracking().unwrap();
    advance(Duration::from_secs(45)).await;

    let stats = driver.publisher_stats().unwrap();
    assert_eq!(stats.published, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(world.driver_notices.count(NoticeLevel::Warning), 1);
    assert_eq!(viewer.latest_driver_position().unwrap().latitude, 33.97);

    advance(Duration::from_secs(20)).await;
    assert_eq!(viewer.latest_driver_position().unwrap().latitude, 34.00);
    assert!(driver.is_tracking());
}

/// A permission denial stops publishing until the driver restarts tracking.
#[tokio::test(start_paused = true)]
async fn test_permission_denied_pauses_until_restart() {
    let world = World::new();
    let driver = world
        .driver(vec![
            ScriptStep::Fix(33.97, -6.85),
            ScriptStep::Fail(GeolocationError::PermissionDenied),
            ScriptStep::Fix(33.99, -6.80),
        ])
        .await;
    let trip = TripId::new(TRIP);

    driver.start_tracking().unwrap();
    advance(Duration::from_secs(35)).await;
    assert!(!driver.is_tracking());
    assert_eq!(driver.pending_timers(), 0);
    assert_eq!(world.driver_notices.count(NoticeLevel::Error), 1);

    advance(Duration::from_secs(30)).await;
    assert_eq!(world.store.row(&trip).unwrap().latitude, 33.97);

    assert!(driver.start_tracking().unwrap());
    advance(Duration::from_secs(1)).await;
    assert_eq!(world.store.row(&trip).unwrap().latitude, 33.99);
}

/// Disposing both sessions leaves no timers, feeds or maps behind.
#[tokio::test(start_paused = true)]
async fn test_dispose_leaves_nothing_running() {
    let world = World::new();
    let driver = world.driver(vec![ScriptStep::Fix(33.97, -6.85)]).await;
    let viewer = world.viewer("viewer-map").await;
    driver.start_tracking().unwrap();
    advance(Duration::from_secs(1)).await;
    assert_eq!(world.store.active_subscriptions(), 2);

    driver.dispose();
    viewer.dispose();

    assert_eq!(driver.pending_timers(), 0);
    assert_eq!(viewer.pending_timers(), 0);
    assert_eq!(driver.active_subscriptions(), 0);
    assert_eq!(viewer.active_subscriptions(), 0);
    assert_eq!(world.store.active_subscriptions(), 0);
    assert!(world.maps.is_empty());
    assert_eq!(world.factory.live_instances(), 0);

    // Nothing is written after dispose.
    let writes = world.store.write_count();
    advance(Duration::from_secs(90)).await;
    assert_eq!(world.store.write_count(), writes);
}

/// Two views on the same trip get independent maps.
#[tokio::test(start_paused = true)]
async fn test_concurrent_views_are_independent() {
    let world = World::new();
    let driver = world.driver(vec![ScriptStep::Fix(33.97, -6.85)]).await;
    let first = world.viewer("panel-a").await;
    let second = world.viewer("panel-b").await;
    driver.start_tracking().unwrap();
    advance(Duration::from_millis(50)).await;

    assert_ne!(first.view_id(), second.view_id());
    first.dispose();

    assert!(world.factory.live_in(&MapContainer::new("panel-a")).is_none());
    let remaining = world.factory.live_in(&MapContainer::new("panel-b")).unwrap();
    assert_eq!(remaining.markers_of(MarkerKind::Driver).len(), 1);
    assert_eq!(second.status(), TrackingStatus::Live);
}

/// A backend-dropped feed is reopened and the viewer catches up.
#[tokio::test(start_paused = true)]
async fn test_viewer_recovers_from_dropped_feed() {
    let world = World::new();
    let driver = world
        .driver(vec![ScriptStep::Fix(33.97, -6.85), ScriptStep::Fix(33.99, -6.80)])
        .await;
    let viewer = world.viewer("viewer-map").await;
    driver.start_tracking().unwrap();
    advance(Duration::from_millis(50)).await;

    world.store.drop_feeds(&TripId::new(TRIP));
    advance(Duration::from_secs(31)).await;

    assert_eq!(viewer.active_subscriptions(), 1);
    assert_eq!(viewer.latest_driver_position().unwrap().latitude, 33.99);
}
