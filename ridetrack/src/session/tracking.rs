//! Tracking session lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geolocation::{watch_positions, GeolocationError, Geolocator, PositionOptions};
use crate::map::SharedRenderer;
use crate::notify::{Notice, Notifier};
use crate::position::Position;
use crate::publisher::{LocationPublisher, PublisherStatsSnapshot};
use crate::subscriber::LocationSubscriber;
use crate::types::{Role, TripId, ViewId};

use super::{SessionOptions, TrackingContext, TrackingError};

/// What the view currently shows for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// No driver position known yet.
    AwaitingDriver,
    /// A driver position is on the map.
    Live,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSnapshot {
    pub view_id: ViewId,
    pub trip_id: TripId,
    pub role: Role,
    pub tracking_enabled: bool,
    pub latest_driver_position: Option<Position>,
    pub latest_own_position: Option<Position>,
    pub status: TrackingStatus,
}

/// One mounted tracking view.
///
/// # Example
///
/// ```ignore
/// let options = SessionOptions::new("trip-42", Role::Driver, MapContainer::new("trip-map"));
/// let session = TrackingSession::mount(context, options).await?;
/// session.start_tracking()?;
/// // ... view closed
/// session.dispose();
/// ```
pub struct TrackingSession {
    ctx: TrackingContext,
    options: SessionOptions,
    view_id: ViewId,
    renderer: SharedRenderer,
    subscriber: LocationSubscriber,
    publisher: Option<LocationPublisher>,
    own_position: Arc<watch::Sender<Option<Position>>>,
    cancellation: CancellationToken,
    render_task: Mutex<Option<JoinHandle<()>>>,
    own_position_task: Mutex<Option<JoinHandle<()>>>,
    refresh_enabled: bool,
    disposed: AtomicBool,
}

impl TrackingSession {
    /// Mount a view: map, subscriber, render task and own-position capture.
    ///
    /// Publishing is not started; drivers call
    /// [`start_tracking`](Self::start_tracking) explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::Map`] if the map cannot be created in the
    /// container. Nothing else is started in that case.
    pub async fn mount(
        ctx: TrackingContext,
        options: SessionOptions,
    ) -> Result<Self, TrackingError> {
        let view_id = ViewId::next();
        let renderer = ctx.maps.mount(view_id, &options.container)?;

        let (own_position, _) = watch::channel(None);
        let own_position = Arc::new(own_position);

        let subscriber = LocationSubscriber::new(
            options.trip_id.clone(),
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.notifier),
            ctx.config.reconnect,
        );

        let publisher = options.role.is_driver().then(|| {
            LocationPublisher::with_position_sink(
                options.trip_id.clone(),
                Arc::clone(&ctx.geolocator),
                Arc::clone(&ctx.store),
                Arc::clone(&ctx.account),
                Arc::clone(&ctx.notifier),
                ctx.config.publisher,
                Arc::clone(&own_position),
            )
        });

        let refresh_enabled = !options.role.is_driver()
            && ctx
                .config
                .own_position_refresh
                .is_some_and(|period| !period.is_zero());
        let session = Self {
            ctx,
            options,
            view_id,
            renderer,
            subscriber,
            publisher,
            own_position,
            cancellation: CancellationToken::new(),
            render_task: Mutex::new(None),
            own_position_task: Mutex::new(None),
            refresh_enabled,
            disposed: AtomicBool::new(false),
        };

        session.subscriber.start().await;
        session.spawn_render_task();
        session.spawn_own_position_task();

        info!(
            view = %session.view_id,
            trip = %session.options.trip_id,
            role = %session.options.role,
            "Tracking session mounted"
        );
        Ok(session)
    }

    fn spawn_render_task(&self) {
        let task = RenderTask {
            updates: self.subscriber.watch(),
            renderer: Arc::clone(&self.renderer),
            label: self.options.driver_label.clone(),
            cancellation: self.cancellation.child_token(),
        };
        *self.render_task.lock() = Some(tokio::spawn(task.run()));
    }

    fn spawn_own_position_task(&self) {
        let config = &self.ctx.config;
        let is_viewer = !self.options.role.is_driver();
        let task = OwnPositionTask {
            view_id: self.view_id,
            geolocator: Arc::clone(&self.ctx.geolocator),
            notifier: Arc::clone(&self.ctx.notifier),
            sink: Arc::clone(&self.own_position),
            marker: is_viewer
                .then(|| (Arc::clone(&self.renderer), self.options.viewer_label.clone())),
            first: config.publisher.first_capture,
            refresh: config
                .own_position_refresh
                .filter(|period| is_viewer && !period.is_zero())
                .map(|period| (period, config.publisher.cycle_capture)),
            cancellation: self.cancellation.child_token(),
        };
        *self.own_position_task.lock() = Some(tokio::spawn(task.run()));
    }

    /// Start publishing the driver's position.
    ///
    /// Returns `Ok(false)` if tracking was already running.
    pub fn start_tracking(&self) -> Result<bool, TrackingError> {
        Ok(self.publisher("start_tracking")?.start_tracking())
    }

    /// Stop publishing. Safe when tracking never started.
    pub fn stop_tracking(&self) -> Result<bool, TrackingError> {
        Ok(self.publisher("stop_tracking")?.stop_tracking())
    }

    fn publisher(&self, operation: &'static str) -> Result<&LocationPublisher, TrackingError> {
        if self.is_disposed() {
            return Err(TrackingError::Disposed);
        }
        self.publisher.as_ref().ok_or(TrackingError::WrongRole {
            role: self.options.role,
            operation,
        })
    }

    /// Dispose this view and mount a fresh one for `trip_id` in the same container.
    ///
    /// Tracking is not carried over.
    pub async fn switch_trip(&mut self, trip_id: impl Into<TripId>) -> Result<(), TrackingError> {
        let mut options = self.options.clone();
        options.trip_id = trip_id.into();
        debug!(
            view = %self.view_id,
            from = %self.options.trip_id,
            to = %options.trip_id,
            "Switching trip"
        );

        self.dispose();
        *self = Self::mount(self.ctx.clone(), options).await?;
        Ok(())
    }

    /// Release everything this session started. Idempotent.
    ///
    /// Returns `false` if the session was already disposed.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Some(publisher) = &self.publisher {
            publisher.stop_tracking();
        }
        self.subscriber.close();
        self.cancellation.cancel();
        for slot in [&self.render_task, &self.own_position_task] {
            if let Some(handle) = slot.lock().take() {
                handle.abort();
            }
        }
        self.ctx.maps.release(self.view_id);

        info!(view = %self.view_id, trip = %self.options.trip_id, "Tracking session disposed");
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn trip_id(&self) -> &TripId {
        &self.options.trip_id
    }

    pub fn role(&self) -> Role {
        self.options.role
    }

    /// Whether the driver's position is being published.
    pub fn is_tracking(&self) -> bool {
        self.publisher
            .as_ref()
            .is_some_and(LocationPublisher::is_tracking)
    }

    /// Latest known driver position.
    pub fn latest_driver_position(&self) -> Option<Position> {
        self.subscriber.latest()
    }

    /// Latest captured position of this device.
    pub fn latest_own_position(&self) -> Option<Position> {
        *self.own_position.borrow()
    }

    /// Receiver notified on every driver position change.
    pub fn driver_updates(&self) -> watch::Receiver<Option<Position>> {
        self.subscriber.watch()
    }

    pub fn status(&self) -> TrackingStatus {
        match self.subscriber.latest() {
            Some(_) => TrackingStatus::Live,
            None => TrackingStatus::AwaitingDriver,
        }
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        let latest_driver_position = self.subscriber.latest();
        TrackingSnapshot {
            view_id: self.view_id,
            trip_id: self.options.trip_id.clone(),
            role: self.options.role,
            tracking_enabled: self.is_tracking(),
            latest_driver_position,
            latest_own_position: self.latest_own_position(),
            status: if latest_driver_position.is_some() {
                TrackingStatus::Live
            } else {
                TrackingStatus::AwaitingDriver
            },
        }
    }

    /// Live timers owned by this session: the publish schedule and the
    /// own-position refresh.
    pub fn pending_timers(&self) -> usize {
        let publish = self
            .publisher
            .as_ref()
            .map_or(0, LocationPublisher::pending_timers);
        let refresh = self.refresh_enabled
            && !self.cancellation.is_cancelled()
            && self
                .own_position_task
                .lock()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished());
        publish + usize::from(refresh)
    }

    /// Open change feeds owned by this session.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriber.active_subscriptions()
    }

    /// Publisher counters, for driver sessions.
    pub fn publisher_stats(&self) -> Option<PublisherStatsSnapshot> {
        self.publisher.as_ref().map(LocationPublisher::stats)
    }

    /// Renderer drawing this view.
    pub fn renderer(&self) -> &SharedRenderer {
        &self.renderer
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Moves the driver marker whenever the subscriber's position changes.
struct RenderTask {
    updates: watch::Receiver<Option<Position>>,
    renderer: SharedRenderer,
    label: Option<String>,
    cancellation: CancellationToken,
}

impl RenderTask {
    async fn run(mut self) {
        loop {
            let current = *self.updates.borrow_and_update();
            if let Some(position) = current {
                let drawn = self
                    .renderer
                    .lock()
                    .upsert_driver_marker(&position, self.label.as_deref());
                if let Err(e) = drawn {
                    debug!(error = %e, "Driver marker not drawn");
                }
            }

            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => break,
                changed = self.updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Captures this device's position once, then optionally keeps refreshing it.
struct OwnPositionTask {
    view_id: ViewId,
    geolocator: Arc<Geolocator>,
    notifier: Arc<dyn Notifier>,
    sink: Arc<watch::Sender<Option<Position>>>,
    /// Viewer marker slot and its label; `None` for drivers.
    marker: Option<(SharedRenderer, Option<String>)>,
    first: PositionOptions,
    refresh: Option<(Duration, PositionOptions)>,
    cancellation: CancellationToken,
}

impl OwnPositionTask {
    async fn run(self) {
        let first = tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return,
            result = self.geolocator.current_position(&self.first) => result,
        };
        match first {
            Ok(position) => self.apply(position),
            Err(err) => {
                self.report(&err);
                if err.is_terminal() {
                    return;
                }
            }
        }

        let Some((period, options)) = self.refresh else {
            return;
        };
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return,
            _ = tokio::time::sleep(period) => {}
        }

        let mut positions = Box::pin(watch_positions(
            Arc::clone(&self.geolocator),
            period,
            options,
            self.cancellation.clone(),
        ));
        while let Some(result) = positions.next().await {
            match result {
                Ok(position) => self.apply(position),
                Err(err) => {
                    debug!(view = %self.view_id, error = %err, "Own position refresh failed")
                }
            }
        }
        debug!(view = %self.view_id, "Own position refresh ended");
    }

    fn apply(&self, position: Position) {
        if self.cancellation.is_cancelled() {
            return;
        }
        self.sink.send_replace(Some(position));
        if let Some((renderer, label)) = &self.marker {
            let drawn = renderer.lock().upsert_viewer_marker(&position, label.as_deref());
            if let Err(e) = drawn {
                debug!(view = %self.view_id, error = %e, "Viewer marker not drawn");
            }
        }
    }

    fn report(&self, err: &GeolocationError) {
        warn!(view = %self.view_id, error = %err, "Could not capture own position");
        self.notifier
            .notify(Notice::warning("Could not get your location", err.to_string()));
    }
}
