//! Tracking schedule for one trip.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::geolocation::{Geolocator, PositionOptions};
use crate::notify::Notifier;
use crate::position::Position;
use crate::store::{AccountService, LocationStore};
use crate::types::TripId;

use super::cycle::{run_cycle, CycleContext};
use super::PublisherStatsSnapshot;

/// Default time between publish cycles.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest accepted time between publish cycles.
pub const MIN_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Publisher configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublisherConfig {
    /// Time between cycles. The first cycle runs immediately.
    pub interval: Duration,
    /// Options for the immediate first capture.
    pub first_capture: PositionOptions,
    /// Options for every later capture.
    pub cycle_capture: PositionOptions,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PUBLISH_INTERVAL,
            first_capture: PositionOptions::one_shot(),
            cycle_capture: PositionOptions::periodic(),
        }
    }
}

impl PublisherConfig {
    /// Set the time between cycles, raised to [`MIN_PUBLISH_INTERVAL`] if shorter.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_PUBLISH_INTERVAL);
        self
    }

    /// Use the same position timeout for every capture.
    pub fn with_position_timeout(mut self, timeout: Duration) -> Self {
        self.first_capture = self.first_capture.with_timeout(timeout);
        self.cycle_capture = self.cycle_capture.with_timeout(timeout);
        self
    }
}

struct Schedule {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl Schedule {
    /// A schedule stops on its own after a terminal position error.
    fn is_running(&self) -> bool {
        !self.cancellation.is_cancelled() && !self.handle.is_finished()
    }
}

/// Periodically publishes the driver's position for one trip.
///
/// At most one schedule is active per publisher. Starting an active
/// publisher is a no-op; stopping an idle one is harmless.
///
/// # Example
///
/// ```ignore
/// let publisher = LocationPublisher::new(
///     trip_id,
///     geolocator,
///     store,
///     account,
///     notifier,
///     PublisherConfig::default(),
/// );
/// publisher.start_tracking();
/// // ... later
/// publisher.stop_tracking();
/// ```
pub struct LocationPublisher {
    ctx: Arc<CycleContext>,
    config: PublisherConfig,
    schedule: Mutex<Option<Schedule>>,
}

impl LocationPublisher {
    /// Create an idle publisher.
    pub fn new(
        trip_id: TripId,
        geolocator: Arc<Geolocator>,
        store: Arc<dyn LocationStore>,
        account: Arc<dyn AccountService>,
        notifier: Arc<dyn Notifier>,
        config: PublisherConfig,
    ) -> Self {
        Self::build(trip_id, geolocator, store, account, notifier, config, None)
    }

    /// Create an idle publisher that also reports every captured fix to `sink`.
    pub fn with_position_sink(
        trip_id: TripId,
        geolocator: Arc<Geolocator>,
        store: Arc<dyn LocationStore>,
        account: Arc<dyn AccountService>,
        notifier: Arc<dyn Notifier>,
        config: PublisherConfig,
        sink: Arc<watch::Sender<Option<Position>>>,
    ) -> Self {
        Self::build(trip_id, geolocator, store, account, notifier, config, Some(sink))
    }

    fn build(
        trip_id: TripId,
        geolocator: Arc<Geolocator>,
        store: Arc<dyn LocationStore>,
        account: Arc<dyn AccountService>,
        notifier: Arc<dyn Notifier>,
        config: PublisherConfig,
        sink: Option<Arc<watch::Sender<Option<Position>>>>,
    ) -> Self {
        Self {
            ctx: Arc::new(CycleContext::new(
                trip_id, geolocator, store, account, notifier, sink,
            )),
            config,
            schedule: Mutex::new(None),
        }
    }

    /// Trip this publisher writes to.
    pub fn trip_id(&self) -> &TripId {
        &self.ctx.trip_id
    }

    /// Start the publish schedule.
    ///
    /// Runs one cycle immediately and then one per interval. Returns `false`
    /// if a schedule is already running. Starting clears a previous
    /// permission denial so the user is prompted again.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_tracking(&self) -> bool {
        let mut schedule = self.schedule.lock();
        if schedule.as_ref().is_some_and(Schedule::is_running) {
            debug!(trip = %self.ctx.trip_id, "Tracking already active");
            return false;
        }
        if let Some(stale) = schedule.take() {
            stale.cancellation.cancel();
        }

        self.ctx.geolocator.reset_permission();
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.ctx),
            self.config,
            cancellation.clone(),
        ));
        *schedule = Some(Schedule {
            cancellation,
            handle,
        });

        info!(
            trip = %self.ctx.trip_id,
            interval_secs = self.config.interval.as_secs(),
            "Location tracking started"
        );
        true
    }

    /// Stop the publish schedule.
    ///
    /// Cycles still in flight discard their result. Returns `false` if no
    /// schedule was running.
    pub fn stop_tracking(&self) -> bool {
        let Some(schedule) = self.schedule.lock().take() else {
            return false;
        };
        let was_running = schedule.is_running();
        schedule.cancellation.cancel();
        if was_running {
            info!(trip = %self.ctx.trip_id, "Location tracking stopped");
        }
        was_running
    }

    /// Whether a schedule is currently running.
    pub fn is_tracking(&self) -> bool {
        self.pending_timers() > 0
    }

    /// Number of live publish timers (0 or 1).
    pub fn pending_timers(&self) -> usize {
        self.schedule
            .lock()
            .as_ref()
            .map_or(0, |schedule| usize::from(schedule.is_running()))
    }

    /// Counters for this publisher.
    pub fn stats(&self) -> PublisherStatsSnapshot {
        self.ctx.stats.snapshot()
    }
}

impl Drop for LocationPublisher {
    fn drop(&mut self) {
        if let Some(schedule) = self.schedule.get_mut().take() {
            schedule.cancellation.cancel();
        }
    }
}

async fn run_schedule(
    ctx: Arc<CycleContext>,
    config: PublisherConfig,
    cancellation: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval.max(MIN_PUBLISH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first = true;

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                debug!(trip = %ctx.trip_id, "Publish schedule ended");
                break;
            }

            _ = ticker.tick() => {
                let options = if first {
                    config.first_capture
                } else {
                    config.cycle_capture
                };
                first = false;
                let cycle = ctx.next_cycle();
                tokio::spawn(run_cycle(
                    Arc::clone(&ctx),
                    cycle,
                    options,
                    cancellation.clone(),
                ));
            }
        }
    }
}
