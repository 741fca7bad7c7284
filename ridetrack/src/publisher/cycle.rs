//! One capture-and-publish cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::geolocation::{GeolocationError, Geolocator, PositionOptions};
use crate::notify::{Notice, Notifier};
use crate::position::Position;
use crate::store::{AccountService, LocationStore, LocationUpdate};
use crate::types::TripId;

use super::PublisherStats;

/// Everything a cycle needs, shared by the schedule and all cycle tasks.
pub(crate) struct CycleContext {
    pub trip_id: TripId,
    pub geolocator: Arc<Geolocator>,
    pub store: Arc<dyn LocationStore>,
    pub account: Arc<dyn AccountService>,
    pub notifier: Arc<dyn Notifier>,
    pub stats: PublisherStats,
    pub own_position: Option<Arc<watch::Sender<Option<Position>>>>,
    next_cycle: AtomicU64,
    last_claimed: AtomicU64,
}

impl CycleContext {
    pub fn new(
        trip_id: TripId,
        geolocator: Arc<Geolocator>,
        store: Arc<dyn LocationStore>,
        account: Arc<dyn AccountService>,
        notifier: Arc<dyn Notifier>,
        own_position: Option<Arc<watch::Sender<Option<Position>>>>,
    ) -> Self {
        Self {
            trip_id,
            geolocator,
            store,
            account,
            notifier,
            stats: PublisherStats::new(),
            own_position,
            next_cycle: AtomicU64::new(1),
            last_claimed: AtomicU64::new(0),
        }
    }

    /// Allocate the next cycle number. Numbers keep increasing across restarts.
    pub fn next_cycle(&self) -> u64 {
        self.next_cycle.fetch_add(1, Ordering::Relaxed)
    }

    /// Claim the write slot for `cycle`.
    ///
    /// Fails if a newer cycle already claimed it, so a late position read
    /// never overwrites a fresher one from this publisher.
    fn claim(&self, cycle: u64) -> bool {
        self.last_claimed.fetch_max(cycle, Ordering::AcqRel) < cycle
    }
}

/// Capture the position and publish it, unless cancelled in between.
pub(crate) async fn run_cycle(
    ctx: Arc<CycleContext>,
    cycle: u64,
    options: PositionOptions,
    cancellation: CancellationToken,
) {
    ctx.stats.cycle_started();

    let captured = tokio::select! {
        biased;
        _ = cancellation.cancelled() => {
            ctx.stats.discarded();
            return;
        }
        result = ctx.geolocator.current_position(&options) => result,
    };

    let position = match captured {
        Ok(position) => position,
        Err(err) if err.is_terminal() => {
            ctx.stats.skipped();
            if cancellation.is_cancelled() {
                return;
            }
            error!(trip = %ctx.trip_id, cycle, error = %err, "Location tracking stopped");
            ctx.notifier.notify(terminal_notice(&err));
            cancellation.cancel();
            return;
        }
        Err(err) => {
            ctx.stats.skipped();
            warn!(trip = %ctx.trip_id, cycle, error = %err, "Skipping location publish cycle");
            ctx.notifier
                .notify(Notice::warning("Location update skipped", err.to_string()));
            return;
        }
    };

    if cancellation.is_cancelled() {
        debug!(cycle, "Discarding position captured after tracking stopped");
        ctx.stats.discarded();
        return;
    }
    if let Some(sink) = &ctx.own_position {
        sink.send_replace(Some(position));
    }

    let user = match ctx.account.current_user().await {
        Ok(Some(user)) => user,
        Ok(None) => {
            ctx.stats.skipped();
            warn!(trip = %ctx.trip_id, cycle, "Not signed in; location not published");
            ctx.notifier.notify(Notice::warning(
                "Location not shared",
                "Sign in to share your location",
            ));
            return;
        }
        Err(err) => {
            ctx.stats.skipped();
            warn!(trip = %ctx.trip_id, cycle, error = %err, "Could not resolve current user");
            return;
        }
    };

    if cancellation.is_cancelled() {
        ctx.stats.discarded();
        return;
    }
    if !ctx.claim(cycle) {
        debug!(cycle, "Newer publish cycle already wrote; dropping this one");
        ctx.stats.superseded();
        return;
    }

    let update = LocationUpdate::from_position(ctx.trip_id.clone(), user.user_id, &position);
    match ctx.store.upsert_driver_location(update).await {
        Ok(record) => {
            ctx.stats.published();
            debug!(
                trip = %ctx.trip_id,
                cycle,
                latitude = record.latitude,
                longitude = record.longitude,
                "Driver location published"
            );
        }
        Err(err) => {
            ctx.stats.write_failed();
            warn!(trip = %ctx.trip_id, cycle, error = %err, "Driver location write failed");
            ctx.notifier.notify(Notice::warning(
                "Could not share your location",
                err.to_string(),
            ));
        }
    }
}

fn terminal_notice(err: &GeolocationError) -> Notice {
    match err {
        GeolocationError::Unsupported => Notice::error(
            "Location unavailable",
            "This device does not support geolocation",
        ),
        _ => Notice::error(
            "Location tracking stopped",
            "Location permission was denied. Allow access and start tracking again",
        ),
    }
}
