//! Simulate command - a driver shares their location with one passenger.
//!
//! Both sides run against the in-memory backend and headless maps. The
//! driver moves along a straight line; every change the passenger's view
//! receives is printed.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ridetrack::config::{ConfigFile, TrackingConfig};
use ridetrack::geolocation::{Geolocator, ScriptedGeolocation, SimulatedRoute};
use ridetrack::logging::{init_logging, LoggingConfig};
use ridetrack::map::{HeadlessMapFactory, MapArena, MapContainer, MarkerKind};
use ridetrack::notify::{Notifier, TracingNotifier};
use ridetrack::session::{SessionOptions, TrackingContext, TrackingSession};
use ridetrack::store::{CurrentUser, MemoryLocationStore, StaticAccount};
use ridetrack::Role;

use crate::error::CliError;

const VIEWER_CONTAINER: &str = "passenger-map";

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Trip identifier
    #[arg(long, default_value = "trip-demo")]
    pub trip: String,

    /// Route start as "lat,lon"
    #[arg(long, value_parser = parse_coordinate, default_value = "33.9716,-6.8498")]
    pub from: (f64, f64),

    /// Route end as "lat,lon"
    #[arg(long, value_parser = parse_coordinate, default_value = "33.5731,-7.5898")]
    pub to: (f64, f64),

    /// Number of fixes between start and end
    #[arg(long, default_value_t = 20)]
    pub steps: u32,

    /// Seconds between published positions (overrides config)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Name shown on the driver marker
    #[arg(long, default_value = "Driver")]
    pub driver_name: String,

    /// Log level (overrides config; RUST_LOG takes precedence)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Parse "lat,lon" into a coordinate pair.
fn parse_coordinate(value: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got \"{}\"", value))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude \"{}\"", lat))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude \"{}\"", lon))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("coordinates out of range: {}, {}", lat, lon));
    }
    Ok((lat, lon))
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    let mut logging = LoggingConfig::from(&config.logging);
    if let Some(level) = &args.log_level {
        logging = logging.with_level(level.clone());
    }
    let _log_guard = init_logging(&logging)?;

    let mut tracking = TrackingConfig::from_config_file(&config);
    if let Some(secs) = args.interval {
        let publisher = tracking.publisher.with_interval(Duration::from_secs(secs.max(1)));
        tracking = tracking.with_publisher(publisher);
    }

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping simulation...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(simulate(args, tracking, shutdown))
}

async fn simulate(
    args: SimulateArgs,
    tracking: TrackingConfig,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let store = Arc::new(MemoryLocationStore::new());
    let factory = Arc::new(HeadlessMapFactory::new());
    let maps = Arc::new(MapArena::new(factory.clone(), tracking.map.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

    let driver_account =
        CurrentUser::new("sim-driver", "driver-1").with_display_name(&args.driver_name);
    let driver_ctx = TrackingContext::new(
        Arc::new(Geolocator::new(Arc::new(SimulatedRoute::new(args.from, args.to, args.steps)))),
        store.clone(),
        Arc::new(StaticAccount::signed_in(driver_account)),
        notifier.clone(),
        maps.clone(),
    )
    .with_config(tracking.clone());

    // The passenger waits at the pickup point.
    let viewer_ctx = TrackingContext::new(
        Arc::new(Geolocator::new(Arc::new(ScriptedGeolocation::fixed(args.from.0, args.from.1)))),
        store.clone(),
        Arc::new(StaticAccount::signed_in(CurrentUser::new("sim-passenger", "passenger-1"))),
        notifier,
        maps,
    )
    .with_config(tracking.clone());

    let driver = TrackingSession::mount(
        driver_ctx,
        SessionOptions::new(args.trip.as_str(), Role::Driver, MapContainer::new("driver-map"))
            .with_driver_label(&args.driver_name),
    )
    .await?;
    let viewer = TrackingSession::mount(
        viewer_ctx,
        SessionOptions::new(args.trip.as_str(), Role::Viewer, MapContainer::new(VIEWER_CONTAINER))
            .with_driver_label(&args.driver_name)
            .with_viewer_label("Pickup point"),
    )
    .await?;

    println!("Simulating trip {}", args.trip);
    println!(
        "  Route:    {:.4}, {:.4} -> {:.4}, {:.4} in {} steps",
        args.from.0, args.from.1, args.to.0, args.to.1, args.steps
    );
    println!("  Interval: {}s", tracking.publisher.interval.as_secs());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    driver.start_tracking()?;
    info!(trip = %args.trip, "Simulation started");

    let mut updates = viewer.driver_updates();
    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = &mut deadline => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_viewer(&viewer, &factory);
            }
        }
    }

    let stats = driver.publisher_stats().unwrap_or_default();
    driver.dispose();
    viewer.dispose();

    println!();
    println!("Session Summary");
    println!("───────────────");
    println!(
        "  Positions published: {} ({} skipped, {} failed writes)",
        stats.published, stats.skipped, stats.failed_writes
    );
    println!(
        "  After dispose:       {} timers, {} subscriptions",
        driver.pending_timers() + viewer.pending_timers(),
        driver.active_subscriptions() + viewer.active_subscriptions()
    );
    Ok(())
}

fn print_viewer(viewer: &TrackingSession, factory: &HeadlessMapFactory) {
    let snapshot = viewer.snapshot();
    let Some(driver) = snapshot.latest_driver_position else {
        return;
    };
    let markers = factory
        .live_in(&MapContainer::new(VIEWER_CONTAINER))
        .map(|map| map.markers_of(MarkerKind::Driver).len())
        .unwrap_or(0);
    println!(
        "[{}] driver at {} ({} marker{} on passenger map)",
        driver.local_time_label(),
        driver,
        markers,
        if markers == 1 { "" } else { "s" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate("33.97, -6.85"), Ok((33.97, -6.85)));
        assert!(parse_coordinate("33.97").is_err());
        assert!(parse_coordinate("abc,1").is_err());
        assert!(parse_coordinate("95,0").is_err());
    }
}
