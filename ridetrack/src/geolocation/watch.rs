//! Periodic position watch as a stream.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::position::Position;

use super::{GeolocationError, Geolocator, PositionOptions};

/// Shortest accepted watch period.
const MIN_WATCH_PERIOD: Duration = Duration::from_millis(100);

struct WatchState {
    geolocator: Arc<Geolocator>,
    period: Duration,
    options: PositionOptions,
    cancellation: CancellationToken,
    ticker: Option<Interval>,
    finished: bool,
}

/// Watch the device position at a fixed interval.
///
/// The returned stream is lazy: no timer is armed and no read is made until
/// it is first polled. It yields one item per tick (the first immediately)
/// and ends when `cancellation` fires or right after yielding a terminal
/// error (permission denied, unsupported). A read still in flight when the
/// token fires is abandoned and its result never yielded.
///
/// Calling this again gives a new, independent watch.
pub fn watch_positions(
    geolocator: Arc<Geolocator>,
    period: Duration,
    options: PositionOptions,
    cancellation: CancellationToken,
) -> impl Stream<Item = Result<Position, GeolocationError>> + Send {
    let state = WatchState {
        geolocator,
        period: period.max(MIN_WATCH_PERIOD),
        options,
        cancellation,
        ticker: None,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished || state.cancellation.is_cancelled() {
            return None;
        }

        let period = state.period;
        let ticker = state.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tokio::select! {
            biased;
            _ = state.cancellation.cancelled() => return None,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = state.cancellation.cancelled() => return None,
            result = state.geolocator.current_position(&state.options) => result,
        };

        if let Err(err) = &result {
            if err.is_terminal() {
                state.finished = true;
            }
        }

        Some((result, state))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocation::{ScriptStep, ScriptedGeolocation};
    use futures::StreamExt;

    fn geolocator(steps: Vec<ScriptStep>) -> (Arc<Geolocator>, Arc<ScriptedGeolocation>) {
        let source = Arc::new(ScriptedGeolocation::new(steps));
        (Arc::new(Geolocator::new(source.clone())), source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_is_lazy() {
        let (geo, source) = geolocator(vec![ScriptStep::Fix(1.0, 1.0)]);
        let watch = watch_positions(
            geo,
            Duration::from_secs(5),
            PositionOptions::periodic(),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.requests(), 0);
        drop(watch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_yields_per_tick() {
        let (geo, _) = geolocator(vec![
            ScriptStep::Fix(1.0, 1.0),
            ScriptStep::Fix(2.0, 2.0),
            ScriptStep::Fix(3.0, 3.0),
        ]);
        let start = tokio::time::Instant::now();
        let watch = watch_positions(
            geo,
            Duration::from_secs(5),
            PositionOptions::periodic(),
            CancellationToken::new(),
        );

        let fixes: Vec<_> = watch.take(3).collect().await;
        let latitudes: Vec<f64> = fixes.iter().map(|r| r.as_ref().unwrap().latitude).collect();
        assert_eq!(latitudes, vec![1.0, 2.0, 3.0]);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_ends_on_cancellation() {
        let (geo, _) = geolocator(vec![ScriptStep::Fix(1.0, 1.0)]);
        let token = CancellationToken::new();
        let mut watch = Box::pin(watch_positions(
            geo,
            Duration::from_secs(5),
            PositionOptions::periodic(),
            token.clone(),
        ));

        assert!(watch.next().await.is_some());
        token.cancel();
        assert!(watch.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_ends_after_terminal_error() {
        let (geo, source) = geolocator(vec![
            ScriptStep::Fix(1.0, 1.0),
            ScriptStep::Fail(GeolocationError::PermissionDenied),
            ScriptStep::Fix(2.0, 2.0),
        ]);
        let watch = watch_positions(
            geo,
            Duration::from_secs(5),
            PositionOptions::periodic(),
            CancellationToken::new(),
        );

        let items: Vec<_> = watch.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], Err(GeolocationError::PermissionDenied));
        assert_eq!(source.requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_do_not_end_watch() {
        let (geo, _) = geolocator(vec![
            ScriptStep::Hang,
            ScriptStep::Fix(2.0, 2.0),
        ]);
        let watch = watch_positions(
            geo,
            Duration::from_secs(30),
            PositionOptions::periodic(),
            CancellationToken::new(),
        );

        let items: Vec<_> = watch.take(2).collect().await;
        assert!(matches!(items[0], Err(GeolocationError::Timeout(_))));
        assert_eq!(items[1].as_ref().unwrap().latitude, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_restartable() {
        let (geo, source) = geolocator(vec![ScriptStep::Fix(1.0, 1.0)]);
        let first = watch_positions(
            geo.clone(),
            Duration::from_secs(5),
            PositionOptions::periodic(),
            CancellationToken::new(),
        );
        assert_eq!(first.take(1).count().await, 1);

        let second = watch_positions(
            geo,
            Duration::from_secs(5),
            PositionOptions::periodic(),
            CancellationToken::new(),
        );
        assert_eq!(second.take(2).count().await, 2);
        assert_eq!(source.requests(), 3);
    }
}
