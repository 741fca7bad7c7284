//! Positioning sources that do not need a device.
//!
//! - [`ScriptedGeolocation`] replays a queue of outcomes, for tests.
//! - [`SimulatedRoute`] walks a straight line between two points, for the
//!   `simulate` command.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::position::Position;
use crate::types::BoxFuture;

use super::{GeolocationError, GeolocationSource, PositionOptions};

/// One scripted platform response.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Resolve with a fix at these coordinates (captured now).
    Fix(f64, f64),
    /// Resolve with a fix only after the given delay.
    Delayed(f64, f64, Duration),
    /// Resolve with an error.
    Fail(GeolocationError),
    /// Never resolve; exercises the caller's timeout.
    Hang,
}

/// Source replaying a fixed sequence of outcomes.
///
/// Once the script is exhausted the last fix is repeated; if the script never
/// produced a fix, reads fail with `PositionUnavailable`.
#[derive(Debug, Default)]
pub struct ScriptedGeolocation {
    steps: Mutex<VecDeque<ScriptStep>>,
    last_fix: Mutex<Option<(f64, f64)>>,
    requests: AtomicU64,
    unsupported: AtomicBool,
}

impl ScriptedGeolocation {
    /// Create a source with the given script.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A source that always reports the same coordinates.
    pub fn fixed(latitude: f64, longitude: f64) -> Self {
        Self::new([ScriptStep::Fix(latitude, longitude)])
    }

    /// A platform without positioning capability.
    pub fn unsupported() -> Self {
        let source = Self::default();
        source.unsupported.store(true, Ordering::Relaxed);
        source
    }

    /// Append steps to the script.
    pub fn push(&self, step: ScriptStep) {
        self.steps.lock().push_back(step);
    }

    /// Number of reads the source has served.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn next_step(&self) -> ScriptStep {
        let step = self.steps.lock().pop_front();
        match step {
            Some(ScriptStep::Fix(lat, lon)) => {
                *self.last_fix.lock() = Some((lat, lon));
                ScriptStep::Fix(lat, lon)
            }
            Some(ScriptStep::Delayed(lat, lon, delay)) => {
                *self.last_fix.lock() = Some((lat, lon));
                ScriptStep::Delayed(lat, lon, delay)
            }
            Some(other) => other,
            None => match *self.last_fix.lock() {
                Some((lat, lon)) => ScriptStep::Fix(lat, lon),
                None => ScriptStep::Fail(GeolocationError::PositionUnavailable(
                    "no scripted fix".to_string(),
                )),
            },
        }
    }
}

impl GeolocationSource for ScriptedGeolocation {
    fn is_supported(&self) -> bool {
        !self.unsupported.load(Ordering::Relaxed)
    }

    fn request_position(
        &self,
        _options: &PositionOptions,
    ) -> BoxFuture<'_, Result<Position, GeolocationError>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let step = self.next_step();
        Box::pin(async move {
            match step {
                ScriptStep::Fix(lat, lon) => Ok(Position::new(lat, lon)),
                ScriptStep::Delayed(lat, lon, delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Position::new(lat, lon))
                }
                ScriptStep::Fail(err) => Err(err),
                ScriptStep::Hang => futures::future::pending().await,
            }
        })
    }
}

/// Source moving along a straight line from `from` to `to`.
///
/// Each read advances one step; after `steps` reads the position stays at
/// the destination.
#[derive(Debug)]
pub struct SimulatedRoute {
    from: (f64, f64),
    to: (f64, f64),
    steps: u32,
    cursor: AtomicU64,
}

impl SimulatedRoute {
    /// Create a route with `steps` intermediate fixes (at least one).
    pub fn new(from: (f64, f64), to: (f64, f64), steps: u32) -> Self {
        Self {
            from,
            to,
            steps: steps.max(1),
            cursor: AtomicU64::new(0),
        }
    }

    /// Coordinates at the given step, clamped to the destination.
    pub fn point_at(&self, step: u64) -> (f64, f64) {
        let t = (step.min(self.steps as u64) as f64) / self.steps as f64;
        (
            self.from.0 + (self.to.0 - self.from.0) * t,
            self.from.1 + (self.to.1 - self.from.1) * t,
        )
    }
}

impl GeolocationSource for SimulatedRoute {
    fn request_position(
        &self,
        _options: &PositionOptions,
    ) -> BoxFuture<'_, Result<Position, GeolocationError>> {
        let step = self.cursor.fetch_add(1, Ordering::Relaxed);
        let (lat, lon) = self.point_at(step);
        Box::pin(async move { Ok(Position::new(lat, lon)) })
    }
}
