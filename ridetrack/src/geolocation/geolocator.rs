//! Position reads with timeout, fix caching and a permission latch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::position::Position;

use super::{GeolocationError, GeolocationSource, PositionOptions};

/// A fix together with the monotonic instant it was obtained.
#[derive(Debug, Clone, Copy)]
struct CachedFix {
    position: Position,
    obtained: Instant,
}

/// Read policy in front of a [`GeolocationSource`].
///
/// One geolocator is shared by everything in a tracking session that needs
/// the device position, so a fix captured for the map can satisfy the
/// publisher's first read and vice versa.
pub struct Geolocator {
    source: Arc<dyn GeolocationSource>,
    last_fix: Mutex<Option<CachedFix>>,
    denied: AtomicBool,
    platform_requests: AtomicU64,
}

impl std::fmt::Debug for Geolocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geolocator")
            .field("last_fix", &self.last_fix)
            .field("denied", &self.denied)
            .finish_non_exhaustive()
    }
}

impl Geolocator {
    /// Create a geolocator over the given platform source.
    pub fn new(source: Arc<dyn GeolocationSource>) -> Self {
        Self {
            source,
            last_fix: Mutex::new(None),
            denied: AtomicBool::new(false),
            platform_requests: AtomicU64::new(0),
        }
    }

    /// Read the current position.
    ///
    /// Order of checks:
    /// 1. unsupported platform → [`GeolocationError::Unsupported`]
    /// 2. latched denial → [`GeolocationError::PermissionDenied`] without prompting
    /// 3. cached fix younger than `maximum_age` → returned as is
    /// 4. platform read bounded by `timeout`
    pub async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, GeolocationError> {
        if !self.source.is_supported() {
            return Err(GeolocationError::Unsupported);
        }
        if self.denied.load(Ordering::Acquire) {
            return Err(GeolocationError::PermissionDenied);
        }
        if let Some(cached) = self.cached_fix(options) {
            debug!(position = %cached, "Serving cached position fix");
            return Ok(cached);
        }

        self.platform_requests.fetch_add(1, Ordering::Relaxed);
        let result =
            match tokio::time::timeout(options.timeout, self.source.request_position(options)).await
            {
                Ok(result) => result,
                Err(_) => Err(GeolocationError::Timeout(options.timeout)),
            };

        match &result {
            Ok(position) if !position.is_valid() => {
                warn!(position = %position, "Platform returned out-of-range coordinates");
                return Err(GeolocationError::PositionUnavailable(
                    "coordinates out of range".to_string(),
                ));
            }
            Ok(position) => {
                *self.last_fix.lock() = Some(CachedFix {
                    position: *position,
                    obtained: Instant::now(),
                });
            }
            Err(GeolocationError::PermissionDenied) => {
                warn!("Location permission denied; further reads blocked until restart");
                self.denied.store(true, Ordering::Release);
            }
            Err(_) => {}
        }

        result
    }

    /// Clear a latched permission denial.
    ///
    /// Only called from an explicit user action (starting tracking again).
    pub fn reset_permission(&self) {
        if self.denied.swap(false, Ordering::AcqRel) {
            debug!("Location permission latch cleared");
        }
    }

    /// Whether a permission denial is currently latched.
    pub fn is_denied(&self) -> bool {
        self.denied.load(Ordering::Acquire)
    }

    /// The most recent successful fix, regardless of age.
    pub fn last_fix(&self) -> Option<Position> {
        self.last_fix.lock().map(|fix| fix.position)
    }

    /// Number of reads that reached the platform (cache hits excluded).
    pub fn platform_requests(&self) -> u64 {
        self.platform_requests.load(Ordering::Relaxed)
    }

    fn cached_fix(&self, options: &PositionOptions) -> Option<Position> {
        if options.maximum_age.is_zero() {
            return None;
        }
        let guard = self.last_fix.lock();
        let fix = guard.as_ref()?;
        (fix.obtained.elapsed() <= options.maximum_age).then_some(fix.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocation::{ScriptStep, ScriptedGeolocation};
    use std::time::Duration;

    fn geolocator(steps: Vec<ScriptStep>) -> (Geolocator, Arc<ScriptedGeolocation>) {
        let source = Arc::new(ScriptedGeolocation::new(steps));
        (Geolocator::new(source.clone()), source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_applied_to_hanging_source() {
        let (geo, _) = geolocator(vec![ScriptStep::Hang]);
        let result = geo.current_position(&PositionOptions::one_shot()).await;
        assert_eq!(result, Err(GeolocationError::Timeout(Duration::from_secs(10))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_fix_within_maximum_age() {
        let (geo, source) = geolocator(vec![
            ScriptStep::Fix(33.97, -6.85),
            ScriptStep::Fix(34.00, -6.80),
        ]);
        let options = PositionOptions::one_shot();

        let first = geo.current_position(&options).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        let second = geo.current_position(&options).await.unwrap();

        assert!(first.same_place(&second));
        assert_eq!(source.requests(), 1);
        assert_eq!(geo.platform_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cache_triggers_fresh_read() {
        let (geo, _) = geolocator(vec![
            ScriptStep::Fix(33.97, -6.85),
            ScriptStep::Fix(34.00, -6.80),
        ]);
        let options = PositionOptions::one_shot();

        geo.current_position(&options).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        let second = geo.current_position(&options).await.unwrap();

        assert_eq!(second.latitude, 34.00);
    }

    #[tokio::test]
    async fn test_periodic_reads_bypass_cache() {
        let (geo, source) = geolocator(vec![
            ScriptStep::Fix(33.97, -6.85),
            ScriptStep::Fix(34.00, -6.80),
        ]);
        geo.current_position(&PositionOptions::one_shot()).await.unwrap();
        let fresh = geo
            .current_position(&PositionOptions::periodic())
            .await
            .unwrap();
        assert_eq!(fresh.latitude, 34.00);
        assert_eq!(source.requests(), 2);
    }

    #[tokio::test]
    async fn test_permission_denial_latches_until_reset() {
        let (geo, source) = geolocator(vec![
            ScriptStep::Fail(GeolocationError::PermissionDenied),
            ScriptStep::Fix(33.97, -6.85),
        ]);
        let options = PositionOptions::periodic();

        assert_eq!(
            geo.current_position(&options).await,
            Err(GeolocationError::PermissionDenied)
        );
        // Denied again without prompting the platform
        assert_eq!(
            geo.current_position(&options).await,
            Err(GeolocationError::PermissionDenied)
        );
        assert_eq!(source.requests(), 1);
        assert!(geo.is_denied());

        geo.reset_permission();
        assert!(geo.current_position(&options).await.is_ok());
        assert_eq!(source.requests(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let source = Arc::new(ScriptedGeolocation::unsupported());
        let geo = Geolocator::new(source.clone());
        assert_eq!(
            geo.current_position(&PositionOptions::one_shot()).await,
            Err(GeolocationError::Unsupported)
        );
        assert_eq!(source.requests(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_fix_rejected() {
        let (geo, _) = geolocator(vec![ScriptStep::Fix(120.0, 0.0)]);
        let result = geo.current_position(&PositionOptions::periodic()).await;
        assert!(matches!(result, Err(GeolocationError::PositionUnavailable(_))));
        assert!(geo.last_fix().is_none());
    }
}
