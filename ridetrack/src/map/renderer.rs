//! Per-view map renderer with driver and viewer marker slots.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::position::Position;
use crate::types::ViewId;

use super::{
    LatLng, MapConfig, MapContainer, MapError, MapSurface, MapSurfaceFactory, MarkerId,
    MarkerSpec,
};

/// Owns the map surface of one mounted view.
///
/// The surface is created lazily by [`MapRenderer::ensure_map_mounted`] and
/// destroyed by [`MapRenderer::teardown`] (also run on drop).
pub struct MapRenderer {
    view_id: ViewId,
    factory: Arc<dyn MapSurfaceFactory>,
    config: MapConfig,
    surface: Option<Box<dyn MapSurface>>,
    container: Option<MapContainer>,
    driver_marker: Option<MarkerId>,
    viewer_marker: Option<MarkerId>,
}

impl std::fmt::Debug for MapRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapRenderer")
            .field("view_id", &self.view_id)
            .field("container", &self.container)
            .field("mounted", &self.surface.is_some())
            .field("driver_marker", &self.driver_marker)
            .field("viewer_marker", &self.viewer_marker)
            .finish_non_exhaustive()
    }
}

impl MapRenderer {
    /// Create an unmounted renderer for a view.
    pub fn new(view_id: ViewId, factory: Arc<dyn MapSurfaceFactory>, config: MapConfig) -> Self {
        Self {
            view_id,
            factory,
            config,
            surface: None,
            container: None,
            driver_marker: None,
            viewer_marker: None,
        }
    }

    /// Create the map surface if it does not exist yet.
    ///
    /// Returns `true` if a surface was created, `false` if one was already
    /// mounted (the call is then a no-op, whatever container is passed).
    pub fn ensure_map_mounted(&mut self, container: &MapContainer) -> Result<bool, MapError> {
        if self.surface.is_some() {
            if self.container.as_ref() != Some(container) {
                warn!(
                    view = %self.view_id,
                    requested = %container,
                    "Map already mounted in a different container; keeping existing map"
                );
            }
            return Ok(false);
        }

        let mut surface = self.factory.create(container, &self.config)?;
        surface.set_view(self.config.center, self.config.zoom);
        self.surface = Some(surface);
        self.container = Some(container.clone());
        debug!(view = %self.view_id, container = %container, "Map mounted");
        Ok(true)
    }

    /// Replace the driver marker and recenter the map on it.
    pub fn upsert_driver_marker(
        &mut self,
        position: &Position,
        label: Option<&str>,
    ) -> Result<MarkerId, MapError> {
        let surface = self.surface.as_mut().ok_or(MapError::NotMounted)?;
        if let Some(previous) = self.driver_marker.take() {
            surface.remove_marker(previous);
        }
        let id = surface.add_marker(MarkerSpec::driver(position, label));
        self.driver_marker = Some(id);
        surface.set_view(LatLng::from(position), self.config.zoom);
        trace!(view = %self.view_id, position = %position, "Driver marker updated");
        Ok(id)
    }

    /// Replace the viewer marker. Never moves the viewport.
    pub fn upsert_viewer_marker(
        &mut self,
        position: &Position,
        label: Option<&str>,
    ) -> Result<MarkerId, MapError> {
        let surface = self.surface.as_mut().ok_or(MapError::NotMounted)?;
        if let Some(previous) = self.viewer_marker.take() {
            surface.remove_marker(previous);
        }
        let id = surface.add_marker(MarkerSpec::viewer(position, label));
        self.viewer_marker = Some(id);
        trace!(view = %self.view_id, position = %position, "Viewer marker updated");
        Ok(id)
    }

    /// Destroy the surface and forget both markers. Idempotent.
    pub fn teardown(&mut self) {
        self.driver_marker = None;
        self.viewer_marker = None;
        self.container = None;
        if let Some(mut surface) = self.surface.take() {
            surface.destroy();
            debug!(view = %self.view_id, "Map torn down");
        }
    }

    /// Whether a surface is currently mounted.
    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    /// The view this renderer belongs to.
    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    /// Current driver marker handle.
    pub fn driver_marker(&self) -> Option<MarkerId> {
        self.driver_marker
    }

    /// Current viewer marker handle.
    pub fn viewer_marker(&self) -> Option<MarkerId> {
        self.viewer_marker
    }

    /// Number of markers this renderer has placed and not removed.
    pub fn marker_count(&self) -> usize {
        usize::from(self.driver_marker.is_some()) + usize::from(self.viewer_marker.is_some())
    }
}

impl Drop for MapRenderer {
    fn drop(&mut self) {
        self.teardown();
    }
}
