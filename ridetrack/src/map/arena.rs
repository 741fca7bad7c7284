//! Map renderers keyed by view identity.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::types::ViewId;

use super::{MapConfig, MapContainer, MapError, MapRenderer, MapSurfaceFactory};

/// A renderer shared between a session and its render task.
pub type SharedRenderer = Arc<Mutex<MapRenderer>>;

/// Owns one [`MapRenderer`] per mounted view.
///
/// Views never share a surface: two panels tracking the same trip get two
/// renderers and two maps.
pub struct MapArena {
    factory: Arc<dyn MapSurfaceFactory>,
    config: MapConfig,
    renderers: DashMap<ViewId, SharedRenderer>,
}

impl MapArena {
    /// Create an arena that builds surfaces with `factory`.
    pub fn new(factory: Arc<dyn MapSurfaceFactory>, config: MapConfig) -> Self {
        Self {
            factory,
            config,
            renderers: DashMap::new(),
        }
    }

    /// Get or create the view's renderer and make sure its map is mounted.
    ///
    /// If mounting fails the view is left without a renderer.
    pub fn mount(
        &self,
        view_id: ViewId,
        container: &MapContainer,
    ) -> Result<SharedRenderer, MapError> {
        let renderer = self
            .renderers
            .entry(view_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(MapRenderer::new(
                    view_id,
                    Arc::clone(&self.factory),
                    self.config.clone(),
                )))
            })
            .clone();

        let mounted = renderer.lock().ensure_map_mounted(container);
        if let Err(e) = mounted {
            self.renderers.remove(&view_id);
            return Err(e);
        }
        Ok(renderer)
    }

    /// The view's renderer, if mounted.
    pub fn get(&self, view_id: ViewId) -> Option<SharedRenderer> {
        self.renderers
            .get(&view_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Tear down and forget the view's renderer. Idempotent.
    pub fn release(&self, view_id: ViewId) -> bool {
        match self.renderers.remove(&view_id) {
            Some((_, renderer)) => {
                renderer.lock().teardown();
                debug!(view = %view_id, "Map released");
                true
            }
            None => false,
        }
    }

    /// Number of views holding a renderer.
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Whether no view holds a renderer.
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Base map settings used for new surfaces.
    pub fn config(&self) -> &MapConfig {
        &self.config
    }
}
