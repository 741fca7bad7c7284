//! Map surface that records operations instead of drawing.
//!
//! Used by tests to assert marker reconciliation and by the `simulate`
//! command, which prints the recorded state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    LatLng, MapConfig, MapContainer, MapError, MapSurface, MapSurfaceFactory, MarkerId,
    MarkerKind, MarkerSpec,
};

/// Observable state of one headless map instance.
#[derive(Debug, Clone, Default)]
pub struct HeadlessMapState {
    /// Container the map was created in.
    pub container: Option<MapContainer>,
    /// Tile layer URL template.
    pub tile_url: String,
    /// Markers currently on the map.
    pub markers: BTreeMap<MarkerId, MarkerSpec>,
    /// Current viewport.
    pub view: Option<(LatLng, u8)>,
    /// Total markers ever added.
    pub markers_added: usize,
    /// Total markers removed.
    pub markers_removed: usize,
    /// Whether `destroy` was called.
    pub destroyed: bool,
}

impl HeadlessMapState {
    /// Markers currently on the map in the given slot.
    pub fn markers_of(&self, kind: MarkerKind) -> Vec<&MarkerSpec> {
        self.markers
            .values()
            .filter(|marker| marker.kind == kind)
            .collect()
    }
}

/// Recording map surface.
#[derive(Debug)]
pub struct HeadlessMap {
    state: Arc<Mutex<HeadlessMapState>>,
    next_marker: u64,
}

impl MapSurface for HeadlessMap {
    fn add_marker(&mut self, marker: MarkerSpec) -> MarkerId {
        self.next_marker += 1;
        let id = MarkerId(self.next_marker);
        let mut state = self.state.lock();
        state.markers.insert(id, marker);
        state.markers_added += 1;
        id
    }

    fn remove_marker(&mut self, id: MarkerId) -> bool {
        let mut state = self.state.lock();
        let removed = state.markers.remove(&id).is_some();
        if removed {
            state.markers_removed += 1;
        }
        removed
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.state.lock().view = Some((center, zoom));
    }

    fn destroy(&mut self) {
        let mut state = self.state.lock();
        state.markers.clear();
        state.destroyed = true;
    }
}

/// Factory for [`HeadlessMap`]s that keeps a handle on its instances.
///
/// Destroyed surfaces stay inspectable until the next `create`, which
/// prunes them.
#[derive(Debug, Default)]
pub struct HeadlessMapFactory {
    instances: Mutex<Vec<Arc<Mutex<HeadlessMapState>>>>,
    created: AtomicUsize,
}

impl HeadlessMapFactory {
    /// Create a factory with no instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of surfaces created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of surfaces still held for inspection.
    pub fn retained(&self) -> usize {
        self.instances.lock().len()
    }

    /// Number of created surfaces not yet destroyed.
    pub fn live_instances(&self) -> usize {
        self.instances
            .lock()
            .iter()
            .filter(|state| !state.lock().destroyed)
            .count()
    }

    /// Snapshot of the most recently created surface.
    pub fn latest(&self) -> Option<HeadlessMapState> {
        self.instances
            .lock()
            .last()
            .map(|state| state.lock().clone())
    }

    /// Snapshot of the live surface mounted in `container`, if any.
    pub fn live_in(&self, container: &MapContainer) -> Option<HeadlessMapState> {
        self.instances.lock().iter().rev().find_map(|state| {
            let state = state.lock();
            if !state.destroyed && state.container.as_ref() == Some(container) {
                Some(state.clone())
            } else {
                None
            }
        })
    }
}

impl MapSurfaceFactory for HeadlessMapFactory {
    fn create(
        &self,
        container: &MapContainer,
        config: &MapConfig,
    ) -> Result<Box<dyn MapSurface>, MapError> {
        if container.id().trim().is_empty() {
            return Err(MapError::InvalidContainer(
                "container id is empty".to_string(),
            ));
        }
        let state = Arc::new(Mutex::new(HeadlessMapState {
            container: Some(container.clone()),
            tile_url: config.tile_url.clone(),
            ..HeadlessMapState::default()
        }));
        let mut instances = self.instances.lock();
        instances.retain(|existing| !existing.lock().destroyed);
        instances.push(Arc::clone(&state));
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(HeadlessMap {
            state,
            next_marker: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn test_empty_container_rejected() {
        let factory = HeadlessMapFactory::new();
        let result = factory.create(&MapContainer::new("  "), &MapConfig::default());
        assert!(matches!(result, Err(MapError::InvalidContainer(_))));
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_records_marker_operations() {
        let factory = HeadlessMapFactory::new();
        let mut map = factory
            .create(&MapContainer::new("m"), &MapConfig::default())
            .unwrap();

        let id = map.add_marker(MarkerSpec::driver(&Position::new(1.0, 1.0), None));
        assert!(map.remove_marker(id));
        assert!(!map.remove_marker(id));

        let state = factory.latest().unwrap();
        assert_eq!(state.markers_added, 1);
        assert_eq!(state.markers_removed, 1);
        assert!(state.markers.is_empty());
        assert!(state.tile_url.contains("{z}"));
    }

    #[test]
    fn test_destroyed_surfaces_are_pruned_on_create() {
        let factory = HeadlessMapFactory::new();
        let container = MapContainer::new("m");
        for _ in 0..5 {
            let mut map = factory.create(&container, &MapConfig::default()).unwrap();
            map.destroy();
        }
        assert!(factory.latest().unwrap().destroyed);

        let _live = factory.create(&container, &MapConfig::default()).unwrap();
        assert_eq!(factory.created(), 6);
        assert_eq!(factory.retained(), 1);
        assert_eq!(factory.live_instances(), 1);
    }
}
