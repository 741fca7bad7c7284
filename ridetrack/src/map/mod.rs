//! Map rendering.
//!
//! One map surface per mounted view, owned by a [`MapRenderer`]. Renderers
//! live in a [`MapArena`] keyed by [`crate::ViewId`], so two tracking views
//! open side by side never share a map.
//!
//! # Marker slots
//!
//! A renderer owns at most one driver marker and one viewer marker. Each
//! upsert removes the slot's previous marker before adding the new one:
//!
//! ```text
//! upsert_driver_marker(p2)
//!   ├── remove_marker(driver slot)      (if any)
//!   ├── add_marker(driver @ p2)         → driver slot
//!   └── set_view(p2)                    (driver only)
//! ```

mod arena;
mod error;
mod headless;
mod renderer;
mod surface;

pub use arena::{MapArena, SharedRenderer};
pub use error::MapError;
pub use headless::{HeadlessMap, HeadlessMapFactory, HeadlessMapState};
pub use renderer::MapRenderer;
pub use surface::{
    LatLng, MapConfig, MapContainer, MapSurface, MapSurfaceFactory, MarkerId, MarkerKind,
    MarkerSpec, Popup, DEFAULT_ATTRIBUTION, DEFAULT_CENTER, DEFAULT_TILE_URL, DEFAULT_ZOOM,
};
