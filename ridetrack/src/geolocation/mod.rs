//! Device geolocation.
//!
//! The platform capability is a [`GeolocationSource`]. Callers never use a
//! source directly; they go through a [`Geolocator`], which applies the
//! read policy:
//!
//! - client-side timeout on every read ([`PositionOptions::timeout`])
//! - reuse of a recent fix within [`PositionOptions::maximum_age`]
//! - a permission denial latches until the user explicitly starts again
//!
//! # Example
//!
//! ```ignore
//! use ridetrack::geolocation::{Geolocator, PositionOptions, SimulatedRoute};
//!
//! let route = SimulatedRoute::new((33.97, -6.85), (34.02, -6.83), 20);
//! let geolocator = Geolocator::new(Arc::new(route));
//!
//! let fix = geolocator.current_position(&PositionOptions::one_shot()).await?;
//! ```

mod error;
mod geolocator;
mod scripted;
mod source;
mod watch;

pub use error::GeolocationError;
pub use geolocator::Geolocator;
pub use scripted::{ScriptStep, ScriptedGeolocation, SimulatedRoute};
pub use source::{
    GeolocationSource, PositionOptions, DEFAULT_MAXIMUM_AGE, DEFAULT_POSITION_TIMEOUT,
};
pub use watch::watch_positions;
