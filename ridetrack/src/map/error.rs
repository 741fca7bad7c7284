//! Map errors.

use thiserror::Error;

/// Errors from the map renderer or surface factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// A marker operation was attempted before the map was mounted.
    #[error("Map is not mounted")]
    NotMounted,

    /// The container cannot host a map.
    #[error("Invalid map container: {0}")]
    InvalidContainer(String),
}
