//! Identifier and role types shared across modules.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a scheduled trip.
    TripId
);

string_id!(
    /// Internal (profile) identifier of a user, as opposed to the auth id.
    UserId
);

string_id!(
    /// Identifier of a passenger's booking on a trip.
    BookingId
);

/// Identity of one mounted tracking view.
///
/// Views are allocated from a process-wide counter so two panels showing
/// the same trip still get independent map instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);

impl ViewId {
    /// Allocate a fresh view identity.
    pub fn next() -> Self {
        Self(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view-{}", self.0)
    }
}

/// Role of the user in a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The trip's driver: may publish their position.
    Driver,
    /// Anyone following the driver (usually a passenger).
    Viewer,
}

impl Role {
    /// Whether this role publishes positions.
    pub fn is_driver(&self) -> bool {
        matches!(self, Role::Driver)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Driver => f.write_str("driver"),
            Role::Viewer => f.write_str("viewer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_ids_are_unique() {
        let a = ViewId::next();
        let b = ViewId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_string_id_display_and_serde() {
        let trip = TripId::new("trip-42");
        assert_eq!(trip.to_string(), "trip-42");
        assert_eq!(serde_json::to_string(&trip).unwrap(), "\"trip-42\"");
        let parsed: TripId = serde_json::from_str("\"trip-42\"").unwrap();
        assert_eq!(parsed, trip);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Driver.to_string(), "driver");
        assert!(Role::Driver.is_driver());
        assert!(!Role::Viewer.is_driver());
    }
}
