//! Store and feed errors.

use thiserror::Error;

/// Errors reported by the backend store, feed or account service.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write was rejected or could not reach the store.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A read was rejected or could not reach the store.
    #[error("Read failed: {0}")]
    ReadFailed(String),

    /// The change feed could not be opened or was closed by the backend.
    #[error("Subscription dropped: {0}")]
    SubscriptionDropped(String),

    /// A change payload could not be decoded.
    #[error("Invalid change payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::WriteFailed("timeout".into()).to_string(),
            "Write failed: timeout"
        );
        assert_eq!(
            StoreError::SubscriptionDropped("closed".into()).to_string(),
            "Subscription dropped: closed"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::InvalidPayload(_)));
    }
}
