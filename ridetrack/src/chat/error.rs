use thiserror::Error;

use crate::store::StoreError;
use crate::types::{BookingId, UserId};

/// Errors from opening or using a chat session.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat store error: {0}")]
    Store(#[from] StoreError),

    #[error("sign in to use chat")]
    NotSignedIn,

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("user {user_id} is not part of booking {booking_id}")]
    NotParticipant {
        booking_id: BookingId,
        user_id: UserId,
    },

    #[error("chat session closed")]
    Closed,
}
