use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BookingId, UserId};

/// A stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub booking_id: BookingId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub booking_id: BookingId,
    pub sender_id: UserId,
    pub content: String,
}

/// The two people allowed to chat on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingParticipants {
    pub booking_id: BookingId,
    pub driver_id: UserId,
    pub passenger_id: UserId,
}

impl BookingParticipants {
    pub fn includes(&self, user_id: &UserId) -> bool {
        &self.driver_id == user_id || &self.passenger_id == user_id
    }
}
