//! Chat persistence seam and in-memory implementation.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::trace;

use crate::store::{FeedHub, FeedSubscription, StoreError, SubscriptionId};
use crate::types::{BoxFuture, BookingId};

use super::{BookingParticipants, ChatMessage, NewMessage};

/// Subscription to new messages of one booking.
pub type MessageFeed = FeedSubscription<BookingId, ChatMessage>;

/// Message storage with a per-booking insert feed.
pub trait ChatStore: Send + Sync {
    /// Driver and passenger of a booking, if it exists.
    fn booking_participants(
        &self,
        booking_id: &BookingId,
    ) -> BoxFuture<'_, Result<Option<BookingParticipants>, StoreError>>;

    /// Stored messages of a booking, oldest first.
    fn fetch_messages(
        &self,
        booking_id: &BookingId,
    ) -> BoxFuture<'_, Result<Vec<ChatMessage>, StoreError>>;

    /// Store a message and notify the booking's subscribers.
    fn send_message(&self, message: NewMessage)
        -> BoxFuture<'_, Result<ChatMessage, StoreError>>;

    /// Open an insert feed for a booking.
    fn subscribe_messages(
        &self,
        booking_id: &BookingId,
    ) -> BoxFuture<'_, Result<MessageFeed, StoreError>>;

    fn unsubscribe(&self, id: SubscriptionId);

    fn active_subscriptions(&self) -> usize;
}

#[derive(Default)]
struct ChatState {
    bookings: HashMap<BookingId, BookingParticipants>,
    messages: HashMap<BookingId, Vec<ChatMessage>>,
    next_id: u64,
    failing_sends: u32,
}

/// Chat store backed by process memory.
#[derive(Default)]
pub struct MemoryChatStore {
    state: Mutex<ChatState>,
    feed: FeedHub<BookingId, ChatMessage>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a booking and its participants.
    pub fn add_booking(&self, participants: BookingParticipants) {
        self.state
            .lock()
            .bookings
            .insert(participants.booking_id.clone(), participants);
    }

    /// Make the next `count` sends fail.
    pub fn fail_next_sends(&self, count: u32) {
        self.state.lock().failing_sends = count;
    }

    /// Drop every open message feed of a booking, as a backend disconnect would.
    pub fn drop_feeds(&self, booking_id: &BookingId) -> usize {
        self.feed.drop_key(booking_id)
    }
}

impl ChatStore for MemoryChatStore {
    fn booking_participants(
        &self,
        booking_id: &BookingId,
    ) -> BoxFuture<'_, Result<Option<BookingParticipants>, StoreError>> {
        let participants = self.state.lock().bookings.get(booking_id).cloned();
        Box::pin(async move { Ok(participants) })
    }

    fn fetch_messages(
        &self,
        booking_id: &BookingId,
    ) -> BoxFuture<'_, Result<Vec<ChatMessage>, StoreError>> {
        let messages = self
            .state
            .lock()
            .messages
            .get(booking_id)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(messages) })
    }

    fn send_message(&self, message: NewMessage) -> BoxFuture<'_, Result<ChatMessage, StoreError>> {
        Box::pin(async move {
            let stored = {
                let mut state = self.state.lock();
                if state.failing_sends > 0 {
                    state.failing_sends -= 1;
                    return Err(StoreError::WriteFailed("injected send failure".to_string()));
                }
                state.next_id += 1;
                let stored = ChatMessage {
                    id: state.next_id,
                    booking_id: message.booking_id,
                    sender_id: message.sender_id,
                    content: message.content,
                    created_at: Utc::now(),
                };
                state
                    .messages
                    .entry(stored.booking_id.clone())
                    .or_default()
                    .push(stored.clone());
                stored
            };
            let delivered = self.feed.publish(&stored.booking_id, stored.clone());
            trace!(
                booking = %stored.booking_id,
                id = stored.id,
                delivered,
                "Chat message stored"
            );
            Ok(stored)
        })
    }

    fn subscribe_messages(
        &self,
        booking_id: &BookingId,
    ) -> BoxFuture<'_, Result<MessageFeed, StoreError>> {
        let feed = self.feed.subscribe(booking_id.clone());
        Box::pin(async move { Ok(feed) })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.feed.unsubscribe(id);
    }

    fn active_subscriptions(&self) -> usize {
        self.feed.active()
    }
}
