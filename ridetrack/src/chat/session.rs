//! Open chat on one booking.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notify::{Notice, Notifier};
use crate::store::{AccountService, CurrentUser, SubscriptionId};
use crate::types::BookingId;

use super::{BookingParticipants, ChatError, ChatMessage, ChatStore, MessageFeed, NewMessage};

/// Messages in arrival order, deduplicated by id.
#[derive(Default)]
struct ChatLog {
    messages: Vec<ChatMessage>,
    seen: HashSet<u64>,
}

impl ChatLog {
    fn push(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

/// A participant's view of a booking's chat.
pub struct ChatSession {
    booking_id: BookingId,
    user: CurrentUser,
    participants: BookingParticipants,
    store: Arc<dyn ChatStore>,
    notifier: Arc<dyn Notifier>,
    log: Arc<Mutex<ChatLog>>,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
    cancellation: CancellationToken,
    closed: AtomicBool,
}

impl ChatSession {
    /// Open the chat for `booking_id` as the signed-in user.
    ///
    /// Loads the history, then follows new messages. Only the booking's
    /// driver and passenger may open it.
    pub async fn open(
        store: Arc<dyn ChatStore>,
        account: &dyn AccountService,
        notifier: Arc<dyn Notifier>,
        booking_id: BookingId,
    ) -> Result<Self, ChatError> {
        let user = account.current_user().await?.ok_or(ChatError::NotSignedIn)?;
        let participants = store
            .booking_participants(&booking_id)
            .await?
            .ok_or_else(|| ChatError::BookingNotFound(booking_id.clone()))?;

        if !participants.includes(&user.user_id) {
            warn!(booking = %booking_id, user = %user.user_id, "Chat refused to non-participant");
            notifier.notify(Notice::error(
                "Chat unavailable",
                "Only the driver and passenger of this booking can chat",
            ));
            return Err(ChatError::NotParticipant {
                booking_id,
                user_id: user.user_id,
            });
        }

        // Subscribe first; inserts racing the history read arrive on the feed.
        let feed = store.subscribe_messages(&booking_id).await?;
        let mut history = match store.fetch_messages(&booking_id).await {
            Ok(history) => history,
            Err(err) => {
                store.unsubscribe(feed.id());
                return Err(err.into());
            }
        };
        history.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let mut log = ChatLog::default();
        for message in history {
            log.push(message);
        }

        let session = Self {
            booking_id,
            user,
            participants,
            store,
            notifier,
            log: Arc::new(Mutex::new(log)),
            subscription: Arc::new(Mutex::new(Some(feed.id()))),
            cancellation: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };
        tokio::spawn(follow(
            feed,
            Arc::clone(&session.log),
            Arc::clone(&session.subscription),
            Arc::clone(&session.notifier),
            session.cancellation.clone(),
        ));

        info!(booking = %session.booking_id, "Chat opened");
        Ok(session)
    }

    /// Send a message. Blank input is ignored.
    ///
    /// Returns the stored message, or `None` for blank input.
    pub async fn send(&self, content: &str) -> Result<Option<ChatMessage>, ChatError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChatError::Closed);
        }
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let message = NewMessage {
            booking_id: self.booking_id.clone(),
            sender_id: self.user.user_id.clone(),
            content: content.to_string(),
        };
        match self.store.send_message(message).await {
            Ok(stored) => {
                self.log.lock().push(stored.clone());
                Ok(Some(stored))
            }
            Err(err) => {
                warn!(booking = %self.booking_id, error = %err, "Chat message not sent");
                self.notifier
                    .notify(Notice::error("Message not sent", err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Messages received so far, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.lock().messages.clone()
    }

    pub fn booking_id(&self) -> &BookingId {
        &self.booking_id
    }

    pub fn participants(&self) -> &BookingParticipants {
        &self.participants
    }

    /// Number of open message feeds held by this session (0 or 1).
    ///
    /// Drops to 0 when the backend ends the feed.
    pub fn active_subscriptions(&self) -> usize {
        usize::from(self.subscription.lock().is_some())
    }

    /// Stop following the booking. Idempotent.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancellation.cancel();
        if let Some(id) = self.subscription.lock().take() {
            self.store.unsubscribe(id);
        }
        debug!(booking = %self.booking_id, "Chat closed");
        true
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn follow(
    mut feed: MessageFeed,
    log: Arc<Mutex<ChatLog>>,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
    notifier: Arc<dyn Notifier>,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            message = feed.next_event() => match message {
                Some(message) => {
                    log.lock().push(message);
                }
                None => {
                    subscription.lock().take();
                    if !cancellation.is_cancelled() {
                        warn!(booking = %feed.key(), "Chat feed dropped");
                        notifier.notify(Notice::warning(
                            "Chat disconnected",
                            "Reopen the chat to see new messages",
                        ));
                    }
                    break;
                }
            }
        }
    }
}
