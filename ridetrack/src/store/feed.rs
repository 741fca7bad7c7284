//! In-process fan-out for change feeds.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Identity of one open feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end of a filtered change feed.
///
/// Yields events in the order the hub published them. `next_event`
/// returns `None` once the hub has dropped the subscription.
#[derive(Debug)]
pub struct FeedSubscription<K, E> {
    id: SubscriptionId,
    key: K,
    receiver: mpsc::UnboundedReceiver<E>,
}

impl<K, E> FeedSubscription<K, E> {
    /// Assemble a subscription from its parts.
    ///
    /// Backend adapters that bridge a remote feed into a channel use this.
    pub fn new(id: SubscriptionId, key: K, receiver: mpsc::UnboundedReceiver<E>) -> Self {
        Self { id, key, receiver }
    }

    /// Subscription identity, for `unsubscribe`.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The filter key this subscription was opened with.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Wait for the next event; `None` means the feed was dropped.
    pub async fn next_event(&mut self) -> Option<E> {
        self.receiver.recv().await
    }
}

struct Subscriber<K, E> {
    key: K,
    sender: mpsc::UnboundedSender<E>,
}

struct HubState<K, E> {
    next_id: u64,
    subscribers: HashMap<SubscriptionId, Subscriber<K, E>>,
}

/// Registry of feed subscribers keyed by filter value.
///
/// Publishing an event delivers it to every open subscription whose key
/// matches. Subscriptions whose receiver has gone away are pruned on the
/// next publish.
pub struct FeedHub<K, E> {
    state: Mutex<HubState<K, E>>,
}

impl<K, E> Default for FeedHub<K, E> {
    fn default() -> Self {
        Self {
            state: Mutex::new(HubState {
                next_id: 1,
                subscribers: HashMap::new(),
            }),
        }
    }
}

impl<K, E> FeedHub<K, E>
where
    K: Clone + Eq + Hash + fmt::Display,
    E: Clone,
{
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription filtered to `key`.
    pub fn subscribe(&self, key: K) -> FeedSubscription<K, E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                key: key.clone(),
                sender,
            },
        );
        debug!(subscription = %id, key = %key, "Feed subscription opened");
        FeedSubscription { id, key, receiver }
    }

    /// Close a subscription. Returns `false` if it was not open.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.state.lock().subscribers.remove(&id).is_some();
        if removed {
            debug!(subscription = %id, "Feed subscription closed");
        }
        removed
    }

    /// Deliver an event to every subscription for `key`.
    ///
    /// Returns the number of subscriptions that received it.
    pub fn publish(&self, key: &K, event: E) -> usize {
        let mut state = self.state.lock();
        let mut delivered = 0;
        state.subscribers.retain(|id, subscriber| {
            if &subscriber.key != key {
                return true;
            }
            match subscriber.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    trace!(subscription = %id, "Pruning subscription with closed receiver");
                    false
                }
            }
        });
        delivered
    }

    /// Drop every subscription for `key` from the backend side.
    ///
    /// Receivers observe the end of their feed. Returns how many were dropped.
    pub fn drop_key(&self, key: &K) -> usize {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|_, subscriber| &subscriber.key != key);
        let dropped = before - state.subscribers.len();
        if dropped > 0 {
            debug!(key = %key, dropped, "Feed subscriptions dropped");
        }
        dropped
    }

    /// Number of open subscriptions across all keys.
    pub fn active(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Number of open subscriptions for one key.
    pub fn active_for(&self, key: &K) -> usize {
        self.state
            .lock()
            .subscribers
            .values()
            .filter(|subscriber| &subscriber.key == key)
            .count()
    }
}
