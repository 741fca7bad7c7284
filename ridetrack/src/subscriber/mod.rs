//! Driver location subscription.
//!
//! A [`LocationSubscriber`] keeps the latest known driver position for one
//! trip. It loads the stored row once, then follows the store's change feed.
//!
//! ```text
//! start() ──► fetch_latest ──► subscribe ──► listener task
//!                                              │
//!                   feed dropped ◄─────────────┤ events ──► latest (watch)
//!                        │
//!                        ▼
//!              backoff ─► resubscribe ─► fetch_latest
//! ```
//!
//! The listener task is the only writer of the latest position. Readers use
//! [`LocationSubscriber::latest`] or a [`tokio::sync::watch::Receiver`].

mod listener;
mod reconnect;

pub use listener::LocationSubscriber;
pub use reconnect::{
    ReconnectPolicy, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};
