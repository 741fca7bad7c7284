//! In-trip chat between a booking's driver and passenger.
//!
//! Chat follows the same feed lifecycle as location tracking: load history,
//! subscribe to inserts for the booking, close on unmount.

mod error;
mod message;
mod session;
mod store;

pub use error::ChatError;
pub use message::{BookingParticipants, ChatMessage, NewMessage};
pub use session::ChatSession;
pub use store::{ChatStore, MemoryChatStore, MessageFeed};
