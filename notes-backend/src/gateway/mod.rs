//! Real-time gateway: subscriber registry, event fan-out and the `/ws` endpoint.

pub mod events;
pub mod ws;

pub use events::{DisconnectReason, NoteEventBroadcaster, SubscriberId};
