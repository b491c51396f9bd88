//! Notes system: in-memory store plus the create/delete pipeline that
//! summarizes new notes and announces changes to live subscribers.

pub mod service;
pub mod store;

pub use service::NoteService;
pub use store::{NoteError, NoteStore};
