//! NoteService: orchestrates summary generation, storage and broadcast.
//!
//! Create: summarize (may suspend) -> store the complete note -> broadcast
//! `new_note`. Delete: remove -> broadcast `delete_note`. Summarization and
//! delivery failures are absorbed along the way; only `NotFound` reaches the
//! caller.

use notes_types::{Note, NoteEvent};
use std::sync::Arc;

use super::store::{NoteError, NoteStore};
use crate::gateway::NoteEventBroadcaster;
use crate::summary::SummaryProvider;

pub struct NoteService {
    store: NoteStore,
    summarizer: Arc<dyn SummaryProvider>,
    broadcaster: Arc<NoteEventBroadcaster>,
}

impl NoteService {
    pub fn new(
        store: NoteStore,
        summarizer: Arc<dyn SummaryProvider>,
        broadcaster: Arc<NoteEventBroadcaster>,
    ) -> Self {
        Self {
            store,
            summarizer,
            broadcaster,
        }
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    /// Summarize, store and announce a new note.
    ///
    /// The id is allocated only once the summary exists, so a slow or
    /// abandoned summarization never consumes an id.
    pub async fn create_note(&self, title: &str, content: &str, tags: &[String]) -> Note {
        let summary = self.summarizer.summarize(content).await;

        let note = self.store.insert_with_summary(title, content, tags, summary);

        log::info!("[NOTES] Created note {} \"{}\"", note.id, note.title);

        self.broadcaster
            .broadcast(NoteEvent::NewNote { note: note.clone() })
            .await;

        note
    }

    /// Remove a note and announce its removal.
    pub async fn delete_note(&self, id: u64) -> Result<(), NoteError> {
        let note = self.store.delete(id)?;
        log::info!("[NOTES] Deleted note {} \"{}\"", note.id, note.title);

        self.broadcaster
            .broadcast(NoteEvent::DeleteNote { note_id: id })
            .await;

        Ok(())
    }

    pub fn list_notes(&self, tag_filter: Option<&str>) -> Vec<Note> {
        self.store.list(tag_filter)
    }

    pub fn get_note(&self, id: u64) -> Result<Note, NoteError> {
        self.store.get(id)
    }
}
