//! NoteStore: in-memory, mutex-guarded note collection
//!
//! Owns the authoritative list of notes and the id counter. Every mutation
//! happens under one lock acquisition, so concurrent create/delete calls can
//! never hand out the same id or observe a half-built note.

use chrono::Utc;
use notes_types::Note;
use parking_lot::Mutex;

use crate::summary::SUMMARY_UNAVAILABLE;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    #[error("Note {0} not found")]
    NotFound(u64),
    #[error("Note {0} already has a summary")]
    SummaryAlreadySet(u64),
    #[error("Summary must not be empty")]
    EmptySummary,
}

struct Inner {
    notes: Vec<Note>,
    /// Next id to hand out. Only ever increases, so ids are never reused
    /// even after the newest note is deleted.
    next_id: u64,
}

impl Inner {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn position(&self, id: u64) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }
}

pub struct NoteStore {
    inner: Mutex<Inner>,
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                notes: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Store a note without a summary. The summary must be attached with
    /// [`NoteStore::attach_summary`]; prefer [`NoteStore::insert_with_summary`]
    /// which never publishes a note without one.
    #[allow(dead_code)]
    pub fn create(&self, title: &str, content: &str, tags: &[String]) -> Note {
        let mut inner = self.inner.lock();
        let note = Note {
            id: inner.allocate_id(),
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.to_vec(),
            created_at: Utc::now(),
            summary: None,
        };
        inner.notes.push(note.clone());
        log::debug!("[NOTES] Created note {} (summary pending)", note.id);
        note
    }

    /// Allocate an id and insert a fully-built note in one step. A blank
    /// summary is stored as [`SUMMARY_UNAVAILABLE`].
    pub fn insert_with_summary(
        &self,
        title: &str,
        content: &str,
        tags: &[String],
        summary: String,
    ) -> Note {
        let summary = if summary.trim().is_empty() {
            log::warn!("[NOTES] Blank summary for \"{}\", storing placeholder", title);
            SUMMARY_UNAVAILABLE.to_string()
        } else {
            summary
        };

        let mut inner = self.inner.lock();
        let note = Note {
            id: inner.allocate_id(),
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.to_vec(),
            created_at: Utc::now(),
            summary: Some(summary),
        };
        inner.notes.push(note.clone());
        log::debug!("[NOTES] Stored note {} ({} tags)", note.id, note.tags.len());
        note
    }

    /// Set the summary of a note created with [`NoteStore::create`]. Only the
    /// first call succeeds.
    #[allow(dead_code)]
    pub fn attach_summary(&self, id: u64, summary: String) -> Result<Note, NoteError> {
        if summary.trim().is_empty() {
            return Err(NoteError::EmptySummary);
        }

        let mut inner = self.inner.lock();
        let idx = inner.position(id).ok_or(NoteError::NotFound(id))?;
        let note = &mut inner.notes[idx];
        if note.summary.is_some() {
            return Err(NoteError::SummaryAlreadySet(id));
        }
        note.summary = Some(summary);
        Ok(note.clone())
    }

    /// All notes in insertion order, optionally restricted to those carrying
    /// `tag` (exact, case-sensitive).
    pub fn list(&self, tag_filter: Option<&str>) -> Vec<Note> {
        let inner = self.inner.lock();
        match tag_filter {
            Some(tag) => inner
                .notes
                .iter()
                .filter(|n| n.has_tag(tag))
                .cloned()
                .collect(),
            None => inner.notes.clone(),
        }
    }

    pub fn get(&self, id: u64) -> Result<Note, NoteError> {
        let inner = self.inner.lock();
        inner
            .notes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(NoteError::NotFound(id))
    }

    /// Remove the first note with this id and return it.
    pub fn delete(&self, id: u64) -> Result<Note, NoteError> {
        let mut inner = self.inner.lock();
        let idx = inner.position(id).ok_or(NoteError::NotFound(id))?;
        let note = inner.notes.remove(idx);
        log::debug!("[NOTES] Deleted note {}", id);
        Ok(note)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().notes.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
