//! Shared wire types for the notes backend and its HTTP / WebSocket clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// A stored note with its generated summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Note {
    /// Exact, case-sensitive tag match
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

// =====================================================
// Request Types
// =====================================================

/// Body of `POST /notes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

// =====================================================
// Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Plain confirmation body, e.g. after a delete
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

/// Error body for id-addressed lookups that miss
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

// =====================================================
// Push Events
// =====================================================

/// Lifecycle event pushed to every live `/ws` subscriber.
///
/// Serialized as `{"action": "new_note", "note": {...}}` or
/// `{"action": "delete_note", "note_id": 7}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NoteEvent {
    NewNote { note: Note },
    DeleteNote { note_id: u64 },
}

impl NoteEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NoteEvent::NewNote { .. } => "new_note",
            NoteEvent::DeleteNote { .. } => "delete_note",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note() -> Note {
        Note {
            id: 3,
            title: "A".to_string(),
            content: "one two".to_string(),
            tags: vec!["x".to_string()],
            created_at: Utc::now(),
            summary: Some("one two...".to_string()),
        }
    }

    #[test]
    fn test_new_note_event_shape() {
        let value = serde_json::to_value(NoteEvent::NewNote { note: sample_note() }).unwrap();
        assert_eq!(value["action"], "new_note");
        assert_eq!(value["note"]["id"], 3);
        assert_eq!(value["note"]["summary"], "one two...");
    }

    #[test]
    fn test_delete_note_event_shape() {
        let value = serde_json::to_value(NoteEvent::DeleteNote { note_id: 9 }).unwrap();
        assert_eq!(value, serde_json::json!({"action": "delete_note", "note_id": 9}));
    }

    #[test]
    fn test_create_request_tags_default_empty() {
        let req: CreateNoteRequest =
            serde_json::from_str(r#"{"title": "t", "content": "c"}"#).unwrap();
        assert!(req.tags.is_empty());
    }

    #[test]
    fn test_has_tag_is_case_sensitive() {
        let note = sample_note();
        assert!(note.has_tag("x"));
        assert!(!note.has_tag("X"));
    }
}
