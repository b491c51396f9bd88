//! Notes REST API: create, list, fetch and delete notes.
//!
//! Creation and deletion also push `new_note` / `delete_note` events to every
//! connected `/ws` client.

use actix_web::{web, HttpResponse, Responder};
use notes_types::{CreateNoteRequest, ErrorResponse, MessageResponse};
use serde::Deserialize;

use crate::notes::NoteError;
use crate::AppState;

fn error_response(err: NoteError) -> HttpResponse {
    match err {
        NoteError::NotFound(_) => HttpResponse::NotFound().json(ErrorResponse::new("Note not found")),
        other => {
            log::error!("[NOTES] Unexpected note error: {}", other);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": other.to_string()
            }))
        }
    }
}

// --- Create ---

async fn create_note(
    data: web::Data<AppState>,
    body: web::Json<CreateNoteRequest>,
) -> impl Responder {
    let req = body.into_inner();
    let note = data
        .notes
        .create_note(&req.title, &req.content, &req.tags)
        .await;
    HttpResponse::Created().json(note)
}

// --- List ---

#[derive(Debug, Deserialize)]
struct ListNotesQuery {
    tag: Option<String>,
}

async fn list_notes(data: web::Data<AppState>, query: web::Query<ListNotesQuery>) -> impl Responder {
    // An empty `?tag=` means no filter.
    let tag = query.tag.as_deref().filter(|t| !t.is_empty());
    HttpResponse::Ok().json(data.notes.list_notes(tag))
}

// --- Single note ---

async fn get_note(data: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    match data.notes.get_note(path.into_inner()) {
        Ok(note) => HttpResponse::Ok().json(note),
        Err(e) => error_response(e),
    }
}

async fn delete_note(data: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    match data.notes.delete_note(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse::new("Note deleted successfully")),
        Err(e) => error_response(e),
    }
}

/// Reject malformed bodies with a JSON error instead of actix's plain text.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        log::debug!("[NOTES] Rejected request body: {}", message);
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
        )
        .into()
    })
}

/// Non-numeric ids get the same JSON 404 as unknown ones.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req| {
        log::debug!("[NOTES] Rejected note id in {}: {}", req.path(), err);
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::NotFound().json(ErrorResponse::new("Note not found")),
        )
        .into()
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notes")
            .app_data(json_config())
            .app_data(path_config())
            .route("", web::post().to(create_note))
            .route("", web::get().to(list_notes))
            .route("/", web::post().to(create_note))
            .route("/", web::get().to(list_notes))
            .route("/{id}", web::get().to(get_note))
            .route("/{id}", web::delete().to(delete_note)),
    );
}
