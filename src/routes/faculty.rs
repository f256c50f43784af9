use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Faculty Router Module
///
/// Invitations and document uploads. Every handler scopes its queries to the
/// caller, so one speaker never sees another's invitations or files.
pub fn faculty_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route(
            "/api/faculty/invitations",
            get(handlers::faculty::list_invitations),
        )
        // PUT /api/faculty/invitations/{session_id}
        // Accept or decline; only while pending.
        .route(
            "/api/faculty/invitations/{session_id}",
            put(handlers::faculty::respond_invitation),
        )
        // POST /api/faculty/cv (multipart field `file`)
        .route("/api/faculty/cv", post(handlers::faculty::upload_cv))
        // POST /api/faculty/sessions/{session_id}/presentation (multipart field `file`)
        // Requires an accepted invitation for the session.
        .route(
            "/api/faculty/sessions/{session_id}/presentation",
            post(handlers::faculty::upload_presentation),
        )
        .route(
            "/api/faculty/documents",
            get(handlers::faculty::list_documents),
        )
        .route(
            "/api/faculty/documents/{id}",
            axum::routing::delete(handlers::faculty::delete_document),
        )
        // GET /api/faculty/documents/{id}/download
        // Short-lived signed link.
        .route(
            "/api/faculty/documents/{id}/download",
            get(handlers::faculty::download_document),
        )
}
