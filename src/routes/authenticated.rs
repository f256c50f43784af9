use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Reachable by every role once signed in: the caller's profile and the
/// published programme.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/api/me", get(handlers::auth::get_me))
        // GET /api/catalog/events
        // Published events only; drafts stay with their organizers.
        .route(
            "/api/catalog/events",
            get(handlers::catalog::list_published_events),
        )
        // GET /api/catalog/events/{id}/sessions
        .route(
            "/api/catalog/events/{id}/sessions",
            get(handlers::catalog::list_catalog_sessions),
        )
}
