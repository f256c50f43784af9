use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Organizer Router Module
///
/// Event management for admins and organizers. The role guard only admits the
/// caller to this router; every handler below then checks the per-event
/// permission it needs (READ, WRITE, DELETE or MANAGE).
pub fn organizer_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Events ---
        .route(
            "/api/events",
            get(handlers::events::list_events).post(handlers::events::create_event),
        )
        .route(
            "/api/events/{id}",
            get(handlers::events::get_event)
                .put(handlers::events::update_event)
                .delete(handlers::events::delete_event),
        )
        .route(
            "/api/events/{id}/status",
            put(handlers::events::update_event_status),
        )
        // GET /api/events/{id}/access
        // Effective permissions of the caller, for the frontend.
        .route(
            "/api/events/{id}/access",
            get(handlers::events::get_event_access),
        )
        // --- Conference sessions ---
        .route(
            "/api/events/{id}/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route(
            "/api/sessions/{id}",
            delete(handlers::sessions::delete_session),
        )
        // POST /api/sessions/{id}/invite
        // Assigns a faculty speaker and mails the invitation.
        .route(
            "/api/sessions/{id}/invite",
            post(handlers::sessions::invite_faculty),
        )
        // --- Permission grants (MANAGE) ---
        .route(
            "/api/events/{id}/permissions",
            get(handlers::permissions::list_grants).post(handlers::permissions::grant_permission),
        )
        .route(
            "/api/events/{id}/permissions/{user_id}/{permission}",
            delete(handlers::permissions::revoke_permission),
        )
        // --- Exports (READ) ---
        // ?format=csv (default) or json
        .route(
            "/api/events/{id}/export/faculty",
            get(handlers::exports::export_faculty),
        )
        .route(
            "/api/events/{id}/export/sessions",
            get(handlers::exports::export_sessions),
        )
}
