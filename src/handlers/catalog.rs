use axum::{Json, extract::State};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    models::{ConferenceSession, Event, EventStatus},
    validation::PathParams,
};

/// list_published_events
///
/// [Authenticated Route] The public programme: published events only.
#[utoipa::path(
    get,
    path = "/api/catalog/events",
    responses((status = 200, description = "Published events", body = [Event]))
)]
pub async fn list_published_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.repo.list_published_events().await?))
}

/// list_catalog_sessions
///
/// [Authenticated Route] Sessions of a published event. Drafts and cancelled
/// events answer 404 so their existence is not revealed.
#[utoipa::path(
    get,
    path = "/api/catalog/events/{id}/sessions",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Sessions", body = [ConferenceSession]),
        (status = 404, description = "No such published event")
    )
)]
pub async fn list_catalog_sessions(
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
) -> Result<Json<Vec<ConferenceSession>>, ApiError> {
    match state.repo.get_event(event_id).await? {
        Some(event) if event.status == EventStatus::Published => {
            Ok(Json(state.repo.list_sessions(event.id).await?))
        }
        _ => Err(ApiError::NotFound("event not found".into())),
    }
}
