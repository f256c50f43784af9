use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{
        CreateEventRequest, Event, EventAccessResponse, Permission, Role, UpdateEventRequest,
        UpdateEventStatusRequest,
    },
    rbac::{event_permissions, require_event_permission},
    validation::{JsonBody, PathParams, ValidatedJson},
};

/// list_events
///
/// [Organizer Route] Admins see every event; organizers see the events they
/// created or hold at least one grant on.
#[utoipa::path(
    get,
    path = "/api/events",
    responses((status = 200, description = "Visible events", body = [Event]))
)]
pub async fn list_events(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let events = if user.role == Role::Admin {
        state.repo.list_all_events().await?
    } else {
        state.repo.list_events_for_user(user.id).await?
    };
    Ok(Json(events))
}

/// create_event
///
/// [Organizer Route] New events start as drafts; the creator implicitly holds
/// every permission on them.
#[utoipa::path(
    post,
    path = "/api/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Created", body = Event),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_event(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let event = state.repo.create_event(payload, user.id).await?;
    tracing::info!(event_id = %event.id, user_id = %user.id, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// get_event
///
/// [Organizer Route] Requires `READ` on the event.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Found", body = Event),
        (status = 403, description = "No READ permission"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_event(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Event>, ApiError> {
    let event = require_event_permission(&state.repo, &user, id, Permission::Read).await?;
    Ok(Json(event))
}

/// get_event_access
///
/// [Organizer Route] The caller's effective permissions on one event, so the
/// frontend can hide actions that would be refused.
#[utoipa::path(
    get,
    path = "/api/events/{id}/access",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Effective permissions", body = EventAccessResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_event_access(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<EventAccessResponse>, ApiError> {
    let event = state
        .repo
        .get_event(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("event not found".into()))?;
    let permissions = event_permissions(&state.repo, &user, &event).await?;
    Ok(Json(EventAccessResponse {
        event_id: event.id,
        permissions: permissions.to_vec(),
    }))
}

/// update_event
///
/// [Organizer Route] Partial update; requires `WRITE`. Date ordering is checked
/// against the stored values when only one side changes.
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    request_body = UpdateEventRequest,
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Updated", body = Event),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "No WRITE permission"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_event(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let current = require_event_permission(&state.repo, &user, id, Permission::Write).await?;

    let starts_on = payload.starts_on.unwrap_or(current.starts_on);
    let ends_on = payload.ends_on.unwrap_or(current.ends_on);
    if ends_on < starts_on {
        return Err(ApiError::field(
            "ends_on",
            "ends_on must not be before starts_on",
        ));
    }

    let event = state
        .repo
        .update_event(id, payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("event not found".into()))?;
    tracing::info!(event_id = %id, user_id = %user.id, "event updated");
    Ok(Json(event))
}

/// update_event_status
///
/// [Organizer Route] Moves an event between draft, published and cancelled.
/// Requires `WRITE`.
#[utoipa::path(
    put,
    path = "/api/events/{id}/status",
    request_body = UpdateEventStatusRequest,
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Status changed", body = Event),
        (status = 403, description = "No WRITE permission"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_event_status(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateEventStatusRequest>,
) -> Result<Json<Event>, ApiError> {
    require_event_permission(&state.repo, &user, id, Permission::Write).await?;
    let event = state
        .repo
        .set_event_status(id, payload.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("event not found".into()))?;
    tracing::info!(event_id = %id, status = ?event.status, "event status changed");
    Ok(Json(event))
}

/// delete_event
///
/// [Organizer Route] Requires `DELETE`. Sessions and grants go with the event.
#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "No DELETE permission"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_event(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_event_permission(&state.repo, &user, id, Permission::Delete).await?;
    if state.repo.delete_event(id).await? {
        tracing::info!(event_id = %id, user_id = %user.id, "event deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("event not found".into()))
    }
}
