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
    mail::invitation_message,
    models::{ConferenceSession, CreateSessionRequest, InviteFacultyRequest, Permission, Role},
    rbac::require_event_permission,
    validation::{JsonBody, PathParams, ValidatedJson},
};

async fn load_session(state: &AppState, id: Uuid) -> Result<ConferenceSession, ApiError> {
    state
        .repo
        .get_session(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("session not found".into()))
}

/// list_sessions
///
/// [Organizer Route] Sessions of an event, by start time. Requires `READ`.
#[utoipa::path(
    get,
    path = "/api/events/{id}/sessions",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Sessions", body = [ConferenceSession]),
        (status = 403, description = "No READ permission"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn list_sessions(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
) -> Result<Json<Vec<ConferenceSession>>, ApiError> {
    require_event_permission(&state.repo, &user, event_id, Permission::Read).await?;
    Ok(Json(state.repo.list_sessions(event_id).await?))
}

/// create_session
///
/// [Organizer Route] Schedules a session inside the event's dates. Requires `WRITE`.
#[utoipa::path(
    post,
    path = "/api/events/{id}/sessions",
    request_body = CreateSessionRequest,
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 201, description = "Created", body = ConferenceSession),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "No WRITE permission"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn create_session(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ConferenceSession>), ApiError> {
    let event = require_event_permission(&state.repo, &user, event_id, Permission::Write).await?;

    let day = payload.starts_at.date_naive();
    if day < event.starts_on || day > event.ends_on {
        return Err(ApiError::field(
            "starts_at",
            format!(
                "session must start between {} and {}",
                event.starts_on, event.ends_on
            ),
        ));
    }

    let session = state.repo.create_session(event_id, payload).await?;
    tracing::info!(session_id = %session.id, %event_id, "session created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// delete_session
///
/// [Organizer Route] Requires `DELETE` on the parent event.
#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "No DELETE permission"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_session(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = load_session(&state, id).await?;
    require_event_permission(&state.repo, &user, session.event_id, Permission::Delete).await?;

    if state.repo.delete_session(id).await? {
        tracing::info!(session_id = %id, "session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("session not found".into()))
    }
}

/// invite_faculty
///
/// [Organizer Route] Assigns a faculty member to speak in the session and mails
/// them the invitation. Re-inviting resets the status to `pending`. A failed
/// mail is logged; the assignment stands. Requires `WRITE` on the parent event.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/invite",
    request_body = InviteFacultyRequest,
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Invited", body = ConferenceSession),
        (status = 400, description = "Invitee is not a faculty member"),
        (status = 403, description = "No WRITE permission"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn invite_faculty(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<InviteFacultyRequest>,
) -> Result<Json<ConferenceSession>, ApiError> {
    let session = load_session(&state, id).await?;
    let event =
        require_event_permission(&state.repo, &user, session.event_id, Permission::Write).await?;

    let faculty = match state.repo.get_user(payload.faculty_id).await? {
        Some(invitee) if invitee.role == Role::Faculty => invitee,
        _ => {
            return Err(ApiError::field(
                "faculty_id",
                "invitee must be an existing faculty member",
            ));
        }
    };

    let session = state
        .repo
        .assign_faculty(id, faculty.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("session not found".into()))?;

    tracing::info!(session_id = %id, faculty_id = %faculty.id, "faculty invited");

    let outcome = state
        .mailer
        .send(invitation_message(&faculty, &event, &session))
        .await;
    if !outcome.ok {
        tracing::warn!(session_id = %id, error = ?outcome.error, "invitation mail failed");
    }

    Ok(Json(session))
}
