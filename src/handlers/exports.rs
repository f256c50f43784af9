use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    export::{ExportFormat, ExportQuery, Table, attachment_name, roster_table, sessions_table},
    models::Permission,
    rbac::require_event_permission,
    validation::PathParams,
};

fn attachment(table: &Table, format: ExportFormat) -> Result<Response, ApiError> {
    let renderer = format.renderer();
    let body = renderer.render(table)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_name(table, renderer.as_ref())
    );
    Ok((
        [
            (header::CONTENT_TYPE, renderer.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// export_faculty
///
/// [Organizer Route] The event's speaker roster as a file. Requires `READ`.
#[utoipa::path(
    get,
    path = "/api/events/{id}/export/faculty",
    params(("id" = Uuid, Path, description = "Event ID"), ExportQuery),
    responses(
        (status = 200, description = "Roster file (text/csv or application/json)"),
        (status = 400, description = "Unsupported format"),
        (status = 403, description = "No READ permission"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn export_faculty(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let event = require_event_permission(&state.repo, &user, event_id, Permission::Read).await?;
    let roster = state.repo.event_roster(event_id).await?;

    tracing::info!(%event_id, rows = roster.len(), ?format, "faculty roster exported");
    attachment(&roster_table(&event, &roster), format)
}

/// export_sessions
///
/// [Organizer Route] The event's session list as a file. Requires `READ`.
#[utoipa::path(
    get,
    path = "/api/events/{id}/export/sessions",
    params(("id" = Uuid, Path, description = "Event ID"), ExportQuery),
    responses(
        (status = 200, description = "Session file (text/csv or application/json)"),
        (status = 400, description = "Unsupported format"),
        (status = 403, description = "No READ permission"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn export_sessions(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let event = require_event_permission(&state.repo, &user, event_id, Permission::Read).await?;
    let sessions = state.repo.list_sessions(event_id).await?;

    tracing::info!(%event_id, rows = sessions.len(), ?format, "session list exported");
    attachment(&sessions_table(&event, &sessions), format)
}
