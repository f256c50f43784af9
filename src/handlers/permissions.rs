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
    models::{GrantPermissionRequest, Permission, PermissionGrant, Role},
    rbac::{check_grant_authority, event_permissions, require_event_permission},
    validation::{JsonBody, PathParams},
};

/// list_grants
///
/// [Organizer Route] Every explicit grant on the event. Requires `MANAGE`.
#[utoipa::path(
    get,
    path = "/api/events/{id}/permissions",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Grants", body = [PermissionGrant]),
        (status = 403, description = "No MANAGE permission"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn list_grants(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
) -> Result<Json<Vec<PermissionGrant>>, ApiError> {
    require_event_permission(&state.repo, &user, event_id, Permission::Manage).await?;
    Ok(Json(state.repo.list_grants(event_id).await?))
}

/// grant_permission
///
/// [Organizer Route] Grants one permission to an organizer. `MANAGE` holders may
/// grant `READ`, `WRITE` and `DELETE`; only the creator or an admin may grant
/// `MANAGE`. A duplicate grant answers 409.
#[utoipa::path(
    post,
    path = "/api/events/{id}/permissions",
    request_body = GrantPermissionRequest,
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 201, description = "Granted", body = PermissionGrant),
        (status = 400, description = "Grantee is not an organizer"),
        (status = 403, description = "Not allowed to grant this permission"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Already granted")
    )
)]
pub async fn grant_permission(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(event_id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<GrantPermissionRequest>,
) -> Result<(StatusCode, Json<PermissionGrant>), ApiError> {
    let event = require_event_permission(&state.repo, &user, event_id, Permission::Manage).await?;
    let caller = event_permissions(&state.repo, &user, &event).await?;
    check_grant_authority(&user, &event, caller, payload.permission)?;

    match state.repo.get_user(payload.user_id).await? {
        Some(grantee) if grantee.role == Role::Organizer => {}
        _ => {
            return Err(ApiError::field(
                "user_id",
                "grantee must be an existing organizer",
            ));
        }
    }

    let grant = state
        .repo
        .grant_permission(payload.user_id, event_id, payload.permission, user.id)
        .await?;

    tracing::info!(
        %event_id,
        grantee = %payload.user_id,
        permission = ?payload.permission,
        granted_by = %user.id,
        "permission granted"
    );
    Ok((StatusCode::CREATED, Json(grant)))
}

/// revoke_permission
///
/// [Organizer Route] Removes one grant. Same authority rules as granting.
#[utoipa::path(
    delete,
    path = "/api/events/{id}/permissions/{user_id}/{permission}",
    params(
        ("id" = Uuid, Path, description = "Event ID"),
        ("user_id" = Uuid, Path, description = "Grantee"),
        ("permission" = Permission, Path, description = "READ, WRITE, DELETE or MANAGE")
    ),
    responses(
        (status = 204, description = "Revoked"),
        (status = 403, description = "Not allowed to revoke this permission"),
        (status = 404, description = "No such grant")
    )
)]
pub async fn revoke_permission(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams((event_id, grantee, permission)): PathParams<(Uuid, Uuid, Permission)>,
) -> Result<StatusCode, ApiError> {
    let event = require_event_permission(&state.repo, &user, event_id, Permission::Manage).await?;
    let caller = event_permissions(&state.repo, &user, &event).await?;
    check_grant_authority(&user, &event, caller, permission)?;

    if state
        .repo
        .revoke_permission(grantee, event_id, permission)
        .await?
    {
        tracing::info!(%event_id, %grantee, ?permission, revoked_by = %user.id, "permission revoked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("grant not found".into()))
    }
}
