use axum::{Json, extract::State};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    models::{Role, UpdateUserRoleRequest, User},
    validation::{JsonBody, PathParams},
};

/// list_users
///
/// [Admin Route] Every account, by name.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Users", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.repo.list_users().await?))
}

/// update_user_role
///
/// [Admin Route] Changes a user's role. Takes effect on the user's next request
/// because roles are re-read from the store. Admins cannot demote themselves.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    request_body = UpdateUserRoleRequest,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Self-demotion"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_role(
    admin: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(payload): JsonBody<UpdateUserRoleRequest>,
) -> Result<Json<User>, ApiError> {
    if id == admin.id && payload.role != Role::Admin {
        return Err(ApiError::field("role", "admins cannot change their own role"));
    }

    let user = state
        .repo
        .set_user_role(id, payload.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    tracing::info!(user_id = %id, role = ?user.role, changed_by = %admin.id, "user role changed");
    Ok(Json(user))
}
