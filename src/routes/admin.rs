use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// User administration. Nested under `/admin` and guarded for the admin role.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        .route("/users", get(handlers::admin::list_users))
        // PUT /admin/users/{id}/role
        // Role changes apply on the user's next request.
        .route("/users/{id}/role", put(handlers::admin::update_user_role))
}
