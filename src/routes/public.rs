use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Health check and the passwordless login flow. Nothing here reveals whether
/// an email address is registered.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/otp/request
        // Mails a one-time code to a known address. Always 202.
        .route("/api/auth/otp/request", post(handlers::auth::request_otp))
        // POST /api/auth/otp/verify
        // Exchanges the code for a session token and the role's landing route.
        .route("/api/auth/otp/verify", post(handlers::auth::verify_otp))
}
