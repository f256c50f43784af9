use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{AuthUser, issue_token},
    error::ApiError,
    mail::otp_message,
    models::{LoginResponse, OtpRequest, OtpVerifyRequest, UserProfile},
    otp::normalize_email,
    validation::ValidatedJson,
};

/// request_otp
///
/// [Public Route] Starts a passwordless login. A code is mailed only when the
/// address belongs to a known user, but the answer is always 202 so the endpoint
/// cannot be used to enumerate accounts. An address locked out by failed
/// attempts gets no new code until the lock expires.
#[utoipa::path(
    post,
    path = "/api/auth/otp/request",
    request_body = OtpRequest,
    responses(
        (status = 202, description = "Code sent if the address is registered"),
        (status = 400, description = "Malformed email")
    )
)]
pub async fn request_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<OtpRequest>,
) -> Result<StatusCode, ApiError> {
    let email = normalize_email(&payload.email);

    let Some(user) = state.repo.get_user_by_email(&email).await? else {
        tracing::info!("otp requested for unknown address");
        return Ok(StatusCode::ACCEPTED);
    };

    let code = match state.otp.issue(&email) {
        Ok(code) => code,
        Err(e) => {
            tracing::info!(user_id = %user.id, reason = %e, "otp not issued");
            return Ok(StatusCode::ACCEPTED);
        }
    };
    let ttl_minutes = state.otp.ttl().num_minutes();
    let outcome = state
        .mailer
        .send(otp_message(&user.email, &code, ttl_minutes))
        .await;

    if !outcome.ok {
        tracing::warn!(user_id = %user.id, error = ?outcome.error, "otp mail failed");
    } else {
        tracing::info!(user_id = %user.id, "otp issued");
    }

    Ok(StatusCode::ACCEPTED)
}

/// verify_otp
///
/// [Public Route] Exchanges a valid code for a session token. Codes are single
/// use; every failure mode answers 401.
#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Code missing, expired, wrong or already used")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<OtpVerifyRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&payload.email);

    if let Err(e) = state.otp.verify(&email, &payload.code) {
        tracing::info!(reason = %e, "otp verification failed");
        return Err(ApiError::Unauthorized);
    }

    // The user may have been removed between request and verify.
    let user = state
        .repo
        .get_user_by_email(&email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let token = issue_token(&state.config, &user)?;
    tracing::info!(user_id = %user.id, role = ?user.role, "user logged in");

    let profile = UserProfile::from(user);
    Ok(Json(LoginResponse {
        token,
        redirect: profile.landing_route.clone(),
        user: profile,
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's profile, including where the frontend
/// should send them.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let record = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(record.into()))
}
