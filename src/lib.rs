use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services and the contracts they implement.
pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod mail;
pub mod models;
pub mod otp;
pub mod rbac;
pub mod repository;
pub mod storage;
pub mod validation;

pub mod handlers;

// Routers segregated by audience (public, authenticated, organizer, faculty, admin).
pub mod routes;
use routes::{admin, authenticated, faculty, organizer, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use mail::{LogMailer, MailerState, SmtpMailer};
pub use otp::OtpStore;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockFileStore, S3FileStore, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::request_otp, handlers::auth::verify_otp, handlers::auth::get_me,
        handlers::catalog::list_published_events, handlers::catalog::list_catalog_sessions,
        handlers::events::list_events, handlers::events::create_event, handlers::events::get_event,
        handlers::events::get_event_access, handlers::events::update_event,
        handlers::events::update_event_status, handlers::events::delete_event,
        handlers::sessions::list_sessions, handlers::sessions::create_session,
        handlers::sessions::delete_session, handlers::sessions::invite_faculty,
        handlers::permissions::list_grants, handlers::permissions::grant_permission,
        handlers::permissions::revoke_permission,
        handlers::exports::export_faculty, handlers::exports::export_sessions,
        handlers::faculty::list_invitations, handlers::faculty::respond_invitation,
        handlers::faculty::upload_cv, handlers::faculty::upload_presentation,
        handlers::faculty::list_documents, handlers::faculty::download_document,
        handlers::faculty::delete_document,
        handlers::admin::list_users, handlers::admin::update_user_role,
    ),
    components(
        schemas(
            models::Role, models::EventStatus, models::InvitationStatus, models::DocumentKind,
            models::Permission, models::User, models::Event, models::ConferenceSession,
            models::FacultyInvitation, models::Document, models::PermissionGrant,
            models::CreateEventRequest, models::UpdateEventRequest,
            models::UpdateEventStatusRequest, models::CreateSessionRequest,
            models::InviteFacultyRequest, models::RespondInvitationRequest,
            models::GrantPermissionRequest, models::UpdateUserRoleRequest, models::OtpRequest,
            models::OtpVerifyRequest, models::UserProfile, models::LoginResponse,
            models::EventAccessResponse, models::DownloadLinkResponse, error::FieldError,
        )
    ),
    tags(
        (name = "conference-portal", description = "Conference management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into every
/// request. All services sit behind `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Relational store (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// File store for CVs and presentations.
    pub storage: StorageState,
    /// Outgoing mail (SMTP, log-only, or recording).
    pub mailer: MailerState,
    /// One-time login codes.
    pub otp: Arc<OtpStore>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routers, wraps each protected one in its role guard, and applies
/// the request-id, tracing, body-limit and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let body_limit = state.config.uploads.request_body_limit();

    // 2. Role-guarded routers. `route_layer` only runs the guard for matched
    // routes, so unknown paths still answer 404.
    let guard_state = state.clone();
    let guarded = move |router: Router<AppState>, roles: &'static [models::Role]| {
        router.route_layer(middleware::from_fn_with_state(
            (guard_state.clone(), roles),
            rbac::enforce_roles,
        ))
    };

    let base_router = Router::new()
        // Documentation: Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(guarded(authenticated::authenticated_routes(), rbac::ANY_ROLE))
        .merge(guarded(organizer::organizer_routes(), rbac::ORGANIZER_ROLES))
        .merge(guarded(faculty::faculty_routes(), rbac::FACULTY_ROLES))
        .nest("/admin", guarded(admin::admin_routes(), rbac::ADMIN_ROLES))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing, one span per request carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span with method, URI and the `x-request-id`, so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
