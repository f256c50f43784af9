use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enumerations (Postgres enum types, see db/schema.sql) ---

/// Role
///
/// The fixed RBAC role of a user. Every protected router declares which roles
/// it admits; per-event access is refined further by `Permission` grants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
    Default,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Admin,
    Organizer,
    Faculty,
    #[default]
    Delegate,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Organizer, Role::Faculty, Role::Delegate];

    /// The page a user of this role lands on after login, and the redirect
    /// target when they hit a route outside their role.
    pub fn landing_route(self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Organizer => "/organizer",
            Role::Faculty => "/faculty",
            Role::Delegate => "/delegate",
        }
    }
}

/// EventStatus: Draft -> Published -> Cancelled, set directly by organizers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Draft,
    Published,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "invitation_status", rename_all = "snake_case")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "document_kind", rename_all = "snake_case")]
pub enum DocumentKind {
    Cv,
    Presentation,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Cv => "cv",
            DocumentKind::Presentation => "presentation",
        }
    }
}

/// Permission
///
/// A per-event capability. Grants are independent of each other: holding one
/// never implies holding another.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "event_permission", rename_all = "UPPERCASE")]
pub enum Permission {
    Read,
    Write,
    Delete,
    Manage,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::Manage,
    ];
}

// --- Rows ---

/// User
///
/// Canonical identity record from the `users` table; the source of truth for
/// a user's role, re-read on every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub venue: String,
    #[ts(type = "string")]
    pub starts_on: NaiveDate,
    #[ts(type = "string")]
    pub ends_on: NaiveDate,
    pub status: EventStatus,
    // FK to users.id; the creator holds every permission on the event.
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// ConferenceSession
///
/// A scheduled talk slot inside an event. Not to be confused with an auth session.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ConferenceSession {
    pub id: Uuid,
    pub event_id: Uuid,
    pub title: String,
    pub hall: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    // Set together when a faculty member is invited.
    pub faculty_id: Option<Uuid>,
    pub invitation_status: Option<InvitationStatus>,
}

/// FacultyInvitation
///
/// A session joined with its event, as seen by the invited faculty member.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct FacultyInvitation {
    pub session_id: Uuid,
    pub session_title: String,
    pub hall: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    pub event_id: Uuid,
    pub event_name: String,
    pub venue: String,
    pub invitation_status: InvitationStatus,
}

/// RosterEntry
///
/// One line of the event faculty export: a session with its (optional) speaker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RosterEntry {
    pub session_title: String,
    pub hall: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub faculty_name: Option<String>,
    pub faculty_email: Option<String>,
    pub invitation_status: Option<InvitationStatus>,
}

/// Document
///
/// Metadata for an uploaded CV or presentation. The bytes live in the file store
/// under `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub session_id: Option<Uuid>,
    pub kind: DocumentKind,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub storage_key: String,
    #[ts(type = "string")]
    pub uploaded_at: DateTime<Utc>,
}

/// Insert payload for a document row, assembled by the upload handlers.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub owner_id: Uuid,
    pub session_id: Option<Uuid>,
    pub kind: DocumentKind,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct PermissionGrant {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub permission: Permission,
    pub granted_by: Uuid,
    #[ts(type = "string")]
    pub granted_at: DateTime<Utc>,
    // Loaded via a JOIN on users.
    #[sqlx(default)]
    pub user_email: Option<String>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateEventRequest {
    pub name: String,
    pub description: Option<String>,
    pub venue: String,
    #[ts(type = "string")]
    pub starts_on: NaiveDate,
    #[ts(type = "string")]
    pub ends_on: NaiveDate,
}

/// Partial update; `None` fields are left untouched (COALESCE in the repository).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub starts_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub ends_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateEventStatusRequest {
    pub status: EventStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateSessionRequest {
    pub title: String,
    pub hall: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct InviteFacultyRequest {
    pub faculty_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RespondInvitationRequest {
    /// `accepted` or `declined`.
    pub status: InvitationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GrantPermissionRequest {
    pub user_id: Uuid,
    pub permission: Permission,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OtpRequest {
    #[schema(example = "speaker@example.org")]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OtpVerifyRequest {
    pub email: String,
    #[schema(example = "042917")]
    pub code: String,
}

// --- Responses ---

/// UserProfile
///
/// The authenticated caller as returned by `GET /api/me` and the login flow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub landing_route: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            landing_route: user.role.landing_route().to_string(),
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
    pub redirect: String,
}

/// The caller's effective permissions on one event.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EventAccessResponse {
    pub event_id: Uuid,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DownloadLinkResponse {
    pub url: String,
    pub expires_in_secs: u64,
}
