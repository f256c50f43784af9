use crate::models::{
    ConferenceSession, CreateEventRequest, CreateSessionRequest, Document, Event, EventStatus,
    FacultyInvitation, InvitationStatus, NewDocument, Permission, PermissionGrant, Role,
    RosterEntry, UpdateEventRequest, User,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// The relational-store contract. Handlers and the RBAC layer only see this trait,
/// so tests can swap in an in-memory implementation.
///
/// Every method surfaces database failures as `sqlx::Error`; `ApiError` maps them
/// to HTTP statuses. "Not found" is modelled as `Ok(None)` / `Ok(false)`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;
    // Email lookup is case-insensitive.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    async fn list_users(&self) -> Result<Vec<User>, sqlx::Error>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, sqlx::Error>;

    // --- Events ---
    async fn create_event(
        &self,
        req: CreateEventRequest,
        created_by: Uuid,
    ) -> Result<Event, sqlx::Error>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, sqlx::Error>;
    async fn list_all_events(&self) -> Result<Vec<Event>, sqlx::Error>;
    /// Events the user created or holds at least one grant on.
    async fn list_events_for_user(&self, user_id: Uuid) -> Result<Vec<Event>, sqlx::Error>;
    async fn list_published_events(&self) -> Result<Vec<Event>, sqlx::Error>;
    async fn update_event(
        &self,
        id: Uuid,
        req: UpdateEventRequest,
    ) -> Result<Option<Event>, sqlx::Error>;
    async fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
    ) -> Result<Option<Event>, sqlx::Error>;
    async fn delete_event(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    // --- Conference sessions ---
    async fn create_session(
        &self,
        event_id: Uuid,
        req: CreateSessionRequest,
    ) -> Result<ConferenceSession, sqlx::Error>;
    async fn get_session(&self, id: Uuid) -> Result<Option<ConferenceSession>, sqlx::Error>;
    async fn list_sessions(&self, event_id: Uuid) -> Result<Vec<ConferenceSession>, sqlx::Error>;
    async fn delete_session(&self, id: Uuid) -> Result<bool, sqlx::Error>;
    /// Sets the speaker and resets the invitation to `pending`.
    async fn assign_faculty(
        &self,
        session_id: Uuid,
        faculty_id: Uuid,
    ) -> Result<Option<ConferenceSession>, sqlx::Error>;
    /// Applies a response only if `faculty_id` is the invited speaker and the
    /// invitation is still pending; otherwise returns `None`.
    async fn respond_to_invitation(
        &self,
        session_id: Uuid,
        faculty_id: Uuid,
        status: InvitationStatus,
    ) -> Result<Option<ConferenceSession>, sqlx::Error>;
    async fn list_faculty_invitations(
        &self,
        faculty_id: Uuid,
    ) -> Result<Vec<FacultyInvitation>, sqlx::Error>;
    async fn event_roster(&self, event_id: Uuid) -> Result<Vec<RosterEntry>, sqlx::Error>;

    // --- Permission store ---
    async fn list_user_permissions(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<Vec<Permission>, sqlx::Error>;
    async fn list_grants(&self, event_id: Uuid) -> Result<Vec<PermissionGrant>, sqlx::Error>;
    /// A duplicate grant surfaces as a unique violation (409).
    async fn grant_permission(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        permission: Permission,
        granted_by: Uuid,
    ) -> Result<PermissionGrant, sqlx::Error>;
    async fn revoke_permission(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        permission: Permission,
    ) -> Result<bool, sqlx::Error>;

    // --- Documents ---
    async fn create_document(&self, doc: NewDocument) -> Result<Document, sqlx::Error>;
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, sqlx::Error>;
    async fn list_documents(&self, owner_id: Uuid) -> Result<Vec<Document>, sqlx::Error>;
    /// Owner-only delete; returns the removed row so its file can be cleaned up.
    async fn delete_document(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Document>, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. All statements are parameterized.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str =
    "id, name, description, venue, starts_on, ends_on, status, created_by, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, event_id, title, hall, starts_at, ends_at, faculty_id, invitation_status";

const DOCUMENT_COLUMNS: &str =
    "id, owner_id, session_id, kind, file_name, content_type, size_bytes, storage_key, uploaded_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, email, name, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, role FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, email, name, role FROM users ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING id, email, name, role",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
    }

    /// New events always start as `draft`.
    async fn create_event(
        &self,
        req: CreateEventRequest,
        created_by: Uuid,
    ) -> Result<Event, sqlx::Error> {
        let sql = format!(
            "INSERT INTO events (id, name, description, venue, starts_on, ends_on, status, created_by, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7, NOW(), NOW())
             RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name)
            .bind(req.description)
            .bind(req.venue)
            .bind(req.starts_on)
            .bind(req.ends_on)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_all_events(&self) -> Result<Vec<Event>, sqlx::Error> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY starts_on DESC");
        sqlx::query_as::<_, Event>(&sql).fetch_all(&self.pool).await
    }

    async fn list_events_for_user(&self, user_id: Uuid) -> Result<Vec<Event>, sqlx::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events e
             WHERE e.created_by = $1
                OR EXISTS (SELECT 1 FROM event_permissions p WHERE p.event_id = e.id AND p.user_id = $1)
             ORDER BY e.starts_on DESC"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn list_published_events(&self) -> Result<Vec<Event>, sqlx::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status = 'published' ORDER BY starts_on ASC"
        );
        sqlx::query_as::<_, Event>(&sql).fetch_all(&self.pool).await
    }

    async fn update_event(
        &self,
        id: Uuid,
        req: UpdateEventRequest,
    ) -> Result<Option<Event>, sqlx::Error> {
        let sql = format!(
            "UPDATE events
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 venue = COALESCE($4, venue),
                 starts_on = COALESCE($5, starts_on),
                 ends_on = COALESCE($6, ends_on),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(req.name)
            .bind(req.description)
            .bind(req.venue)
            .bind(req.starts_on)
            .bind(req.ends_on)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
    ) -> Result<Option<Event>, sqlx::Error> {
        let sql = format!(
            "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn create_session(
        &self,
        event_id: Uuid,
        req: CreateSessionRequest,
    ) -> Result<ConferenceSession, sqlx::Error> {
        let sql = format!(
            "INSERT INTO conference_sessions (id, event_id, title, hall, starts_at, ends_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, ConferenceSession>(&sql)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(req.title)
            .bind(req.hall)
            .bind(req.starts_at)
            .bind(req.ends_at)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ConferenceSession>, sqlx::Error> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM conference_sessions WHERE id = $1");
        sqlx::query_as::<_, ConferenceSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_sessions(&self, event_id: Uuid) -> Result<Vec<ConferenceSession>, sqlx::Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM conference_sessions WHERE event_id = $1 ORDER BY starts_at ASC"
        );
        sqlx::query_as::<_, ConferenceSession>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("DELETE FROM conference_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn assign_faculty(
        &self,
        session_id: Uuid,
        faculty_id: Uuid,
    ) -> Result<Option<ConferenceSession>, sqlx::Error> {
        let sql = format!(
            "UPDATE conference_sessions
             SET faculty_id = $2, invitation_status = 'pending'
             WHERE id = $1
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, ConferenceSession>(&sql)
            .bind(session_id)
            .bind(faculty_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn respond_to_invitation(
        &self,
        session_id: Uuid,
        faculty_id: Uuid,
        status: InvitationStatus,
    ) -> Result<Option<ConferenceSession>, sqlx::Error> {
        let sql = format!(
            "UPDATE conference_sessions
             SET invitation_status = $3
             WHERE id = $1 AND faculty_id = $2 AND invitation_status = 'pending'
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, ConferenceSession>(&sql)
            .bind(session_id)
            .bind(faculty_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_faculty_invitations(
        &self,
        faculty_id: Uuid,
    ) -> Result<Vec<FacultyInvitation>, sqlx::Error> {
        sqlx::query_as::<_, FacultyInvitation>(
            r#"
            SELECT s.id AS session_id, s.title AS session_title, s.hall, s.starts_at, s.ends_at,
                   e.id AS event_id, e.name AS event_name, e.venue, s.invitation_status
            FROM conference_sessions s
            JOIN events e ON s.event_id = e.id
            WHERE s.faculty_id = $1 AND s.invitation_status IS NOT NULL
            ORDER BY s.starts_at ASC
            "#,
        )
        .bind(faculty_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn event_roster(&self, event_id: Uuid) -> Result<Vec<RosterEntry>, sqlx::Error> {
        sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT s.title AS session_title, s.hall, s.starts_at, s.ends_at,
                   u.name AS faculty_name, u.email AS faculty_email, s.invitation_status
            FROM conference_sessions s
            LEFT JOIN users u ON s.faculty_id = u.id
            WHERE s.event_id = $1
            ORDER BY s.starts_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_user_permissions(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<Vec<Permission>, sqlx::Error> {
        sqlx::query_scalar::<_, Permission>(
            "SELECT permission FROM event_permissions WHERE user_id = $1 AND event_id = $2",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_grants(&self, event_id: Uuid) -> Result<Vec<PermissionGrant>, sqlx::Error> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"
            SELECT p.user_id, p.event_id, p.permission, p.granted_by, p.granted_at, u.email AS user_email
            FROM event_permissions p
            JOIN users u ON p.user_id = u.id
            WHERE p.event_id = $1
            ORDER BY u.email ASC, p.permission ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn grant_permission(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        permission: Permission,
        granted_by: Uuid,
    ) -> Result<PermissionGrant, sqlx::Error> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"
            INSERT INTO event_permissions (user_id, event_id, permission, granted_by, granted_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING user_id, event_id, permission, granted_by, granted_at
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(permission)
        .bind(granted_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn revoke_permission(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        permission: Permission,
    ) -> Result<bool, sqlx::Error> {
        let res = sqlx::query(
            "DELETE FROM event_permissions WHERE user_id = $1 AND event_id = $2 AND permission = $3",
        )
        .bind(user_id)
        .bind(event_id)
        .bind(permission)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn create_document(&self, doc: NewDocument) -> Result<Document, sqlx::Error> {
        let sql = format!(
            "INSERT INTO documents (id, owner_id, session_id, kind, file_name, content_type, size_bytes, storage_key, uploaded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
             RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&sql)
            .bind(Uuid::new_v4())
            .bind(doc.owner_id)
            .bind(doc.session_id)
            .bind(doc.kind)
            .bind(doc.file_name)
            .bind(doc.content_type)
            .bind(doc.size_bytes)
            .bind(doc.storage_key)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_documents(&self, owner_id: Uuid) -> Result<Vec<Document>, sqlx::Error> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = $1 ORDER BY uploaded_at DESC"
        );
        sqlx::query_as::<_, Document>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn delete_document(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Document>, sqlx::Error> {
        let sql = format!(
            "DELETE FROM documents WHERE id = $1 AND owner_id = $2 RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
    }
}
