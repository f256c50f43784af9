#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use conference_portal::{
    AppState, create_router,
    auth::issue_token,
    config::AppConfig,
    mail::RecordingMailer,
    models::{
        ConferenceSession, CreateEventRequest, CreateSessionRequest, Document, Event, EventStatus,
        FacultyInvitation, InvitationStatus, NewDocument, Permission, PermissionGrant, Role,
        RosterEntry, UpdateEventRequest, User,
    },
    otp::OtpStore,
    repository::{Repository, RepositoryState},
    storage::{MockFileStore, StorageState},
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::{
    borrow::Cow,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tower::ServiceExt;
use uuid::Uuid;

// --- In-memory Repository ---

/// Unique-violation stand-in so duplicate grants take the same path as Postgres.
#[derive(Debug)]
struct UniqueViolation;

impl std::fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("duplicate key value violates unique constraint")
    }
}

impl std::error::Error for UniqueViolation {}

impl sqlx::error::DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed("23505"))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    events: Vec<Event>,
    sessions: Vec<ConferenceSession>,
    grants: Vec<PermissionGrant>,
    documents: Vec<Document>,
}

/// InMemoryRepo
///
/// Full `Repository` over plain vectors. `fail_all` makes every call return a
/// database error so 500 handling can be exercised.
#[derive(Default)]
pub struct InMemoryRepo {
    tables: Mutex<Tables>,
    pub fail_all: AtomicBool,
}

impl InMemoryRepo {
    fn check(&self) -> Result<(), sqlx::Error> {
        if self.fail_all.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }

    pub fn insert_user(&self, user: User) {
        self.tables.lock().unwrap().users.push(user);
    }

    pub fn remove_user(&self, id: Uuid) {
        self.tables.lock().unwrap().users.retain(|u| u.id != id);
    }

    /// The stored row, including the storage key the API never serializes.
    pub fn get_document_row(&self, id: Uuid) -> Document {
        self.tables
            .lock()
            .unwrap()
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .unwrap()
    }

    pub fn grants_for(&self, event_id: Uuid) -> Vec<PermissionGrant> {
        self.tables
            .lock()
            .unwrap()
            .grants
            .iter()
            .filter(|g| g.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        self.check()?;
        let mut users = self.tables.lock().unwrap().users.clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn create_event(
        &self,
        req: CreateEventRequest,
        created_by: Uuid,
    ) -> Result<Event, sqlx::Error> {
        self.check()?;
        let event = Event {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            venue: req.venue,
            starts_on: req.starts_on,
            ends_on: req.ends_on,
            status: EventStatus::Draft,
            created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.tables.lock().unwrap().events.push(event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_all_events(&self) -> Result<Vec<Event>, sqlx::Error> {
        self.check()?;
        Ok(self.tables.lock().unwrap().events.clone())
    }

    async fn list_events_for_user(&self, user_id: Uuid) -> Result<Vec<Event>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .events
            .iter()
            .filter(|e| {
                e.created_by == user_id
                    || t.grants
                        .iter()
                        .any(|g| g.event_id == e.id && g.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn list_published_events(&self) -> Result<Vec<Event>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .events
            .iter()
            .filter(|e| e.status == EventStatus::Published)
            .cloned()
            .collect())
    }

    async fn update_event(
        &self,
        id: Uuid,
        req: UpdateEventRequest,
    ) -> Result<Option<Event>, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        Ok(t.events.iter_mut().find(|e| e.id == id).map(|e| {
            if let Some(name) = req.name {
                e.name = name;
            }
            if let Some(description) = req.description {
                e.description = Some(description);
            }
            if let Some(venue) = req.venue {
                e.venue = venue;
            }
            if let Some(starts_on) = req.starts_on {
                e.starts_on = starts_on;
            }
            if let Some(ends_on) = req.ends_on {
                e.ends_on = ends_on;
            }
            e.updated_at = Utc::now();
            e.clone()
        }))
    }

    async fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
    ) -> Result<Option<Event>, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        Ok(t.events.iter_mut().find(|e| e.id == id).map(|e| {
            e.status = status;
            e.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        let before = t.events.len();
        t.events.retain(|e| e.id != id);
        t.sessions.retain(|s| s.event_id != id);
        t.grants.retain(|g| g.event_id != id);
        Ok(t.events.len() < before)
    }

    async fn create_session(
        &self,
        event_id: Uuid,
        req: CreateSessionRequest,
    ) -> Result<ConferenceSession, sqlx::Error> {
        self.check()?;
        let session = ConferenceSession {
            id: Uuid::new_v4(),
            event_id,
            title: req.title,
            hall: req.hall,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            faculty_id: None,
            invitation_status: None,
        };
        self.tables.lock().unwrap().sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ConferenceSession>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sessions(&self, event_id: Uuid) -> Result<Vec<ConferenceSession>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut sessions: Vec<_> = t
            .sessions
            .iter()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.starts_at);
        Ok(sessions)
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        let before = t.sessions.len();
        t.sessions.retain(|s| s.id != id);
        Ok(t.sessions.len() < before)
    }

    async fn assign_faculty(
        &self,
        session_id: Uuid,
        faculty_id: Uuid,
    ) -> Result<Option<ConferenceSession>, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        Ok(t.sessions.iter_mut().find(|s| s.id == session_id).map(|s| {
            s.faculty_id = Some(faculty_id);
            s.invitation_status = Some(InvitationStatus::Pending);
            s.clone()
        }))
    }

    async fn respond_to_invitation(
        &self,
        session_id: Uuid,
        faculty_id: Uuid,
        status: InvitationStatus,
    ) -> Result<Option<ConferenceSession>, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        Ok(t
            .sessions
            .iter_mut()
            .find(|s| {
                s.id == session_id
                    && s.faculty_id == Some(faculty_id)
                    && s.invitation_status == Some(InvitationStatus::Pending)
            })
            .map(|s| {
                s.invitation_status = Some(status);
                s.clone()
            }))
    }

    async fn list_faculty_invitations(
        &self,
        faculty_id: Uuid,
    ) -> Result<Vec<FacultyInvitation>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .sessions
            .iter()
            .filter(|s| s.faculty_id == Some(faculty_id))
            .filter_map(|s| {
                let event = t.events.iter().find(|e| e.id == s.event_id)?;
                Some(FacultyInvitation {
                    session_id: s.id,
                    session_title: s.title.clone(),
                    hall: s.hall.clone(),
                    starts_at: s.starts_at,
                    ends_at: s.ends_at,
                    event_id: event.id,
                    event_name: event.name.clone(),
                    venue: event.venue.clone(),
                    invitation_status: s.invitation_status?,
                })
            })
            .collect())
    }

    async fn event_roster(&self, event_id: Uuid) -> Result<Vec<RosterEntry>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        let mut sessions: Vec<_> = t.sessions.iter().filter(|s| s.event_id == event_id).collect();
        sessions.sort_by_key(|s| s.starts_at);
        Ok(sessions
            .into_iter()
            .map(|s| {
                let faculty = s
                    .faculty_id
                    .and_then(|id| t.users.iter().find(|u| u.id == id));
                RosterEntry {
                    session_title: s.title.clone(),
                    hall: s.hall.clone(),
                    starts_at: s.starts_at,
                    ends_at: s.ends_at,
                    faculty_name: faculty.map(|u| u.name.clone()),
                    faculty_email: faculty.map(|u| u.email.clone()),
                    invitation_status: s.invitation_status,
                }
            })
            .collect())
    }

    async fn list_user_permissions(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<Vec<Permission>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .grants
            .iter()
            .filter(|g| g.user_id == user_id && g.event_id == event_id)
            .map(|g| g.permission)
            .collect())
    }

    async fn list_grants(&self, event_id: Uuid) -> Result<Vec<PermissionGrant>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .grants
            .iter()
            .filter(|g| g.event_id == event_id)
            .map(|g| PermissionGrant {
                user_email: t
                    .users
                    .iter()
                    .find(|u| u.id == g.user_id)
                    .map(|u| u.email.clone()),
                ..g.clone()
            })
            .collect())
    }

    async fn grant_permission(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        permission: Permission,
        granted_by: Uuid,
    ) -> Result<PermissionGrant, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        let duplicate = t.grants.iter().any(|g| {
            g.user_id == user_id && g.event_id == event_id && g.permission == permission
        });
        if duplicate {
            return Err(sqlx::Error::Database(Box::new(UniqueViolation)));
        }
        let grant = PermissionGrant {
            user_id,
            event_id,
            permission,
            granted_by,
            granted_at: Utc::now(),
            user_email: None,
        };
        t.grants.push(grant.clone());
        Ok(grant)
    }

    async fn revoke_permission(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        permission: Permission,
    ) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        let before = t.grants.len();
        t.grants.retain(|g| {
            !(g.user_id == user_id && g.event_id == event_id && g.permission == permission)
        });
        Ok(t.grants.len() < before)
    }

    async fn create_document(&self, doc: NewDocument) -> Result<Document, sqlx::Error> {
        self.check()?;
        let document = Document {
            id: Uuid::new_v4(),
            owner_id: doc.owner_id,
            session_id: doc.session_id,
            kind: doc.kind,
            file_name: doc.file_name,
            content_type: doc.content_type,
            size_bytes: doc.size_bytes,
            storage_key: doc.storage_key,
            uploaded_at: Utc::now(),
        };
        self.tables.lock().unwrap().documents.push(document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self, owner_id: Uuid) -> Result<Vec<Document>, sqlx::Error> {
        self.check()?;
        let t = self.tables.lock().unwrap();
        Ok(t
            .documents
            .iter()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete_document(
        &self,
        id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<Document>, sqlx::Error> {
        self.check()?;
        let mut t = self.tables.lock().unwrap();
        let position = t
            .documents
            .iter()
            .position(|d| d.id == id && d.owner_id == owner_id);
        Ok(position.map(|index| t.documents.remove(index)))
    }
}

// --- Test Application ---

/// TestApp
///
/// The real router over in-memory services, with handles kept for assertions.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepo>,
    pub storage: MockFileStore,
    pub mailer: RecordingMailer,
    pub otp: Arc<OtpStore>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(AppConfig::default(), MockFileStore::new(), RecordingMailer::new())
    }

    pub fn with(config: AppConfig, storage: MockFileStore, mailer: RecordingMailer) -> Self {
        let repo = Arc::new(InMemoryRepo::default());
        let otp = Arc::new(OtpStore::new(&config.otp));

        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(storage.clone()) as StorageState,
            mailer: Arc::new(mailer.clone()),
            otp: otp.clone(),
            config: config.clone(),
        };

        Self {
            router: create_router(state),
            repo,
            storage,
            mailer,
            otp,
            config,
        }
    }

    pub fn user(&self, role: Role) -> User {
        let id = Uuid::new_v4();
        let user = User {
            id,
            email: format!("{}-{}@example.org", role_label(role), &id.to_string()[..8]),
            name: format!("Test {}", role_label(role)),
            role,
        };
        self.repo.insert_user(user.clone());
        user
    }

    pub fn token(&self, user: &User) -> String {
        issue_token(&self.config, user).unwrap()
    }

    pub async fn event_owned_by(&self, owner: &User) -> Event {
        self.repo
            .create_event(
                CreateEventRequest {
                    name: "RustConf".into(),
                    description: Some("Systems programming".into()),
                    venue: "Main Hall".into(),
                    starts_on: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                    ends_on: NaiveDate::from_ymd_opt(2026, 9, 3).unwrap(),
                },
                owner.id,
            )
            .await
            .unwrap()
    }

    pub async fn session_in(&self, event: &Event) -> ConferenceSession {
        self.repo
            .create_session(
                event.id,
                CreateSessionRequest {
                    title: "Ownership in practice".into(),
                    hall: Some("B".into()),
                    starts_at: at(2026, 9, 1, 10),
                    ends_at: at(2026, 9, 1, 11),
                },
            )
            .await
            .unwrap()
    }

    pub async fn grant(&self, user: &User, event: &Event, permission: Permission) {
        self.repo
            .grant_permission(user.id, event.id, permission, event.created_by)
            .await
            .unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Organizer => "organizer",
        Role::Faculty => "faculty",
        Role::Delegate => "delegate",
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

// --- Request Builders ---

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token, Body::empty(), None)
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    request("DELETE", uri, token, Body::empty(), None)
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    request(
        method,
        uri,
        token,
        Body::from(body.to_string()),
        Some("application/json".to_string()),
    )
}

pub const BOUNDARY: &str = "XPORTALBOUNDARY";

/// A multipart body with a single `file` field.
pub fn multipart(uri: &str, token: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    request(
        "POST",
        uri,
        Some(token),
        Body::from(body),
        Some(format!("multipart/form-data; boundary={BOUNDARY}")),
    )
}

fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Body,
    content_type: Option<String>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).unwrap()
}

// --- Response Helpers ---

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
