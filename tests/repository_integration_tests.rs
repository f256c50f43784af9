//! Runs against a real Postgres. Ignored by default:
//! `DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored`

use chrono::{NaiveDate, TimeZone, Utc};
use conference_portal::{
    ApiError,
    models::{
        CreateEventRequest, CreateSessionRequest, DocumentKind, EventStatus, InvitationStatus,
        NewDocument, Permission, Role, UpdateEventRequest, User,
    },
    repository::{PostgresRepository, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let has_schema: Option<String> =
            sqlx::query_scalar("SELECT to_regclass('public.users')::text")
                .fetch_one(&pool)
                .await
                .expect("Failed to inspect schema.");

        if has_schema.is_none() {
            sqlx::raw_sql(include_str!("../db/schema.sql"))
                .execute(&pool)
                .await
                .expect("Failed to apply db/schema.sql.");
        }

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

async fn create_test_user(pool: &PgPool, role: Role) -> User {
    let id = Uuid::new_v4();
    let email = format!("{}@integration.test", id);
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, name, role) VALUES ($1, $2, $3, $4)
         RETURNING id, email, name, role",
    )
    .bind(id)
    .bind(&email)
    .bind("Integration User")
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("Failed to insert test user")
}

fn event_request() -> CreateEventRequest {
    CreateEventRequest {
        name: "Integration Conf".into(),
        description: None,
        venue: "Lab".into(),
        starts_on: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        ends_on: NaiveDate::from_ymd_opt(2026, 6, 2).unwrap(),
    }
}

fn session_request() -> CreateSessionRequest {
    CreateSessionRequest {
        title: "Borrowing".into(),
        hall: Some("A".into()),
        starts_at: Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap(),
    }
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn test_user_lookup_by_email_is_case_insensitive() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let user = create_test_user(&ctx.pool, Role::Delegate).await;

    let found = repo
        .get_user_by_email(&user.email.to_uppercase())
        .await
        .unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    let promoted = repo.set_user_role(user.id, Role::Organizer).await.unwrap();
    assert_eq!(promoted.map(|u| u.role), Some(Role::Organizer));
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn test_event_lifecycle() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Organizer).await;

    let event = repo.create_event(event_request(), owner.id).await.unwrap();
    assert_eq!(event.status, EventStatus::Draft);

    let updated = repo
        .update_event(
            event.id,
            UpdateEventRequest {
                venue: Some("Auditorium".into()),
                ..UpdateEventRequest::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.venue, "Auditorium");
    assert_eq!(updated.name, event.name);

    let published = repo
        .set_event_status(event.id, EventStatus::Published)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.status, EventStatus::Published);
    assert!(
        repo.list_published_events()
            .await
            .unwrap()
            .iter()
            .any(|e| e.id == event.id)
    );

    assert!(repo.delete_event(event.id).await.unwrap());
    assert!(repo.get_event(event.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn test_invitation_only_answered_while_pending() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Organizer).await;
    let speaker = create_test_user(&ctx.pool, Role::Faculty).await;
    let event = repo.create_event(event_request(), owner.id).await.unwrap();
    let session = repo.create_session(event.id, session_request()).await.unwrap();

    repo.assign_faculty(session.id, speaker.id).await.unwrap();
    let invitations = repo.list_faculty_invitations(speaker.id).await.unwrap();
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0].event_name, "Integration Conf");

    let accepted = repo
        .respond_to_invitation(session.id, speaker.id, InvitationStatus::Accepted)
        .await
        .unwrap();
    assert!(accepted.is_some());

    let second = repo
        .respond_to_invitation(session.id, speaker.id, InvitationStatus::Declined)
        .await
        .unwrap();
    assert!(second.is_none());

    let roster = repo.event_roster(event.id).await.unwrap();
    assert_eq!(roster[0].faculty_email.as_deref(), Some(speaker.email.as_str()));
    assert_eq!(roster[0].invitation_status, Some(InvitationStatus::Accepted));
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn test_duplicate_grant_is_a_conflict() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Organizer).await;
    let helper = create_test_user(&ctx.pool, Role::Organizer).await;
    let event = repo.create_event(event_request(), owner.id).await.unwrap();

    repo.grant_permission(helper.id, event.id, Permission::Write, owner.id)
        .await
        .unwrap();
    let duplicate = repo
        .grant_permission(helper.id, event.id, Permission::Write, owner.id)
        .await
        .unwrap_err();
    assert!(matches!(ApiError::from(duplicate), ApiError::Conflict(_)));

    let visible = repo.list_events_for_user(helper.id).await.unwrap();
    assert!(visible.iter().any(|e| e.id == event.id));

    let grants = repo.list_grants(event.id).await.unwrap();
    assert_eq!(grants[0].user_email.as_deref(), Some(helper.email.as_str()));

    assert!(
        repo.revoke_permission(helper.id, event.id, Permission::Write)
            .await
            .unwrap()
    );
    assert!(
        repo.list_user_permissions(helper.id, event.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn test_documents_are_scoped_to_owner() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let owner = create_test_user(&ctx.pool, Role::Faculty).await;
    let other = create_test_user(&ctx.pool, Role::Faculty).await;

    let document = repo
        .create_document(NewDocument {
            owner_id: owner.id,
            session_id: None,
            kind: DocumentKind::Cv,
            file_name: "cv.pdf".into(),
            content_type: "application/pdf".into(),
            size_bytes: 3,
            storage_key: format!("documents/{}/cv/{}.pdf", owner.id, Uuid::new_v4()),
        })
        .await
        .unwrap();

    assert_eq!(repo.list_documents(owner.id).await.unwrap().len(), 1);
    assert!(repo.delete_document(document.id, other.id).await.unwrap().is_none());

    let removed = repo.delete_document(document.id, owner.id).await.unwrap();
    assert_eq!(removed.map(|d| d.storage_key), Some(document.storage_key));
}
