use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    mail::invitation_response_message,
    models::{
        ConferenceSession, Document, DocumentKind, DownloadLinkResponse, FacultyInvitation,
        InvitationStatus, NewDocument, RespondInvitationRequest,
    },
    storage::{DOWNLOAD_LINK_TTL, UploadPolicy, object_key},
    validation::{PathParams, ValidatedJson},
};

/// list_invitations
///
/// [Faculty Route] Every session the caller has been invited to, any status.
#[utoipa::path(
    get,
    path = "/api/faculty/invitations",
    responses((status = 200, description = "Invitations", body = [FacultyInvitation]))
)]
pub async fn list_invitations(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FacultyInvitation>>, ApiError> {
    Ok(Json(state.repo.list_faculty_invitations(user.id).await?))
}

/// respond_invitation
///
/// [Faculty Route] Accepts or declines a pending invitation. Only the invited
/// speaker may answer, and only once. The event creator is notified by mail;
/// a failed notification does not undo the answer.
#[utoipa::path(
    put,
    path = "/api/faculty/invitations/{session_id}",
    request_body = RespondInvitationRequest,
    params(("session_id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Answer recorded", body = ConferenceSession),
        (status = 400, description = "Status must be accepted or declined"),
        (status = 404, description = "No invitation for this caller"),
        (status = 409, description = "Invitation already answered")
    )
)]
pub async fn respond_invitation(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(session_id): PathParams<Uuid>,
    ValidatedJson(payload): ValidatedJson<RespondInvitationRequest>,
) -> Result<Json<ConferenceSession>, ApiError> {
    let current = state
        .repo
        .get_session(session_id)
        .await?
        .filter(|s| s.faculty_id == Some(user.id))
        .ok_or_else(|| ApiError::NotFound("invitation not found".into()))?;

    if current.invitation_status != Some(InvitationStatus::Pending) {
        return Err(ApiError::Conflict("invitation already answered".into()));
    }

    // A concurrent answer or re-assignment between the read and the update.
    let session = state
        .repo
        .respond_to_invitation(session_id, user.id, payload.status)
        .await?
        .ok_or_else(|| ApiError::Conflict("invitation is no longer pending".into()))?;

    tracing::info!(%session_id, faculty_id = %user.id, status = ?payload.status, "invitation answered");

    notify_organizer(&state, &user, &session, payload.status).await;

    Ok(Json(session))
}

async fn notify_organizer(
    state: &AppState,
    faculty: &AuthUser,
    session: &ConferenceSession,
    status: InvitationStatus,
) {
    let lookup = async {
        let event = state.repo.get_event(session.event_id).await?;
        let organizer = match &event {
            Some(event) => state.repo.get_user(event.created_by).await?,
            None => None,
        };
        let speaker = state.repo.get_user(faculty.id).await?;
        Ok::<_, sqlx::Error>(organizer.zip(speaker))
    };

    match lookup.await {
        Ok(Some((organizer, speaker))) => {
            let outcome = state
                .mailer
                .send(invitation_response_message(
                    &organizer, &speaker, session, status,
                ))
                .await;
            if !outcome.ok {
                tracing::warn!(session_id = %session.id, error = ?outcome.error, "response notification failed");
            }
        }
        Ok(None) => {
            tracing::warn!(session_id = %session.id, "no organizer to notify");
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "organizer lookup failed");
        }
    }
}

/// An uploaded file as read from the `file` field of a multipart body.
struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Bytes,
}

async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::field("file", format!("failed to read multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = display_name(field.file_name().unwrap_or("upload"));
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::field("file", format!("failed to read file: {e}")))?;

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::field("file", "a multipart field named 'file' is required"))
}

/// Keeps only the last path segment of a client-supplied name, capped at 255 chars.
fn display_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).take(255).collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned
    }
}

async fn store_document(
    state: &AppState,
    user: &AuthUser,
    kind: DocumentKind,
    session_id: Option<Uuid>,
    file: UploadedFile,
) -> Result<Document, ApiError> {
    let policy = UploadPolicy::for_kind(kind, &state.config.uploads);
    policy.check(&file.content_type, file.bytes.len())?;

    let content_type = file
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let key = object_key(user.id, kind, &content_type);
    let size_bytes = file.bytes.len() as i64;

    let storage_key = state.storage.put(&key, file.bytes, &content_type).await?;

    let created = state
        .repo
        .create_document(NewDocument {
            owner_id: user.id,
            session_id,
            kind,
            file_name: file.file_name,
            content_type,
            size_bytes,
            storage_key: storage_key.clone(),
        })
        .await;

    match created {
        Ok(document) => {
            tracing::info!(document_id = %document.id, owner_id = %user.id, kind = kind.as_str(), size_bytes, "document uploaded");
            Ok(document)
        }
        Err(e) => {
            // Orphaned object; the row never made it.
            state.storage.delete(&storage_key).await;
            Err(e.into())
        }
    }
}

/// upload_cv
///
/// [Faculty Route] Multipart upload (field `file`) of a CV. PDF, DOC or DOCX,
/// up to the configured CV ceiling.
#[utoipa::path(
    post,
    path = "/api/faculty/cv",
    request_body(content_type = "multipart/form-data", description = "Field `file`"),
    responses(
        (status = 201, description = "Stored", body = Document),
        (status = 400, description = "Missing file, disallowed type or too large")
    )
)]
pub async fn upload_cv(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let file = read_file_field(multipart).await?;
    let document = store_document(&state, &user, DocumentKind::Cv, None, file).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// upload_presentation
///
/// [Faculty Route] Multipart upload (field `file`) of slides for a session the
/// caller has accepted. PDF, PPT or PPTX, up to the presentation ceiling.
#[utoipa::path(
    post,
    path = "/api/faculty/sessions/{session_id}/presentation",
    request_body(content_type = "multipart/form-data", description = "Field `file`"),
    params(("session_id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 201, description = "Stored", body = Document),
        (status = 400, description = "Missing file, disallowed type or too large"),
        (status = 403, description = "Invitation not accepted"),
        (status = 404, description = "No invitation for this caller")
    )
)]
pub async fn upload_presentation(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(session_id): PathParams<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let session = state
        .repo
        .get_session(session_id)
        .await?
        .filter(|s| s.faculty_id == Some(user.id))
        .ok_or_else(|| ApiError::NotFound("invitation not found".into()))?;

    if session.invitation_status != Some(InvitationStatus::Accepted) {
        return Err(ApiError::forbidden());
    }

    let file = read_file_field(multipart).await?;
    let document = store_document(
        &state,
        &user,
        DocumentKind::Presentation,
        Some(session_id),
        file,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// list_documents
///
/// [Faculty Route] The caller's own uploads, newest first.
#[utoipa::path(
    get,
    path = "/api/faculty/documents",
    responses((status = 200, description = "Documents", body = [Document]))
)]
pub async fn list_documents(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.repo.list_documents(user.id).await?))
}

/// download_document
///
/// [Faculty Route] A short-lived signed link to one of the caller's documents.
/// Someone else's document answers 404.
#[utoipa::path(
    get,
    path = "/api/faculty/documents/{id}/download",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Signed link", body = DownloadLinkResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn download_document(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<DownloadLinkResponse>, ApiError> {
    let document = state
        .repo
        .get_document(id)
        .await?
        .filter(|d| d.owner_id == user.id)
        .ok_or_else(|| ApiError::NotFound("document not found".into()))?;

    let url = state.storage.download_url(&document.storage_key).await?;
    Ok(Json(DownloadLinkResponse {
        url,
        expires_in_secs: DOWNLOAD_LINK_TTL.as_secs(),
    }))
}

/// delete_document
///
/// [Faculty Route] Removes the row, then the stored file on a best-effort basis.
#[utoipa::path(
    delete,
    path = "/api/faculty/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_document(
    user: AuthUser,
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<StatusCode, ApiError> {
    let document = state
        .repo
        .delete_document(id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("document not found".into()))?;

    state.storage.delete(&document.storage_key).await;
    tracing::info!(document_id = %id, owner_id = %user.id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}
