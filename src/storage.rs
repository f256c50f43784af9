use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Bytes;
use s3::presigning::PresigningConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::{config::UploadLimits, error::ApiError, models::DocumentKind};

/// How long a presigned download link stays valid.
pub const DOWNLOAD_LINK_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object store request failed: {0}")]
    Backend(String),
    #[error("object not found: {0}")]
    Missing(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

// 1. FileStore Contract
/// FileStore
///
/// The file-store contract: accept bytes plus metadata and return a retrievable
/// key, hand out time-limited download links, and delete on a best-effort basis.
/// The S3 client serves production; `MockFileStore` serves tests.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Ensures the configured bucket exists. Used for the local MinIO setup.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `key` and returns the key it was stored under.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str)
    -> Result<String, StorageError>;

    /// A signed URL allowing a client to download `key` for `DOWNLOAD_LINK_TTL`.
    async fn download_url(&self, key: &str) -> Result<String, StorageError>;

    /// Best effort: failures are logged, never surfaced.
    async fn delete(&self, key: &str);
}

// 2. The Real Implementation (S3/MinIO)
/// S3FileStore
///
/// `FileStore` over the AWS SDK. `force_path_style(true)` is required for MinIO.
#[derive(Clone)]
pub struct S3FileStore {
    client: s3::Client,
    bucket_name: String,
}

impl S3FileStore {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket only errors; nothing to handle.
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .body(s3::primitives::ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(key.to_string())
    }

    async fn download_url(&self, key: &str) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(DOWNLOAD_LINK_TTL)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self
            .client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            tracing::warn!(%key, error = %e, "failed to delete stored object");
        }
    }
}

/// sanitize_key
///
/// Strips directory navigation (`..`, `.`) and empty segments from a key.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// object_key
///
/// Server-side key for a new upload: `documents/{owner}/{kind}/{uuid}.{ext}`.
/// Nothing user-supplied ends up in the key.
pub fn object_key(owner: Uuid, kind: DocumentKind, content_type: &str) -> String {
    format!(
        "documents/{}/{}/{}.{}",
        owner,
        kind.as_str(),
        Uuid::new_v4(),
        extension_for(content_type)
    )
}

pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        _ => "bin",
    }
}

/// UploadPolicy
///
/// MIME allow-list plus size ceiling for one upload kind.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub allowed_types: Vec<&'static str>,
    pub max_bytes: usize,
}

impl UploadPolicy {
    pub fn cv(limits: &UploadLimits) -> Self {
        Self {
            allowed_types: vec![
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ],
            max_bytes: limits.cv_max_bytes,
        }
    }

    pub fn presentation(limits: &UploadLimits) -> Self {
        Self {
            allowed_types: vec![
                "application/pdf",
                "application/vnd.ms-powerpoint",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            ],
            max_bytes: limits.presentation_max_bytes,
        }
    }

    pub fn for_kind(kind: DocumentKind, limits: &UploadLimits) -> Self {
        match kind {
            DocumentKind::Cv => Self::cv(limits),
            DocumentKind::Presentation => Self::presentation(limits),
        }
    }

    /// Rejects a disallowed MIME type or an oversized or empty file with a 400.
    pub fn check(&self, content_type: &str, size: usize) -> Result<(), ApiError> {
        // Parameters such as `; charset=` are not part of the type.
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !self.allowed_types.iter().any(|t| *t == essence) {
            return Err(ApiError::field(
                "file",
                format!(
                    "file type '{essence}' is not allowed; expected one of: {}",
                    self.allowed_types.join(", ")
                ),
            ));
        }
        if size == 0 {
            return Err(ApiError::field("file", "file is empty"));
        }
        if size > self.max_bytes {
            return Err(ApiError::field(
                "file",
                format!("file exceeds the maximum size of {} bytes", self.max_bytes),
            ));
        }
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockFileStore
///
/// In-memory `FileStore` used by tests. Keeps stored objects so assertions can
/// inspect them.
#[derive(Clone, Default)]
pub struct MockFileStore {
    /// When true, `put` and `download_url` return a simulated failure.
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, (Bytes, String)>>>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn ensure_bucket_exists(&self) {}

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        let key = sanitize_key(key);
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.clone(), (bytes, content_type.to_string()));
        }
        Ok(key)
    }

    async fn download_url(&self, key: &str) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        let key = sanitize_key(key);
        if !self.contains(&key) {
            return Err(StorageError::Missing(key));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            key
        ))
    }

    async fn delete(&self, key: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(&sanitize_key(key));
        }
    }
}

/// StorageState
///
/// The concrete type used to share the file store across the application state.
pub type StorageState = Arc<dyn FileStore>;
