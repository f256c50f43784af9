use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::{
    error::{ApiError, FieldError},
    models::{
        CreateEventRequest, CreateSessionRequest, InvitationStatus, OtpRequest, OtpVerifyRequest,
        RespondInvitationRequest, UpdateEventRequest,
    },
};

/// Request bodies that carry their own field-level rules.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// Collects field errors so a single 400 reports every problem at once.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.fail(
                field,
                format!("{field} must be between {min} and {max} characters (got {len})"),
            );
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        let value = value.trim();
        let well_formed = value.len() >= 3
            && value.len() <= 254
            && value
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
            && !value.contains(char::is_whitespace);
        if !well_formed {
            self.fail(field, "invalid email address");
        }
        self
    }

    pub fn require(&mut self, condition: bool, field: &str, message: &str) -> &mut Self {
        if !condition {
            self.fail(field, message);
        }
        self
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

impl Validate for CreateEventRequest {
    fn validate(&self) -> Result<(), ApiError> {
        Checks::new()
            .length("name", &self.name, 1, 200)
            .length("venue", &self.venue, 1, 200)
            .require(
                self.description.as_ref().is_none_or(|d| d.len() <= 5000),
                "description",
                "description must be at most 5000 characters",
            )
            .require(
                self.ends_on >= self.starts_on,
                "ends_on",
                "ends_on must not be before starts_on",
            )
            .finish()
    }
}

impl Validate for UpdateEventRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut checks = Checks::new();
        if let Some(name) = &self.name {
            checks.length("name", name, 1, 200);
        }
        if let Some(venue) = &self.venue {
            checks.length("venue", venue, 1, 200);
        }
        if let (Some(starts_on), Some(ends_on)) = (self.starts_on, self.ends_on) {
            checks.require(
                ends_on >= starts_on,
                "ends_on",
                "ends_on must not be before starts_on",
            );
        }
        checks.finish()
    }
}

impl Validate for CreateSessionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        Checks::new()
            .length("title", &self.title, 1, 300)
            .require(
                self.hall.as_ref().is_none_or(|h| h.len() <= 100),
                "hall",
                "hall must be at most 100 characters",
            )
            .require(
                self.ends_at > self.starts_at,
                "ends_at",
                "ends_at must be after starts_at",
            )
            .finish()
    }
}

impl Validate for RespondInvitationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        Checks::new()
            .require(
                self.status != InvitationStatus::Pending,
                "status",
                "status must be accepted or declined",
            )
            .finish()
    }
}

impl Validate for OtpRequest {
    fn validate(&self) -> Result<(), ApiError> {
        Checks::new().email("email", &self.email).finish()
    }
}

impl Validate for OtpVerifyRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let code = self.code.trim();
        Checks::new()
            .email("email", &self.email)
            .require(
                code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()),
                "code",
                "code must be 6 digits",
            )
            .finish()
    }
}

/// JsonBody
///
/// `Json<T>` whose rejections (malformed JSON, wrong content type, unknown
/// enum variants, missing fields) become a 400 on the `body` field.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::field("body", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// ValidatedJson
///
/// `JsonBody<T>` followed by `T::validate`. Malformed bodies and schema
/// mismatches surface as the same 400 shape as rule violations.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// `Path<T>` with unparsable segments reported on the `path` field.
pub struct PathParams<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: PathRejection| ApiError::field("path", rejection.body_text()))?;
        Ok(Self(value))
    }
}
