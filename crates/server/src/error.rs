// Error taxonomy for event handling and the HTTP envelope for transport
// failures.

use std::future::Future;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use folio_common::types::Access;
use serde_json::json;
use thiserror::Error;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Failure while servicing one event.
///
/// Every variant is rendered as a short reply; none of them is fatal to the
/// process.
#[derive(Debug, Error)]
pub enum FolioError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied ({} access)", .0.as_str())]
    PermissionDenied(Access),

    #[error("administrator capability required")]
    AdminRequired,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage call `{0}` timed out")]
    Timeout(&'static str),

    #[error("uniqueness conflict")]
    Conflict,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FolioError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(error: impl Into<anyhow::Error>) -> Self {
        Self::Internal(error.into())
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::PermissionDenied(_) | Self::AdminRequired => ErrorCode::PermissionDenied,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Conflict => ErrorCode::Conflict,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub const fn retryable(&self) -> bool {
        self.code().retryable()
    }

    /// Text shown to the actor. Internal details never leak into it.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::PermissionDenied(Access::Read) => {
                "You do not have permission to read that.".to_string()
            }
            Self::PermissionDenied(Access::Write) => {
                "You do not have permission to change that.".to_string()
            }
            Self::AdminRequired => "Only server administrators can manage permissions.".to_string(),
            Self::NotFound(what) => format!("{} not found.", capitalize(what)),
            Self::Timeout(_) => "Storage is not responding right now. Try again.".to_string(),
            Self::Conflict => "Someone else changed that at the same time. Try again.".to_string(),
            Self::Internal(_) => "Command error.".to_string(),
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Map a sqlx failure: unique violations become [`FolioError::Conflict`].
pub fn map_sqlx_error(error: sqlx::Error) -> FolioError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.code().as_deref() == Some("23505") {
            return FolioError::Conflict;
        }
    }
    FolioError::internal(error)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    AuthInvalidToken,
    PermissionDenied,
    NotFound,
    Timeout,
    Conflict,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::AuthInvalidToken => "AUTH_INVALID_TOKEN",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "STORAGE_TIMEOUT",
            Self::Conflict => "CONFLICT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::AuthInvalidToken => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Conflict | Self::InternalError)
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ValidationFailed => "request validation failed",
            Self::AuthInvalidToken => "invalid gateway token",
            Self::PermissionDenied => "caller lacks required permission",
            Self::NotFound => "requested resource not found",
            Self::Timeout => "storage did not respond in time",
            Self::Conflict => "resource already exists",
            Self::InternalError => "internal server error",
        }
    }
}

/// Transport-level failure rendered as the JSON error envelope.
#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), request_id: None }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub const fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.or_else(current_request_id);

        let mut response = (
            self.code.status(),
            Json(json!({
                "error": {
                    "code": self.code.as_str(),
                    "message": self.message,
                    "retryable": self.code.retryable(),
                    "request_id": request_id.clone(),
                }
            })),
        )
            .into_response();

        if let Some(request_id) = request_id {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
        }

        response
    }
}

pub async fn with_request_id_scope<F>(request_id: String, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}
