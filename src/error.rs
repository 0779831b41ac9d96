/// Unified error types for larkm
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which uniqueness or immutability rule a write ran into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Identifier already belongs to another ARK
    Identifier(String),
    /// Target already belongs to another ARK
    Target(String),
    /// Path and body name different ARKs, or the ARK itself already exists
    ArkString(String),
    /// Attempt to write the system-assigned `where` field
    Where,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Identifier(id) => write!(f, "Identifier {} already in use.", id),
            ConflictKind::Target(target) => write!(f, "Target {} already in use.", target),
            ConflictKind::ArkString(detail) => write!(f, "{}", detail),
            ConflictKind::Where => write!(f, "The value of 'where' cannot be updated."),
        }
    }
}

/// Main error type for larkm
#[derive(Error, Debug)]
pub enum LarkmError {
    /// Caller is not trusted, presented a bad key, or may not see a private shoulder
    #[error("{0}")]
    Forbidden(String),

    /// A required field is absent or empty
    #[error("{0}")]
    MissingField(String),

    /// Shoulder is not in the allow-list
    #[error("Provided shoulder {0} is invalid.")]
    InvalidShoulder(String),

    /// NAAN is not in the allow-list
    #[error("Provided NAAN {0} is invalid.")]
    InvalidNaan(String),

    /// Client-supplied identifier is neither a UUIDv4 nor 12 lowercase hex chars
    #[error("Provided identifier {0} is invalid.")]
    InvalidIdentifier(String),

    /// ARK string or resolution path cannot be normalized
    #[error("{0}")]
    InvalidFormat(String),

    /// Search query cannot be parsed
    #[error("{0}")]
    InvalidQuery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Uniqueness or immutability violation
    #[error("{0}")]
    Conflict(ConflictKind),

    /// Not found errors
    #[error("{0}")]
    NotFound(String),

    /// Database errors
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl LarkmError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            LarkmError::Forbidden(_) => StatusCode::FORBIDDEN,
            LarkmError::MissingField(_)
            | LarkmError::InvalidShoulder(_)
            | LarkmError::InvalidNaan(_)
            | LarkmError::InvalidIdentifier(_)
            | LarkmError::InvalidFormat(_)
            | LarkmError::InvalidQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LarkmError::Conflict(_) => StatusCode::CONFLICT,
            LarkmError::NotFound(_) => StatusCode::NOT_FOUND,
            LarkmError::Config(_)
            | LarkmError::Storage(_)
            | LarkmError::Migration(_)
            | LarkmError::Io(_)
            | LarkmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Extractor rejections are client input errors and answer in the same
// `{"detail"}` shape as every other validation failure.
impl From<JsonRejection> for LarkmError {
    fn from(rejection: JsonRejection) -> Self {
        LarkmError::InvalidFormat(rejection.body_text())
    }
}

impl From<QueryRejection> for LarkmError {
    fn from(rejection: QueryRejection) -> Self {
        LarkmError::InvalidQuery(rejection.body_text())
    }
}

impl From<PathRejection> for LarkmError {
    fn from(rejection: PathRejection) -> Self {
        LarkmError::InvalidFormat(rejection.body_text())
    }
}

/// Convert LarkmError to HTTP response
impl IntoResponse for LarkmError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

/// Result type alias for larkm operations
pub type LarkmResult<T> = Result<T, LarkmError>;
