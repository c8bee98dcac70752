use http::StatusCode;
use rust_decimal::Decimal;
use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Structured error payload handed to the outer request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable classification (e.g. "validation_error", "not_found")
    pub kind: ErrorKind,
    /// Human-readable error description
    pub message: String,
    /// Extra structured detail, e.g. the offending lines of an over-receipt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error was produced
    pub timestamp: String,
}

/// Coarse classification used by callers to decide between retrying, fixing
/// input or escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    StateConflict,
    OverReceipt,
    Conflict,
    NotFound,
    Forbidden,
    PersistenceError,
}

/// One receipt line that would push a purchase order line past its ordered quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverReceiptLine {
    pub purchase_order_line_id: Uuid,
    pub ordered: Decimal,
    pub already_received: Decimal,
    pub requested: Decimal,
}

impl OverReceiptLine {
    pub fn remaining(&self) -> Decimal {
        self.ordered - self.already_received
    }
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Over-receipt: {} line(s) exceed the remaining ordered quantity", .0.len())]
    OverReceipt(Vec<OverReceiptLine>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    pub fn not_found(entity: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    /// Returns true when the underlying store reported a unique-key violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            ServiceError::DatabaseError(err)
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::ValidationError,
            Self::StateConflict(_) => ErrorKind::StateConflict,
            Self::OverReceipt(_) => ErrorKind::OverReceipt,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                ErrorKind::PersistenceError
            }
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::StateConflict(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::OverReceipt(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Persistence failures roll back completely, so the caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::PersistenceError
    }

    /// Returns the error message suitable for external callers.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            Self::OverReceipt(lines) => serde_json::to_value(lines).ok(),
            _ => None,
        };

        ErrorResponse {
            kind: self.kind(),
            message: self.response_message(),
            details,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
