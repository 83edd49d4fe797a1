//! # Service and API Errors
//!
//! The workflow error taxonomy and its serializable form for callers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Back Office                        │
//! │                                                                         │
//! │  ValidationError (core) ──────────────────────┐                        │
//! │  DbError (db)                                  │                        │
//! │    ├── NotFound ─────────────────────────────┐ │                        │
//! │    ├── Rejected(CoreError) ─────────────────┐│ │                        │
//! │    ├── UniqueViolation ────────────────────┐││ │                        │
//! │    ├── Busy / PoolExhausted (after retry) ┐│││ │                        │
//! │    └── anything else ────────────────────┐││││ │                        │
//! │  DirectoryError ────────────────────────┐│││││ │                        │
//! │                                          ▼▼▼▼▼▼ ▼                        │
//! │                                   ServiceError                          │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                         ApiError { code, message }                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use facture_core::{CoreError, ValidationError};
use facture_db::DbError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::directory::DirectoryError;

/// Workflow errors returned by [`crate::FactureService`].
///
/// Out-of-scope records are reported as `NotFound`, exactly like absent ones.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{0}")]
    InvalidTransition(String),

    /// Transient store contention that outlived the retry budget, or a
    /// record changed underneath a guarded write.
    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    /// Supplier or user directory failed.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { .. } => ServiceError::InvalidTransition(err.to_string()),
            CoreError::Overpayment { .. } => ServiceError::Validation(err.to_string()),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        if err.is_duplicate_supplier_invoice() {
            return ServiceError::Validation(
                "supplier invoice number already received for this supplier".to_string(),
            );
        }
        if err.is_transient() {
            return ServiceError::ConcurrencyConflict(err.to_string());
        }

        match err {
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DbError::Rejected(core) => core.into(),
            stale @ DbError::StaleState { .. } => ServiceError::ConcurrencyConflict(stale.to_string()),
            DbError::UniqueViolation { field, .. } => {
                ServiceError::Validation(format!("{} already exists", field))
            }
            DbError::ForeignKeyViolation { message } => ServiceError::Validation(message),
            other => {
                error!(error = %other, "Database operation failed");
                ServiceError::Database(other.to_string())
            }
        }
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        ServiceError::DependencyUnavailable(err.to_string())
    }
}

// =============================================================================
// API Error
// =============================================================================

/// Error body handed to callers of the back office.
///
/// ```json
/// {
///   "code": "INVALID_TRANSITION",
///   "message": "facture 3f2a... is paid, cannot cancel"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found or outside the caller's branch (404)
    NotFound,

    /// Guard rejected the transition (409)
    InvalidTransition,

    /// Contention outlived the retry budget (409)
    ConcurrencyConflict,

    /// Directory dependency failed (503)
    DependencyUnavailable,

    /// Database operation failed (500)
    DatabaseError,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = match &err {
            ServiceError::Validation(_) => ErrorCode::ValidationError,
            ServiceError::NotFound { .. } => ErrorCode::NotFound,
            ServiceError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            ServiceError::ConcurrencyConflict(_) => ErrorCode::ConcurrencyConflict,
            ServiceError::DependencyUnavailable(_) => ErrorCode::DependencyUnavailable,
            ServiceError::Database(_) => ErrorCode::DatabaseError,
        };
        let message = match err {
            // Store internals stay in the logs
            ServiceError::Database(_) => "Database operation failed".to_string(),
            other => other.to_string(),
        };
        ApiError::new(code, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_taxonomy() {
        let err: ServiceError = DbError::Rejected(CoreError::InvalidTransition {
            entity: "facture",
            id: "f-1".to_string(),
            status: "paid".to_string(),
            action: "cancel",
        })
        .into();
        assert!(matches!(err, ServiceError::InvalidTransition(ref m) if m.contains("cannot cancel")));

        let err: ServiceError = DbError::Rejected(CoreError::Overpayment {
            outstanding: 10,
            requested: 20,
        })
        .into();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let err: ServiceError = DbError::Busy("database is locked".into()).into();
        assert!(matches!(err, ServiceError::ConcurrencyConflict(_)));

        let err: ServiceError = DbError::duplicate(
            "factures.supplier_id, factures.supplier_invoice_number",
            "unknown",
        )
        .into();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err: ServiceError = DbError::not_found("facture", "f-1").into();
        assert!(matches!(err, ServiceError::NotFound { .. }));

        let err: ServiceError = DirectoryError::Unavailable("timeout".into()).into();
        assert!(matches!(err, ServiceError::DependencyUnavailable(_)));
    }

    #[test]
    fn test_api_error_serialization() {
        let api: ApiError = ServiceError::not_found("facture", "f-1").into();
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "facture not found: f-1");

        let api: ApiError = ServiceError::Database("disk I/O error".into()).into();
        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert!(!api.message.contains("disk"));
    }
}
