//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Guard failure inside a tx         │
//! │       │                                   (facture_core::CoreError)    │
//! │       ▼                                        │                        │
//! │  DbError (this module) ◄───────────────────────┘                        │
//! │       │   is_transient()? ──► retried by retry.rs                      │
//! │       ▼                                                                 │
//! │  ServiceError (in backoffice) ← Workflow taxonomy                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError { code, message }                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use facture_core::CoreError;
use thiserror::Error;

/// SQLite result codes that mean "try again": BUSY, LOCKED and their
/// extended forms (BUSY_RECOVERY, BUSY_SNAPSHOT, LOCKED_SHAREDCACHE).
const TRANSIENT_SQLITE_CODES: &[&str] = &["5", "6", "261", "262", "517"];

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for the service layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database (or outside the caller's scope).
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - Facture belongs to a branch the actor cannot see
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Same supplier invoice number received twice for one supplier
    /// - Reference number collision (should be impossible with the counter)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. `paid_amount <= total_amount`).
    #[error("Check constraint failed: {0}")]
    CheckViolation(String),

    /// A status-guarded UPDATE matched no row: another writer moved the
    /// record between read and write.
    #[error("{entity} {id} changed concurrently")]
    StaleState { entity: String, id: String },

    /// A lifecycle guard or amount rule rejected the write inside the
    /// transaction.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// SQLITE_BUSY / SQLITE_LOCKED. Safe to retry.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn stale(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::StaleState {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether re-running the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }

    /// Unique violation on the `(supplier_id, supplier_invoice_number)` index.
    pub fn is_duplicate_supplier_invoice(&self) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. }
            if field.contains("supplier_invoice_number"))
    }
}

fn is_busy_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("database is busy")
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code 5/6/… → Busy, else analyze message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                let code = db_err.code();

                if code
                    .as_deref()
                    .map(|c| TRANSIENT_SQLITE_CODES.contains(&c))
                    .unwrap_or(false)
                    || is_busy_message(msg)
                {
                    return DbError::Busy(msg.to_string());
                }

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>, ..."
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.split("UNIQUE constraint failed: ").nth(1) {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<facture_core::ValidationError> for DbError {
    fn from(err: facture_core::ValidationError) -> Self {
        DbError::Rejected(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
