//! # Error Types
//!
//! Domain-specific error types for facture-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  facture-core errors (this file)                                       │
//! │  ├── CoreError        - Guard failures, overpayment                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  facture-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  backoffice errors (in app)                                            │
//! │  ├── ServiceError     - Workflow taxonomy (NotFound, Conflict, ...)    │
//! │  └── ApiError         - What callers see (serialized)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → ApiError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A transition guard rejected the action.
    ///
    /// ## When This Occurs
    /// - Verifying a facture that is not Received
    /// - Approving below the threshold
    /// - Cancelling a PartiallyPaid facture
    /// - Confirming a payment that was never processed
    #[error("{entity} {id} is {status}, cannot {action}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: String,
        action: &'static str,
    },

    /// A payment would push `paid_amount` above `total_amount`.
    #[error("Payment of {requested} exceeds outstanding amount {outstanding}")]
    Overpayment { outstanding: i64, requested: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write. Every variant maps to the `Validation` class of
/// the service taxonomy.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid reference number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., supplier invoice number already received).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    #[error("due date {due_date} is before invoice date {invoice_date}")]
    DueBeforeInvoice {
        invoice_date: NaiveDate,
        due_date: NaiveDate,
    },

    #[error("item {item_id}: accepted quantity {accepted} exceeds received {received}")]
    AcceptedExceedsReceived {
        item_id: String,
        accepted: i64,
        received: i64,
    },

    /// Explicit total disagrees with the total derived from the items.
    #[error("total_amount {declared} does not match item total {computed}")]
    TotalMismatch { declared: i64, computed: i64 },

    /// The referenced record does not exist (supplier, item).
    #[error("{field} '{value}' does not exist")]
    UnknownReference { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            entity: "facture",
            id: "f-1".to_string(),
            status: "partially_paid".to_string(),
            action: "cancel",
        };
        assert_eq!(err.to_string(), "facture f-1 is partially_paid, cannot cancel");

        let err = CoreError::Overpayment {
            outstanding: 400_000,
            requested: 500_000,
        };
        assert_eq!(
            err.to_string(),
            "Payment of 500000 exceeds outstanding amount 400000"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "supplier_invoice_number".to_string(),
        };
        assert_eq!(err.to_string(), "supplier_invoice_number is required");

        let err = ValidationError::DueBeforeInvoice {
            invoice_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "due date 2024-01-01 is before invoice date 2024-01-10"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
