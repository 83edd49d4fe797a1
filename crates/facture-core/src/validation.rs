//! # Validation Module
//!
//! Input validation for the facture workflow.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request structs (requests.rs)                                │
//! │  └── THIS MODULE: field rules, run before any I/O                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: FactureService                                               │
//! │  ├── Supplier exists, explicit total matches items                     │
//! │  └── Lifecycle guards (lifecycle.rs)                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (supplier_id, supplier_invoice_number)                     │
//! │  ├── CHECK paid_amount BETWEEN 0 AND total_amount                      │
//! │  └── CHECK due_date >= invoice_date                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use facture_core::validation::{validate_invoice_number, validate_quantity};
//!
//! assert!(validate_invoice_number("INV/2024/001").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_AMOUNT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted dispute/cancel/failure reason.
pub const MAX_REASON_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a supplier invoice number.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Printable characters only (suppliers use `/`, `-`, `.` freely)
///
/// ## Example
/// ```rust
/// use facture_core::validation::validate_invoice_number;
///
/// assert!(validate_invoice_number("SUP-0042").is_ok());
/// assert!(validate_invoice_number("").is_err());
/// assert!(validate_invoice_number("A\tB").is_err());
/// ```
pub fn validate_invoice_number(number: &str) -> ValidationResult<()> {
    let number = number.trim();

    if number.is_empty() {
        return Err(ValidationError::Required {
            field: "supplier_invoice_number".to_string(),
        });
    }

    if number.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "supplier_invoice_number".to_string(),
            max: 50,
        });
    }

    if number.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: "supplier_invoice_number".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates an item description.
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a dispute, cancellation or failure reason.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_REASON_LEN`] characters
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(reason.to_string())
}

/// Validates an optional free-text field against a maximum length.
pub fn validate_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates supporting document references.
pub fn validate_document_refs(refs: &[String]) -> ValidationResult<()> {
    if refs.len() > 20 {
        return Err(ValidationError::OutOfRange {
            field: "supporting_documents".to_string(),
            min: 0,
            max: 20,
        });
    }
    for doc in refs {
        if doc.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "supporting_documents".to_string(),
            });
        }
        validate_optional_text("supporting_documents", Some(doc), 500)?;
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an ordered quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in minor units (prices, discounts, tax, totals).
///
/// ## Rules
/// - Must not be negative
/// - Must not exceed MAX_LINE_AMOUNT
///
/// ## Example
/// ```rust
/// use facture_core::validation::validate_amount;
/// use facture_core::MAX_LINE_AMOUNT;
///
/// assert!(validate_amount("unit_price", 0).is_ok());
/// assert!(validate_amount("unit_price", -1).is_err());
/// assert!(validate_amount("unit_price", MAX_LINE_AMOUNT + 1).is_err());
/// ```
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if !(0..=MAX_LINE_AMOUNT).contains(&amount) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LINE_AMOUNT,
        });
    }

    Ok(())
}

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_payment_amount(amount: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Due date may not precede the invoice date.
pub fn validate_date_order(invoice_date: NaiveDate, due_date: NaiveDate) -> ValidationResult<()> {
    if due_date < invoice_date {
        return Err(ValidationError::DueBeforeInvoice {
            invoice_date,
            due_date,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_invoice_number() {
        assert!(validate_invoice_number("INV/2024/001").is_ok());
        assert!(validate_invoice_number("  FAC-9  ").is_ok());

        assert!(validate_invoice_number("").is_err());
        assert!(validate_invoice_number("   ").is_err());
        assert!(validate_invoice_number(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_reason_trims() {
        assert_eq!(validate_reason("  short delivery ").unwrap(), "short delivery");
        assert!(validate_reason("").is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LEN + 1)).is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LEN)).is_ok());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount("tax_amount", 0).is_ok());
        assert!(validate_amount("tax_amount", MAX_LINE_AMOUNT).is_ok());

        assert!(validate_amount("tax_amount", -1).is_err());
        assert!(validate_amount("tax_amount", i64::MAX).is_err());
    }

    #[test]
    fn test_validate_date_order() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        assert!(validate_date_order(jan1, jan31).is_ok());
        assert!(validate_date_order(jan1, jan1).is_ok());
        assert!(validate_date_order(jan31, jan1).is_err());
    }

    #[test]
    fn test_validate_document_refs() {
        assert!(validate_document_refs(&[]).is_ok());
        assert!(validate_document_refs(&["scan/inv-1.pdf".to_string()]).is_ok());
        assert!(validate_document_refs(&[" ".to_string()]).is_err());
    }
}
