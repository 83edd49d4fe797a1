//! # Workflow Requests
//!
//! Inputs for the facture and payment operations. Every request is validated
//! with [`validate`](ReceiveFacture::validate) before any store is touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{FactureStatus, PaymentMethod};
use crate::validation::{
    validate_amount, validate_date_order, validate_description, validate_document_refs,
    validate_invoice_number, validate_optional_text, validate_payment_amount, validate_quantity,
    validate_tax_rate_bps, ValidationResult,
};
use crate::{MAX_FACTURE_ITEMS, MAX_LINE_AMOUNT};

// =============================================================================
// Receive
// =============================================================================

/// A supplier invoice arriving with (optionally) its lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiveFacture {
    pub supplier_id: String,
    pub supplier_invoice_number: String,
    pub branch_id: Option<String>,
    pub purchase_order_number: Option<String>,
    pub delivery_note_number: Option<String>,
    pub invoice_date: NaiveDate,
    /// Explicit due date. Derived from the supplier's terms when absent.
    pub due_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    /// Explicit grand total. Must match the item-derived total when items are
    /// supplied; required when they are not.
    pub total_amount: Option<i64>,
    #[serde(default)]
    pub tax_amount: i64,
    #[serde(default)]
    pub discount_amount: i64,
    pub notes: Option<String>,
    #[serde(default)]
    pub supporting_documents: Vec<String>,
    #[serde(default)]
    pub items: Vec<NewFactureItem>,
}

impl ReceiveFacture {
    /// Field-level checks. Cross-checks against the supplier and the computed
    /// total happen in the service.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.supplier_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "supplier_id".to_string(),
            });
        }
        validate_invoice_number(&self.supplier_invoice_number)?;
        if let Some(due) = self.due_date {
            validate_date_order(self.invoice_date, due)?;
        }
        validate_amount("tax_amount", self.tax_amount)?;
        validate_amount("discount_amount", self.discount_amount)?;
        validate_optional_text("purchase_order_number", self.purchase_order_number.as_deref(), 100)?;
        validate_optional_text("delivery_note_number", self.delivery_note_number.as_deref(), 100)?;
        validate_optional_text("notes", self.notes.as_deref(), 2000)?;
        validate_document_refs(&self.supporting_documents)?;

        if self.items.len() > MAX_FACTURE_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "items".to_string(),
                min: 0,
                max: MAX_FACTURE_ITEMS as i64,
            });
        }
        for item in &self.items {
            item.validate()?;
        }

        if self.items.is_empty() && self.total_amount.is_none() {
            return Err(ValidationError::Required {
                field: "total_amount".to_string(),
            });
        }
        if let Some(total) = self.total_amount {
            if total <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "total_amount".to_string(),
                });
            }
            validate_amount("total_amount", total)?;
        }

        Ok(())
    }
}

/// One line on a new invoice, or appended to a Received one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFactureItem {
    pub product_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub discount_amount: i64,
}

impl NewFactureItem {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_description(&self.description)?;
        validate_quantity(self.quantity)?;
        validate_amount("unit_price", self.unit_price)?;
        validate_amount("discount_amount", self.discount_amount)?;
        validate_tax_rate_bps(self.tax_rate_bps)?;

        let gross = (self.quantity as i128) * (self.unit_price as i128);
        if gross > MAX_LINE_AMOUNT as i128 {
            return Err(line_amount_out_of_range());
        }
        if (self.discount_amount as i128) > gross {
            return Err(ValidationError::OutOfRange {
                field: "discount_amount".to_string(),
                min: 0,
                max: gross as i64,
            });
        }

        // Tax rounds half up on the discounted line
        let net = gross - self.discount_amount as i128;
        let tax = (net * self.tax_rate_bps as i128 + 5000) / 10000;
        if net + tax > MAX_LINE_AMOUNT as i128 {
            return Err(line_amount_out_of_range());
        }
        Ok(())
    }
}

fn line_amount_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "line amount".to_string(),
        min: 0,
        max: MAX_LINE_AMOUNT,
    }
}

// =============================================================================
// Verify / Update
// =============================================================================

/// Counted quantities for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemVerification {
    pub item_id: String,
    pub received_quantity: i64,
    pub accepted_quantity: i64,
}

impl ItemVerification {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.received_quantity < 0 {
            return Err(ValidationError::OutOfRange {
                field: "received_quantity".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        if self.accepted_quantity < 0 {
            return Err(ValidationError::OutOfRange {
                field: "accepted_quantity".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
        if self.accepted_quantity > self.received_quantity {
            return Err(ValidationError::AcceptedExceedsReceived {
                item_id: self.item_id.clone(),
                accepted: self.accepted_quantity,
                received: self.received_quantity,
            });
        }
        Ok(())
    }
}

/// Editable header fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFacture {
    pub due_date: Option<NaiveDate>,
    pub purchase_order_number: Option<String>,
    pub delivery_note_number: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl UpdateFacture {
    pub fn is_empty(&self) -> bool {
        self.due_date.is_none()
            && self.purchase_order_number.is_none()
            && self.delivery_note_number.is_none()
            && self.delivery_date.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        validate_optional_text("purchase_order_number", self.purchase_order_number.as_deref(), 100)?;
        validate_optional_text("delivery_note_number", self.delivery_note_number.as_deref(), 100)?;
        validate_optional_text("notes", self.notes.as_deref(), 2000)?;
        Ok(())
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePayment {
    pub amount: i64,
    pub scheduled_date: NaiveDate,
    pub method: PaymentMethod,
    pub bank_account: Option<String>,
    pub notes: Option<String>,
}

impl SchedulePayment {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_payment_amount(self.amount)?;
        validate_optional_text("bank_account", self.bank_account.as_deref(), 100)?;
        validate_optional_text("notes", self.notes.as_deref(), 2000)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessPayment {
    /// Defaults to the day of processing.
    pub payment_date: Option<NaiveDate>,
    /// Transfer or check number.
    pub reference_number: String,
    pub receipt_file: Option<String>,
}

impl ProcessPayment {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.reference_number.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "reference_number".to_string(),
            });
        }
        validate_optional_text("reference_number", Some(&self.reference_number), 100)?;
        validate_optional_text("receipt_file", self.receipt_file.as_deref(), 500)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePayment {
    pub bank_account: Option<String>,
    pub notes: Option<String>,
}

impl UpdatePayment {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.bank_account.is_none() && self.notes.is_none() {
            return Err(ValidationError::Required {
                field: "bank_account or notes".to_string(),
            });
        }
        validate_optional_text("bank_account", self.bank_account.as_deref(), 100)?;
        validate_optional_text("notes", self.notes.as_deref(), 2000)?;
        Ok(())
    }
}

// =============================================================================
// List Filter
// =============================================================================

/// Filters for the facture list. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactureFilter {
    pub status: Option<FactureStatus>,
    pub supplier_id: Option<String>,
    pub branch_id: Option<String>,
    pub invoice_date_from: Option<NaiveDate>,
    pub invoice_date_to: Option<NaiveDate>,
    /// Matches supplier or internal invoice numbers.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl FactureFilter {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    /// Limit clamped to `1..=200`.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Trimmed search text, `None` when blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn receive() -> ReceiveFacture {
        ReceiveFacture {
            supplier_id: "sup-1".to_string(),
            supplier_invoice_number: "INV-001".to_string(),
            invoice_date: date(2024, 1, 1),
            total_amount: Some(1_000_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_receive_requires_total_without_items() {
        let mut req = receive();
        assert!(req.validate().is_ok());

        req.total_amount = None;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::Required { ref field }) if field == "total_amount"
        ));
    }

    #[test]
    fn test_receive_rejects_due_before_invoice() {
        let mut req = receive();
        req.due_date = Some(date(2023, 12, 31));
        assert!(matches!(
            req.validate(),
            Err(ValidationError::DueBeforeInvoice { .. })
        ));
    }

    #[test]
    fn test_item_discount_cannot_exceed_gross() {
        let item = NewFactureItem {
            description: "Sugar".to_string(),
            quantity: 2,
            unit_price: 1_000,
            discount_amount: 2_001,
            ..Default::default()
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_item_line_amount_is_capped() {
        let mut item = NewFactureItem {
            description: "Generator".to_string(),
            quantity: 3,
            unit_price: i64::MAX / 2,
            ..Default::default()
        };
        assert!(matches!(
            item.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "unit_price"
        ));

        // Gross just under the cap, pushed over by tax
        item.quantity = 1;
        item.unit_price = MAX_LINE_AMOUNT;
        assert!(item.validate().is_ok());
        item.tax_rate_bps = 1100;
        assert!(matches!(
            item.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "line amount"
        ));

        item.quantity = 2;
        item.tax_rate_bps = 0;
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_declared_total_is_capped() {
        let mut req = receive();
        req.total_amount = Some(MAX_LINE_AMOUNT + 1);
        assert!(matches!(
            req.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "total_amount"
        ));
    }

    #[test]
    fn test_accepted_cannot_exceed_received() {
        let v = ItemVerification {
            item_id: "i1".to_string(),
            received_quantity: 5,
            accepted_quantity: 6,
        };
        assert!(matches!(
            v.validate(),
            Err(ValidationError::AcceptedExceedsReceived { .. })
        ));
    }

    #[test]
    fn test_filter_limit_is_clamped() {
        let mut filter = FactureFilter::default();
        assert_eq!(filter.effective_limit(), 50);

        filter.limit = Some(0);
        assert_eq!(filter.effective_limit(), 1);

        filter.limit = Some(10_000);
        assert_eq!(filter.effective_limit(), 200);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = FactureFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_term(), None);
    }
}
