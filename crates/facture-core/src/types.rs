//! # Domain Types
//!
//! Records and enums shared by every layer of the back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │     Facture      │   │   FactureItem    │   │  FacturePayment  │    │
//! │  │  ──────────────  │ 1 │  ──────────────  │   │  ──────────────  │    │
//! │  │  id (UUID)       │──►│  facture_id (FK) │   │  facture_id (FK) │    │
//! │  │  internal ref    │ * │  quantity        │   │  amount          │    │
//! │  │  supplier inv #  │   │  unit_price      │   │  status          │    │
//! │  │  total / paid    │──────────────────────────►  method          │    │
//! │  └──────────────────┘   └──────────────────┘ * └──────────────────┘    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │  FactureStatus   │   │  PaymentStatus   │   │  PaymentMethod   │    │
//! │  │  Received        │   │  Scheduled       │   │  BankTransfer    │    │
//! │  │  Verified        │   │  Processed       │   │  Check           │    │
//! │  │  Approved        │   │  Confirmed       │   │  Cash            │    │
//! │  │  PartiallyPaid   │   │  Failed          │   │  Giro            │    │
//! │  │  Paid            │   └──────────────────┘   └──────────────────┘    │
//! │  │  Disputed        │                                                   │
//! │  │  Cancelled       │                                                   │
//! │  └──────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! A facture carries three identifiers:
//! - `id`: UUID v4, immutable, used for relations
//! - `internal_reference_number`: `INT-FAC-2024-00042`, assigned once at receive
//! - `supplier_invoice_number`: the supplier's own number, unique per supplier

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::ValidationResult;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1100 bps = 11% (standard VAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Facture Status
// =============================================================================

/// Where a facture is in its lifecycle.
///
/// ## State Machine
/// ```text
/// ┌──────────┐ verify ┌──────────┐ approve ┌──────────┐
/// │ Received │───────►│ Verified │────────►│ Approved │
/// └────▲─────┘        └────┬─────┘         └────┬─────┘
///      │                   │ confirm (below     │ confirm
///      │ resume            │ threshold)         ▼
/// ┌────┴─────┐             │          ┌───────────────┐ confirm ┌──────┐
/// │ Disputed │             └─────────►│ PartiallyPaid │────────►│ Paid │
/// └──────────┘                        └───────────────┘         └──────┘
///
///  Disputed: from any non-terminal state except itself
///  Cancelled: from Received, Verified, Approved, Disputed (nothing paid)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FactureStatus {
    /// Goods and invoice received, not yet checked.
    Received,
    /// Items checked against the delivery.
    Verified,
    /// Signed off for payment (required at/above the approval threshold).
    Approved,
    /// Some, but not all, of the total has been paid.
    PartiallyPaid,
    /// Fully paid. Terminal.
    Paid,
    /// On hold pending resolution with the supplier.
    Disputed,
    /// Withdrawn before any payment. Terminal.
    Cancelled,
}

impl FactureStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [FactureStatus; 7] = [
        FactureStatus::Received,
        FactureStatus::Verified,
        FactureStatus::Approved,
        FactureStatus::PartiallyPaid,
        FactureStatus::Paid,
        FactureStatus::Disputed,
        FactureStatus::Cancelled,
    ];

    /// The stored representation, matching the `sqlx` encoding.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FactureStatus::Received => "received",
            FactureStatus::Verified => "verified",
            FactureStatus::Approved => "approved",
            FactureStatus::PartiallyPaid => "partially_paid",
            FactureStatus::Paid => "paid",
            FactureStatus::Disputed => "disputed",
            FactureStatus::Cancelled => "cancelled",
        }
    }

    /// Paid and Cancelled forbid any further financial mutation.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, FactureStatus::Paid | FactureStatus::Cancelled)
    }

    /// Counts toward outstanding/overdue figures.
    pub const fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl Default for FactureStatus {
    fn default() -> Self {
        FactureStatus::Received
    }
}

impl fmt::Display for FactureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactureStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactureStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: FactureStatus::ALL
                    .iter()
                    .map(|status| status.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Payment Status & Method
// =============================================================================

/// Where a payment is in its lifecycle.
///
/// `Scheduled → Processed → Confirmed`, with `Failed` reachable from either
/// of the first two. Confirmed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Scheduled,
    Processed,
    Confirmed,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Scheduled => "scheduled",
            PaymentStatus::Processed => "processed",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Failed)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Scheduled
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Bank transfer to the supplier's account.
    BankTransfer,
    /// Paper check.
    Check,
    /// Cash handed over at delivery.
    Cash,
    /// Giro / bilyet giro.
    Giro,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Giro => "giro",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::BankTransfer
    }
}

// =============================================================================
// Roles & Actors
// =============================================================================

/// Back-office role of the acting user.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sees and acts on every branch.
    Admin,
    Manager,
    Staff,
}

impl Role {
    /// Elevated roles are not branch-restricted.
    pub const fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// The user on whose behalf an operation runs, as resolved from the user
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Actor {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "id"))]
    pub user_id: String,
    pub role: Role,
    /// Home branch. `None` for unassigned users.
    pub branch_id: Option<String>,
}

/// Supplier record as seen by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: String,
    pub company_name: String,
    /// Days from invoice date to due date.
    pub payment_terms_days: i64,
    /// Informational only. Not enforced by the workflow.
    pub credit_limit: i64,
}

// =============================================================================
// Facture
// =============================================================================

/// A supplier invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Facture {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub supplier_id: String,

    /// The supplier's own invoice number. Unique per supplier.
    pub supplier_invoice_number: String,

    /// `INT-FAC-<year>-<seq>`. Globally unique, never changes.
    pub internal_reference_number: String,

    /// Receiving branch. `None` means the invoice belongs to every branch.
    pub branch_id: Option<String>,

    pub purchase_order_number: Option<String>,
    pub delivery_note_number: Option<String>,

    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub delivery_date: Option<NaiveDate>,

    /// Grand total in minor units.
    pub total_amount: i64,
    /// Header-level tax added on top of the item lines.
    pub tax_amount: i64,
    /// Header-level discount taken off the item lines.
    pub discount_amount: i64,
    /// Sum of confirmed payments.
    pub paid_amount: i64,

    /// Whether `total_amount` is derived from the items (and re-derived
    /// when an item is added).
    pub total_from_items: bool,

    pub status: FactureStatus,

    pub received_by: String,
    pub received_at: DateTime<Utc>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub dispute_reason: Option<String>,
    /// Free-text history: approval notes, dispute/cancel reasons.
    pub notes: Option<String>,
    /// References to scanned documents (file keys or URLs).
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub supporting_documents: Vec<String>,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl Facture {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_amount)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_minor(self.paid_amount)
    }

    /// `total − paid`, never negative.
    #[inline]
    pub fn outstanding(&self) -> Money {
        self.total().saturating_sub(self.paid())
    }
}

// =============================================================================
// Facture Item
// =============================================================================

/// One ordered line on a facture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FactureItem {
    pub id: String,
    pub facture_id: String,
    /// 1-based position on the invoice.
    pub line_no: i64,
    pub product_id: Option<String>,
    pub description: String,
    /// Ordered quantity.
    pub quantity: i64,
    pub unit_price: i64,
    pub tax_rate_bps: u32,
    pub discount_amount: i64,
    /// Counted at the dock during verification.
    pub received_quantity: Option<i64>,
    /// Accepted after inspection. Never above `received_quantity`.
    pub accepted_quantity: Option<i64>,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FactureItem {
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// `quantity × unit_price − discount`.
    pub fn line_total(&self) -> ValidationResult<Money> {
        crate::calc::line_total(
            self.quantity,
            Money::from_minor(self.unit_price),
            Money::from_minor(self.discount_amount),
        )
    }

    pub fn tax_amount(&self) -> ValidationResult<Money> {
        Ok(self.line_total()?.calculate_tax(self.tax_rate()))
    }

    pub fn line_total_with_tax(&self) -> ValidationResult<Money> {
        crate::calc::line_total_with_tax(
            self.quantity,
            Money::from_minor(self.unit_price),
            Money::from_minor(self.discount_amount),
            self.tax_rate(),
        )
    }
}

// =============================================================================
// Facture Payment
// =============================================================================

/// A payment against a facture. Many per facture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FacturePayment {
    pub id: String,
    pub facture_id: String,
    pub amount: i64,
    pub scheduled_date: NaiveDate,
    /// Actual transfer date, set on process.
    pub payment_date: Option<NaiveDate>,
    pub method: PaymentMethod,
    pub bank_account: Option<String>,
    /// Transfer or check number.
    pub reference_number: Option<String>,
    pub receipt_file: Option<String>,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub supplier_acknowledgement: Option<String>,
    pub scheduled_by: String,
    pub scheduled_at: DateTime<Utc>,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub failed_by: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl FacturePayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount)
    }
}

// =============================================================================
// Aggregates & Views
// =============================================================================

/// A facture with everything it owns, as returned by every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactureDetail {
    pub facture: Facture,
    pub items: Vec<FactureItem>,
    pub payments: Vec<FacturePayment>,
}

impl FactureDetail {
    /// Sum of Scheduled and Processed payments not yet confirmed.
    pub fn pending_payments(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| !p.status.is_terminal())
            .map(FacturePayment::amount)
            .sum()
    }

    /// Per-item ordered/received/accepted deltas.
    pub fn item_variances(&self, tolerance_bps: u32) -> Vec<ItemVariance> {
        self.items
            .iter()
            .map(|item| crate::calc::item_variance(item, tolerance_bps))
            .collect()
    }
}

/// Result of a payment mutation: the payment and its (possibly updated) parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub payment: FacturePayment,
    pub facture: Facture,
}

/// Quantity differences for one item after verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVariance {
    pub item_id: String,
    pub line_no: i64,
    pub ordered: i64,
    pub received: Option<i64>,
    pub accepted: Option<i64>,
    /// `received − ordered`.
    pub received_delta: Option<i64>,
    /// `received − accepted`.
    pub rejected: Option<i64>,
    /// Received above `ordered × tolerance`.
    pub over_tolerance: bool,
}

/// Count and amounts for one status in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StatusTotal {
    pub status: FactureStatus,
    pub count: i64,
    pub total_amount: i64,
    pub paid_amount: i64,
}

/// Dashboard numbers across every facture the actor can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactureSummary {
    pub by_status: Vec<StatusTotal>,
    pub total_outstanding: i64,
    pub overdue_count: i64,
    pub total_overdue: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
