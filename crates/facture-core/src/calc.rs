//! # Financial Calculator
//!
//! Line totals, facture totals, due dates, aging and item variances.
//!
//! ## Aging Buckets
//! ```text
//!   due_date          today
//!      │◄── days overdue ──►│
//!
//!   ≤ 0 days   → Current     (not yet due)
//!   1..=30     → Days1To30
//!   31..=60    → Days31To60
//!   61..=90    → Days61To90
//!   > 90       → Over90
//! ```
//!
//! Everything here is a pure function of its inputs; `today` is always a
//! parameter so reports are reproducible.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::requests::NewFactureItem;
use crate::types::{Facture, FactureItem, ItemVariance, TaxRate};
use crate::validation::ValidationResult;

// =============================================================================
// Line & Facture Totals
// =============================================================================

/// Arithmetic overflow while totalling `field`.
fn overflow(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// `quantity × unit_price − discount`.
pub fn line_total(quantity: i64, unit_price: Money, discount: Money) -> ValidationResult<Money> {
    unit_price
        .checked_mul_quantity(quantity)
        .and_then(|gross| gross.checked_sub(discount))
        .ok_or_else(|| overflow("line amount"))
}

/// Line total plus its tax.
pub fn line_total_with_tax(
    quantity: i64,
    unit_price: Money,
    discount: Money,
    rate: TaxRate,
) -> ValidationResult<Money> {
    let line = line_total(quantity, unit_price, discount)?;
    line.checked_add(line.calculate_tax(rate))
        .ok_or_else(|| overflow("line amount"))
}

/// Line total plus its tax for a not-yet-persisted item.
pub fn new_item_total_with_tax(item: &NewFactureItem) -> ValidationResult<Money> {
    line_total_with_tax(
        item.quantity,
        Money::from_minor(item.unit_price),
        Money::from_minor(item.discount_amount),
        TaxRate::from_bps(item.tax_rate_bps),
    )
}

/// Facture total from lines: Σ(line + tax) + header tax − header discount.
///
/// ## Example
/// ```rust
/// use facture_core::calc::facture_total;
/// use facture_core::money::Money;
///
/// let lines = [Money::from_minor(271_950), Money::from_minor(28_050)];
/// let total = facture_total(lines, Money::zero(), Money::from_minor(50_000)).unwrap();
/// assert_eq!(total.minor(), 250_000);
///
/// let huge = [Money::from_minor(i64::MAX / 2); 3];
/// assert!(facture_total(huge, Money::zero(), Money::zero()).is_err());
/// ```
pub fn facture_total<I>(lines_with_tax: I, header_tax: Money, header_discount: Money) -> ValidationResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    lines_with_tax
        .into_iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line))
        .and_then(|sum| sum.checked_add(header_tax))
        .and_then(|sum| sum.checked_sub(header_discount))
        .ok_or_else(|| overflow("total_amount"))
}

/// Total for a new facture from its request items.
pub fn total_from_new_items(
    items: &[NewFactureItem],
    header_tax: Money,
    header_discount: Money,
) -> ValidationResult<Money> {
    let lines = items
        .iter()
        .map(new_item_total_with_tax)
        .collect::<ValidationResult<Vec<_>>>()?;
    facture_total(lines, header_tax, header_discount)
}

/// Total for a persisted facture from its stored items.
pub fn total_from_items(
    items: &[FactureItem],
    header_tax: Money,
    header_discount: Money,
) -> ValidationResult<Money> {
    let lines = items
        .iter()
        .map(FactureItem::line_total_with_tax)
        .collect::<ValidationResult<Vec<_>>>()?;
    facture_total(lines, header_tax, header_discount)
}

// =============================================================================
// Due Dates
// =============================================================================

/// Explicit due date, or `invoice_date + payment_terms_days`.
///
/// Terms that run past the calendar are rejected.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use facture_core::calc::resolve_due_date;
///
/// let invoice = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let due = resolve_due_date(invoice, None, 30).unwrap();
/// assert_eq!(due, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
///
/// assert!(resolve_due_date(invoice, None, i64::MAX).is_err());
/// ```
pub fn resolve_due_date(
    invoice_date: NaiveDate,
    explicit: Option<NaiveDate>,
    payment_terms_days: i64,
) -> ValidationResult<NaiveDate> {
    if let Some(due) = explicit {
        return Ok(due);
    }
    let days = Days::new(payment_terms_days.max(0).unsigned_abs());
    invoice_date
        .checked_add_days(days)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "payment_terms_days".to_string(),
            min: 0,
            max: (NaiveDate::MAX - invoice_date).num_days(),
        })
}

/// Days past due as of `today`. Zero or negative means not yet overdue.
#[inline]
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days()
}

// =============================================================================
// Aging
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    pub const ALL: [AgingBucket; 5] = [
        AgingBucket::Current,
        AgingBucket::Days1To30,
        AgingBucket::Days31To60,
        AgingBucket::Days61To90,
        AgingBucket::Over90,
    ];

    pub const fn label(&self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Over90 => ">90",
        }
    }
}

/// Bucket for a due date as of `today`.
pub fn bucket_for(due_date: NaiveDate, today: NaiveDate) -> AgingBucket {
    match days_overdue(due_date, today) {
        d if d <= 0 => AgingBucket::Current,
        1..=30 => AgingBucket::Days1To30,
        31..=60 => AgingBucket::Days31To60,
        61..=90 => AgingBucket::Days61To90,
        _ => AgingBucket::Over90,
    }
}

/// Outstanding amount and count for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingLine {
    pub bucket: AgingBucket,
    pub count: i64,
    pub outstanding: i64,
}

/// Outstanding amounts grouped by how far past due they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    /// Always five lines, in [`AgingBucket::ALL`] order.
    pub lines: Vec<AgingLine>,
    pub total_outstanding: i64,
}

impl AgingReport {
    pub fn line(&self, bucket: AgingBucket) -> Option<&AgingLine> {
        self.lines.iter().find(|l| l.bucket == bucket)
    }
}

/// Builds the aging report over the given factures.
///
/// Paid and Cancelled factures are skipped; Disputed ones count.
pub fn aging_report<'a, I>(factures: I, today: NaiveDate) -> AgingReport
where
    I: IntoIterator<Item = &'a Facture>,
{
    let mut lines: Vec<AgingLine> = AgingBucket::ALL
        .iter()
        .map(|&bucket| AgingLine {
            bucket,
            count: 0,
            outstanding: 0,
        })
        .collect();
    let mut total: i64 = 0;

    for facture in factures {
        if !facture.status.is_open() {
            continue;
        }
        let outstanding = facture.outstanding();
        if outstanding.is_zero() {
            continue;
        }
        let bucket = bucket_for(facture.due_date, today);
        if let Some(line) = lines.iter_mut().find(|l| l.bucket == bucket) {
            line.count += 1;
            line.outstanding = line.outstanding.saturating_add(outstanding.minor());
        }
        total = total.saturating_add(outstanding.minor());
    }

    AgingReport {
        as_of: today,
        lines,
        total_outstanding: total,
    }
}

// =============================================================================
// Item Variance
// =============================================================================

/// Ordered vs received vs accepted for one item.
///
/// Received above `ordered × tolerance_bps / 10000` is flagged, never blocked.
pub fn item_variance(item: &FactureItem, tolerance_bps: u32) -> ItemVariance {
    let over_tolerance = item
        .received_quantity
        .map(|received| {
            (received as i128) * 10_000 > (item.quantity as i128) * (tolerance_bps as i128)
        })
        .unwrap_or(false);

    ItemVariance {
        item_id: item.id.clone(),
        line_no: item.line_no,
        ordered: item.quantity,
        received: item.received_quantity,
        accepted: item.accepted_quantity,
        received_delta: item.received_quantity.map(|r| r - item.quantity),
        rejected: match (item.received_quantity, item.accepted_quantity) {
            (Some(r), Some(a)) => Some(r - a),
            _ => None,
        },
        over_tolerance,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
