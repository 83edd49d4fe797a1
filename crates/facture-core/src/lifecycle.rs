//! # Lifecycle Guards
//!
//! Pure predicates deciding which transitions are allowed for factures and
//! payments, plus the paid-status tie-break.
//!
//! ## Guard Table
//! ```text
//! ┌───────────────────┬─────────────────────────────────────────────────────┐
//! │ Guard             │ Allowed when                                        │
//! ├───────────────────┼─────────────────────────────────────────────────────┤
//! │ can_verify        │ Received                                            │
//! │ can_approve       │ Verified AND total ≥ threshold                      │
//! │ can_dispute       │ not Paid, Cancelled, Disputed                       │
//! │ can_cancel        │ not Paid, PartiallyPaid, Cancelled; nothing paid    │
//! │ can_update        │ Received, Verified                                  │
//! │ can_resume        │ Disputed                                            │
//! │ can_add_item      │ Received                                            │
//! │ can_schedule_     │ Verified (below threshold), Approved, PartiallyPaid │
//! │   payment         │ AND outstanding > 0                                 │
//! └───────────────────┴─────────────────────────────────────────────────────┘
//! ```
//!
//! Each `ensure_*` wrapper turns a failed predicate into
//! [`CoreError::InvalidTransition`] so callers can reject before any write.

use crate::error::{CoreError, CoreResult};
use crate::types::{Facture, FacturePayment, FactureStatus, PaymentStatus};

// =============================================================================
// Facture Guards
// =============================================================================

pub fn can_verify(status: FactureStatus) -> bool {
    status == FactureStatus::Received
}

pub fn can_approve(status: FactureStatus, total_amount: i64, threshold: i64) -> bool {
    status == FactureStatus::Verified && total_amount >= threshold
}

pub fn can_dispute(status: FactureStatus) -> bool {
    !matches!(
        status,
        FactureStatus::Paid | FactureStatus::Cancelled | FactureStatus::Disputed
    )
}

pub fn can_cancel(status: FactureStatus) -> bool {
    !matches!(
        status,
        FactureStatus::Paid | FactureStatus::PartiallyPaid | FactureStatus::Cancelled
    )
}

pub fn can_update(status: FactureStatus) -> bool {
    matches!(status, FactureStatus::Received | FactureStatus::Verified)
}

pub fn can_resume(status: FactureStatus) -> bool {
    status == FactureStatus::Disputed
}

pub fn can_add_item(status: FactureStatus) -> bool {
    status == FactureStatus::Received
}

/// Whether a payment may be scheduled (or confirmed) against the facture.
///
/// A Verified facture qualifies only below the approval threshold; at or
/// above it the facture must have gone through Approve first.
///
/// ## Example
/// ```rust
/// use facture_core::lifecycle::can_schedule_payment;
/// use facture_core::types::FactureStatus;
///
/// let threshold = 50_000_000;
/// assert!(can_schedule_payment(FactureStatus::Verified, 1_000_000, 0, threshold));
/// assert!(!can_schedule_payment(FactureStatus::Verified, 60_000_000, 0, threshold));
/// assert!(can_schedule_payment(FactureStatus::Approved, 60_000_000, 0, threshold));
/// ```
pub fn can_schedule_payment(
    status: FactureStatus,
    total_amount: i64,
    paid_amount: i64,
    threshold: i64,
) -> bool {
    let payable = match status {
        FactureStatus::Verified => total_amount < threshold,
        FactureStatus::Approved | FactureStatus::PartiallyPaid => true,
        FactureStatus::Received
        | FactureStatus::Paid
        | FactureStatus::Disputed
        | FactureStatus::Cancelled => false,
    };
    payable && total_amount - paid_amount > 0
}

/// Same rule as [`can_schedule_payment`]; applied again at confirmation.
#[inline]
pub fn can_receive_payment(
    status: FactureStatus,
    total_amount: i64,
    paid_amount: i64,
    threshold: i64,
) -> bool {
    can_schedule_payment(status, total_amount, paid_amount, threshold)
}

/// New paid amount and status after confirming `amount`.
///
/// ## Tie-break
/// - `paid == total` → Paid
/// - `0 < paid < total` → PartiallyPaid
/// - `paid > total` → rejected, nothing applied
pub fn apply_payment(total_amount: i64, paid_amount: i64, amount: i64) -> CoreResult<(i64, FactureStatus)> {
    let outstanding = total_amount - paid_amount;
    if amount > outstanding {
        return Err(CoreError::Overpayment {
            outstanding,
            requested: amount,
        });
    }
    let paid = paid_amount + amount;
    let status = if paid == total_amount {
        FactureStatus::Paid
    } else {
        FactureStatus::PartiallyPaid
    };
    Ok((paid, status))
}

// =============================================================================
// Payment Guards
// =============================================================================

pub fn can_process(status: PaymentStatus) -> bool {
    status == PaymentStatus::Scheduled
}

pub fn can_confirm(status: PaymentStatus) -> bool {
    status == PaymentStatus::Processed
}

pub fn can_fail(status: PaymentStatus) -> bool {
    matches!(status, PaymentStatus::Scheduled | PaymentStatus::Processed)
}

pub fn can_update_payment(status: PaymentStatus) -> bool {
    !status.is_terminal()
}

// =============================================================================
// Ensure Helpers
// =============================================================================

fn facture_rejected(facture: &Facture, action: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        entity: "facture",
        id: facture.id.clone(),
        status: facture.status.to_string(),
        action,
    }
}

fn payment_rejected(payment: &FacturePayment, action: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        entity: "payment",
        id: payment.id.clone(),
        status: payment.status.to_string(),
        action,
    }
}

/// Named facture actions, each with its guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactureAction {
    Verify,
    Approve,
    Dispute,
    Resume,
    Cancel,
    Update,
    AddItem,
    SchedulePayment,
    ReceivePayment,
}

impl FactureAction {
    pub const fn name(&self) -> &'static str {
        match self {
            FactureAction::Verify => "verify",
            FactureAction::Approve => "approve",
            FactureAction::Dispute => "dispute",
            FactureAction::Resume => "resume",
            FactureAction::Cancel => "cancel",
            FactureAction::Update => "update",
            FactureAction::AddItem => "add item",
            FactureAction::SchedulePayment => "schedule payment",
            FactureAction::ReceivePayment => "receive payment",
        }
    }

    /// Evaluates the guard for this action against the facture.
    pub fn allowed(&self, facture: &Facture, threshold: i64) -> bool {
        let status = facture.status;
        match self {
            FactureAction::Verify => can_verify(status),
            FactureAction::Approve => can_approve(status, facture.total_amount, threshold),
            FactureAction::Dispute => can_dispute(status),
            FactureAction::Resume => can_resume(status),
            FactureAction::Cancel => can_cancel(status) && facture.paid_amount == 0,
            FactureAction::Update => can_update(status),
            FactureAction::AddItem => can_add_item(status),
            FactureAction::SchedulePayment => {
                can_schedule_payment(status, facture.total_amount, facture.paid_amount, threshold)
            }
            FactureAction::ReceivePayment => {
                can_receive_payment(status, facture.total_amount, facture.paid_amount, threshold)
            }
        }
    }
}

/// Rejects with `InvalidTransition` unless the action's guard holds.
pub fn ensure_facture(facture: &Facture, action: FactureAction, threshold: i64) -> CoreResult<()> {
    if action.allowed(facture, threshold) {
        Ok(())
    } else {
        Err(facture_rejected(facture, action.name()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAction {
    Process,
    Confirm,
    Fail,
    Update,
}

impl PaymentAction {
    pub const fn name(&self) -> &'static str {
        match self {
            PaymentAction::Process => "process",
            PaymentAction::Confirm => "confirm",
            PaymentAction::Fail => "cancel",
            PaymentAction::Update => "update",
        }
    }

    pub fn allowed(&self, status: PaymentStatus) -> bool {
        match self {
            PaymentAction::Process => can_process(status),
            PaymentAction::Confirm => can_confirm(status),
            PaymentAction::Fail => can_fail(status),
            PaymentAction::Update => can_update_payment(status),
        }
    }
}

pub fn ensure_payment(payment: &FacturePayment, action: PaymentAction) -> CoreResult<()> {
    if action.allowed(payment.status) {
        Ok(())
    } else {
        Err(payment_rejected(payment, action.name()))
    }
}

/// Rejects a payment amount larger than what is left to schedule.
///
/// `pending` is the sum of Scheduled/Processed payments not yet confirmed.
pub fn ensure_within_outstanding(facture: &Facture, pending: i64, amount: i64) -> CoreResult<()> {
    let available = facture.total_amount - facture.paid_amount - pending;
    if amount > available {
        return Err(CoreError::Overpayment {
            outstanding: available.max(0),
            requested: amount,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
