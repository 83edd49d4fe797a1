//! # Payment Repository
//!
//! Payment lifecycle and the facture paid-amount aggregate.
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Payment Lifecycle                                 │
//! │                                                                         │
//! │  schedule() ──► Scheduled ──process()──► Processed ──confirm()──► Confirmed
//! │                    │                        │                           │
//! │                    └──────── fail() ────────┴──────────► Failed         │
//! │                                                                         │
//! │  confirm() in ONE transaction:                                         │
//! │    1. payment  Processed → Confirmed                                   │
//! │    2. facture  paid_amount += amount                                   │
//! │                status = Paid | PartiallyPaid                           │
//! │    Either guard failing rolls both back.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scheduling reserves capacity: the sum of Scheduled and Processed payments
//! never exceeds what is left to pay on the facture.

use chrono::{NaiveDate, Utc};
use facture_core::lifecycle::{
    apply_payment, ensure_facture, ensure_payment, ensure_within_outstanding, FactureAction,
    PaymentAction,
};
use facture_core::{
    AccessScope, FacturePayment, PaymentResult, ProcessPayment, SchedulePayment, UpdatePayment,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::facture::fetch_facture;
use super::SCOPE_FILTER;
use crate::error::{DbError, DbResult};

/// Unconfirmed payments still holding capacity on their facture.
const PENDING_SUM: &str = r#"
    SELECT COALESCE(SUM(amount), 0) FROM facture_payments
    WHERE facture_id = ? AND status IN ('scheduled', 'processed')
"#;

async fn fetch_payment(
    conn: &mut SqliteConnection,
    payment_id: &str,
    scope: &AccessScope,
) -> DbResult<Option<FacturePayment>> {
    let (unrestricted, branch) = scope.sql_params();
    let sql = format!(
        r#"
        SELECT p.* FROM facture_payments p
        JOIN factures f ON f.id = p.facture_id
        WHERE p.id = ? AND {}
        "#,
        SCOPE_FILTER
    );

    let payment = sqlx::query_as::<_, FacturePayment>(&sql)
        .bind(payment_id)
        .bind(unrestricted)
        .bind(branch)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(payment)
}

async fn pending_amount(conn: &mut SqliteConnection, facture_id: &str) -> DbResult<i64> {
    let pending: i64 = sqlx::query_scalar(PENDING_SUM)
        .bind(facture_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(pending)
}

/// Payment and parent as they stand inside the current transaction.
async fn written_result(conn: &mut SqliteConnection, payment_id: &str) -> DbResult<PaymentResult> {
    let payment = fetch_payment(conn, payment_id, &AccessScope::Unrestricted)
        .await?
        .ok_or_else(|| DbError::not_found("payment", payment_id))?;
    let facture = fetch_facture(conn, &payment.facture_id, &AccessScope::Unrestricted)
        .await?
        .ok_or_else(|| DbError::not_found("facture", &payment.facture_id))?;

    Ok(PaymentResult { payment, facture })
}

/// Works out why a guarded payment UPDATE matched nothing.
async fn explain_payment(
    conn: &mut SqliteConnection,
    payment_id: &str,
    scope: &AccessScope,
    action: PaymentAction,
) -> DbError {
    match fetch_payment(conn, payment_id, scope).await {
        Ok(None) => DbError::not_found("payment", payment_id),
        Ok(Some(payment)) => match ensure_payment(&payment, action) {
            Err(rejected) => DbError::Rejected(rejected),
            Ok(()) => DbError::stale("payment", payment_id),
        },
        Err(e) => e,
    }
}

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get(&self, payment_id: &str, scope: &AccessScope) -> DbResult<Option<FacturePayment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_payment(&mut conn, payment_id, scope).await
    }

    /// Payments of one facture, `None` if the facture is not visible.
    pub async fn list_for_facture(
        &self,
        facture_id: &str,
        scope: &AccessScope,
    ) -> DbResult<Option<Vec<FacturePayment>>> {
        let mut conn = self.pool.acquire().await?;
        if fetch_facture(&mut conn, facture_id, scope).await?.is_none() {
            return Ok(None);
        }
        let payments = super::facture::fetch_payments(&mut conn, facture_id).await?;
        Ok(Some(payments))
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Schedules a payment against a payable facture.
    ///
    /// ## Guards
    /// - Facture is Approved, PartiallyPaid, or Verified below `threshold`
    /// - `amount ≤ total − paid − pending`
    pub async fn schedule(
        &self,
        facture_id: &str,
        scope: &AccessScope,
        req: &SchedulePayment,
        actor_id: &str,
        threshold: i64,
    ) -> DbResult<PaymentResult> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET updated_by = ?, updated_at = ?
            WHERE id = ?
              AND status IN ('verified', 'approved', 'partially_paid')
              AND (status <> 'verified' OR total_amount < ?)
              AND total_amount - paid_amount - (
                    SELECT COALESCE(SUM(p.amount), 0) FROM facture_payments p
                    WHERE p.facture_id = factures.id
                      AND p.status IN ('scheduled', 'processed')
                  ) >= ?
              AND {}
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(now)
            .bind(facture_id)
            .bind(threshold)
            .bind(req.amount)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let facture = fetch_facture(&mut tx, facture_id, scope)
                .await?
                .ok_or_else(|| DbError::not_found("facture", facture_id))?;
            ensure_facture(&facture, FactureAction::SchedulePayment, threshold)?;
            let pending = pending_amount(&mut tx, facture_id).await?;
            ensure_within_outstanding(&facture, pending, req.amount)?;
            return Err(DbError::stale("facture", facture_id));
        }

        let payment_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO facture_payments (
                id, facture_id, amount, scheduled_date, method,
                bank_account, status, notes,
                scheduled_by, scheduled_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'scheduled', ?, ?, ?, ?)
            "#,
        )
        .bind(&payment_id)
        .bind(facture_id)
        .bind(req.amount)
        .bind(req.scheduled_date)
        .bind(req.method)
        .bind(&req.bank_account)
        .bind(&req.notes)
        .bind(actor_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let result = written_result(&mut tx, &payment_id).await?;
        tx.commit().await?;

        info!(
            payment_id = %payment_id,
            facture_id = %facture_id,
            amount = req.amount,
            "Payment scheduled"
        );
        Ok(result)
    }

    /// Records the transfer. `payment_date` defaults to `today`.
    pub async fn process(
        &self,
        payment_id: &str,
        scope: &AccessScope,
        req: &ProcessPayment,
        actor_id: &str,
        today: NaiveDate,
    ) -> DbResult<PaymentResult> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE facture_payments SET
                status = 'processed',
                payment_date = ?,
                reference_number = ?,
                receipt_file = COALESCE(?, receipt_file),
                processed_by = ?, processed_at = ?,
                updated_at = ?
            WHERE id = ? AND status = 'scheduled'
              AND facture_id IN (SELECT id FROM factures WHERE {})
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(req.payment_date.unwrap_or(today))
            .bind(req.reference_number.trim())
            .bind(&req.receipt_file)
            .bind(actor_id)
            .bind(now)
            .bind(now)
            .bind(payment_id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_payment(&mut tx, payment_id, scope, PaymentAction::Process).await);
        }

        let result = written_result(&mut tx, payment_id).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Confirms a processed payment and applies it to the facture.
    ///
    /// ## Rejections
    /// - Payment not Processed (a second confirm lands here)
    /// - Facture no longer payable (Disputed, Cancelled, Paid)
    /// - Amount above the facture's outstanding balance
    pub async fn confirm(
        &self,
        payment_id: &str,
        scope: &AccessScope,
        acknowledgement: Option<&str>,
        actor_id: &str,
        threshold: i64,
    ) -> DbResult<PaymentResult> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE facture_payments SET
                status = 'confirmed',
                supplier_acknowledgement = COALESCE(?, supplier_acknowledgement),
                confirmed_by = ?, confirmed_at = ?,
                updated_at = ?
            WHERE id = ? AND status = 'processed'
              AND facture_id IN (SELECT id FROM factures WHERE {})
            RETURNING facture_id, amount
            "#,
            SCOPE_FILTER
        );
        let confirmed: Option<(String, i64)> = sqlx::query_as(&sql)
            .bind(acknowledgement)
            .bind(actor_id)
            .bind(now)
            .bind(now)
            .bind(payment_id)
            .bind(unrestricted)
            .bind(branch)
            .fetch_optional(&mut *tx)
            .await?;

        let Some((facture_id, amount)) = confirmed else {
            return Err(explain_payment(&mut tx, payment_id, scope, PaymentAction::Confirm).await);
        };

        let result = sqlx::query(
            r#"
            UPDATE factures SET
                paid_amount = paid_amount + ?,
                status = CASE WHEN paid_amount + ? = total_amount
                              THEN 'paid' ELSE 'partially_paid' END,
                updated_by = ?, updated_at = ?
            WHERE id = ?
              AND status IN ('verified', 'approved', 'partially_paid')
              AND (status <> 'verified' OR total_amount < ?)
              AND paid_amount + ? <= total_amount
            "#,
        )
        .bind(amount)
        .bind(amount)
        .bind(actor_id)
        .bind(now)
        .bind(&facture_id)
        .bind(threshold)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let facture = fetch_facture(&mut tx, &facture_id, &AccessScope::Unrestricted)
                .await?
                .ok_or_else(|| DbError::not_found("facture", &facture_id))?;
            ensure_facture(&facture, FactureAction::ReceivePayment, threshold)?;
            apply_payment(facture.total_amount, facture.paid_amount, amount)?;
            return Err(DbError::stale("facture", &facture_id));
        }

        let result = written_result(&mut tx, payment_id).await?;
        tx.commit().await?;

        info!(
            payment_id = %payment_id,
            facture_id = %facture_id,
            amount,
            paid = result.facture.paid_amount,
            status = %result.facture.status,
            "Payment confirmed"
        );
        Ok(result)
    }

    /// Marks an open payment failed, releasing its capacity.
    pub async fn fail(
        &self,
        payment_id: &str,
        scope: &AccessScope,
        reason: &str,
        actor_id: &str,
    ) -> DbResult<PaymentResult> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE facture_payments SET
                status = 'failed',
                failure_reason = ?,
                failed_by = ?, failed_at = ?,
                updated_at = ?
            WHERE id = ? AND status IN ('scheduled', 'processed')
              AND facture_id IN (SELECT id FROM factures WHERE {})
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(reason)
            .bind(actor_id)
            .bind(now)
            .bind(now)
            .bind(payment_id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_payment(&mut tx, payment_id, scope, PaymentAction::Fail).await);
        }

        let result = written_result(&mut tx, payment_id).await?;
        tx.commit().await?;

        debug!(payment_id = %payment_id, "Payment failed");
        Ok(result)
    }

    /// Edits bank account or notes on an open payment.
    pub async fn update(
        &self,
        payment_id: &str,
        scope: &AccessScope,
        req: &UpdatePayment,
        actor_id: &str,
    ) -> DbResult<PaymentResult> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE facture_payments SET
                bank_account = COALESCE(?, bank_account),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ? AND status IN ('scheduled', 'processed')
              AND facture_id IN (SELECT id FROM factures WHERE {})
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(&req.bank_account)
            .bind(&req.notes)
            .bind(now)
            .bind(payment_id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_payment(&mut tx, payment_id, scope, PaymentAction::Update).await);
        }

        let result = written_result(&mut tx, payment_id).await?;
        tx.commit().await?;

        debug!(payment_id = %payment_id, actor = %actor_id, "Payment updated");
        Ok(result)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
