//! # Facture Repository
//!
//! Database operations for factures and their items.
//!
//! ## Facture Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Facture Lifecycle                                 │
//! │                                                                         │
//! │  1. RECEIVE                                                            │
//! │     └── receive() → allocate INT-FAC-<year>-NNNNN, insert header+items │
//! │                                                                         │
//! │  2. VERIFY                                                             │
//! │     └── verify() → received/accepted qty per item, status=verified     │
//! │                                                                         │
//! │  3. APPROVE (total ≥ threshold)                                        │
//! │     └── approve() → status=approved, note appended                     │
//! │                                                                         │
//! │  4. PAY (PaymentRepository)                                            │
//! │     └── confirm() → paid_amount += amount, partially_paid / paid       │
//! │                                                                         │
//! │  SIDE EXITS                                                            │
//! │     ├── dispute() / resume()                                           │
//! │     └── cancel() → also fails open payments                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write-First Transactions
//! Every transition starts with its status-guarded UPDATE. The first
//! statement takes the SQLite write lock, and zero affected rows is
//! explained afterwards by re-reading the row: not found, guard rejected, or
//! changed concurrently.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use facture_core::calc;
use facture_core::lifecycle::{ensure_facture, FactureAction};
use facture_core::sequence::{format_reference, reference_prefix};
use facture_core::{
    AccessScope, Facture, FactureDetail, FactureFilter, FactureItem, FacturePayment,
    FactureStatus, FactureSummary, ItemVerification, Money, NewFactureItem, ReceiveFacture,
    StatusTotal, UpdateFacture, ValidationError,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::sequence::allocate;
use super::{APPEND_NOTE, SCOPE_FILTER};
use crate::error::{DbError, DbResult};

/// Statuses counted as open for outstanding/overdue queries.
const OPEN_STATUS_FILTER: &str = "status NOT IN ('paid', 'cancelled')";

// =============================================================================
// New Facture
// =============================================================================

/// A receive request after the service resolved everything the store needs.
#[derive(Debug, Clone)]
pub struct NewFacture {
    pub request: ReceiveFacture,
    pub due_date: NaiveDate,
    pub total_amount: i64,
    pub total_from_items: bool,
    pub received_by: String,
    /// Calendar year of the reference number.
    pub reference_year: i32,
}

// =============================================================================
// Shared Row Helpers
// =============================================================================

pub(crate) async fn fetch_facture(
    conn: &mut SqliteConnection,
    id: &str,
    scope: &AccessScope,
) -> DbResult<Option<Facture>> {
    let (unrestricted, branch) = scope.sql_params();
    let sql = format!("SELECT * FROM factures WHERE id = ? AND {}", SCOPE_FILTER);

    let facture = sqlx::query_as::<_, Facture>(&sql)
        .bind(id)
        .bind(unrestricted)
        .bind(branch)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(facture)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    facture_id: &str,
) -> DbResult<Vec<FactureItem>> {
    let items = sqlx::query_as::<_, FactureItem>(
        "SELECT * FROM facture_items WHERE facture_id = ? ORDER BY line_no",
    )
    .bind(facture_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

pub(crate) async fn fetch_payments(
    conn: &mut SqliteConnection,
    facture_id: &str,
) -> DbResult<Vec<FacturePayment>> {
    let payments = sqlx::query_as::<_, FacturePayment>(
        "SELECT * FROM facture_payments WHERE facture_id = ? ORDER BY scheduled_at, id",
    )
    .bind(facture_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(payments)
}

pub(crate) async fn fetch_detail(
    conn: &mut SqliteConnection,
    id: &str,
    scope: &AccessScope,
) -> DbResult<Option<FactureDetail>> {
    let Some(facture) = fetch_facture(conn, id, scope).await? else {
        return Ok(None);
    };
    let items = fetch_items(conn, id).await?;
    let payments = fetch_payments(conn, id).await?;

    Ok(Some(FactureDetail {
        facture,
        items,
        payments,
    }))
}

/// Detail that must exist because this transaction just wrote it.
async fn written_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<FactureDetail> {
    fetch_detail(conn, id, &AccessScope::Unrestricted)
        .await?
        .ok_or_else(|| DbError::not_found("facture", id))
}

/// Works out why a guarded UPDATE matched nothing.
pub(crate) async fn explain_rejection(
    conn: &mut SqliteConnection,
    id: &str,
    scope: &AccessScope,
    action: FactureAction,
    threshold: i64,
) -> DbError {
    match fetch_facture(conn, id, scope).await {
        Ok(None) => DbError::not_found("facture", id),
        Ok(Some(facture)) => match ensure_facture(&facture, action, threshold) {
            Err(rejected) => DbError::Rejected(rejected),
            Ok(()) => DbError::stale("facture", id),
        },
        Err(e) => e,
    }
}

fn encode_documents(docs: &[String]) -> DbResult<String> {
    serde_json::to_string(docs).map_err(|e| DbError::Internal(e.to_string()))
}

async fn insert_item(
    conn: &mut SqliteConnection,
    facture_id: &str,
    line_no: i64,
    item: &NewFactureItem,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO facture_items (
            id, facture_id, line_no, product_id, description,
            quantity, unit_price, tax_rate_bps, discount_amount,
            is_verified, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(facture_id)
    .bind(line_no)
    .bind(&item.product_id)
    .bind(item.description.trim())
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.tax_rate_bps)
    .bind(item.discount_amount)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for facture database operations.
#[derive(Debug, Clone)]
pub struct FactureRepository {
    pool: SqlitePool,
}

impl FactureRepository {
    /// Creates a new FactureRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FactureRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Receive
    // -------------------------------------------------------------------------

    /// Fast-path duplicate check. The unique index is the real guarantee.
    pub async fn supplier_invoice_exists(
        &self,
        supplier_id: &str,
        supplier_invoice_number: &str,
    ) -> DbResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM factures
                WHERE supplier_id = ? AND supplier_invoice_number = ?
            )
            "#,
        )
        .bind(supplier_id)
        .bind(supplier_invoice_number.trim())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    /// Persists a new facture with its items in one transaction.
    ///
    /// ## What This Does
    /// 1. Allocates the reference number (first statement: takes the write lock)
    /// 2. Inserts the header with `status = received`
    /// 3. Inserts items numbered from 1
    ///
    /// A unique violation on `(supplier_id, supplier_invoice_number)` rolls
    /// everything back, including the allocated number.
    pub async fn receive(&self, new: &NewFacture) -> DbResult<FactureDetail> {
        let req = &new.request;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let prefix = reference_prefix(new.reference_year);
        let sequence = allocate(&mut tx, &prefix).await?;
        let reference = format_reference(new.reference_year, sequence)?;

        debug!(facture_id = %id, reference = %reference, "Inserting facture");

        sqlx::query(
            r#"
            INSERT INTO factures (
                id, supplier_id, supplier_invoice_number, internal_reference_number,
                branch_id, purchase_order_number, delivery_note_number,
                invoice_date, due_date, delivery_date,
                total_amount, tax_amount, discount_amount, paid_amount, total_from_items,
                status, received_by, received_at,
                notes, supporting_documents,
                created_by, created_at, updated_by, updated_at
            ) VALUES (
                ?, ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?,
                ?, ?, ?, 0, ?,
                'received', ?, ?,
                ?, ?,
                ?, ?, ?, ?
            )
            "#,
        )
        .bind(&id)
        .bind(&req.supplier_id)
        .bind(req.supplier_invoice_number.trim())
        .bind(&reference)
        .bind(&req.branch_id)
        .bind(&req.purchase_order_number)
        .bind(&req.delivery_note_number)
        .bind(req.invoice_date)
        .bind(new.due_date)
        .bind(req.delivery_date)
        .bind(new.total_amount)
        .bind(req.tax_amount)
        .bind(req.discount_amount)
        .bind(new.total_from_items)
        .bind(&new.received_by)
        .bind(now)
        .bind(&req.notes)
        .bind(encode_documents(&req.supporting_documents)?)
        .bind(&new.received_by)
        .bind(now)
        .bind(&new.received_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (idx, item) in req.items.iter().enumerate() {
            insert_item(&mut tx, &id, idx as i64 + 1, item, now).await?;
        }

        let detail = written_detail(&mut tx, &id).await?;
        tx.commit().await?;

        info!(
            facture_id = %id,
            reference = %reference,
            items = detail.items.len(),
            total = detail.facture.total_amount,
            "Facture received"
        );
        Ok(detail)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets a facture header, `None` if absent or outside the scope.
    pub async fn get(&self, id: &str, scope: &AccessScope) -> DbResult<Option<Facture>> {
        let mut conn = self.pool.acquire().await?;
        fetch_facture(&mut conn, id, scope).await
    }

    /// Gets a facture with its items and payments.
    pub async fn get_detail(&self, id: &str, scope: &AccessScope) -> DbResult<Option<FactureDetail>> {
        let mut conn = self.pool.acquire().await?;
        fetch_detail(&mut conn, id, scope).await
    }

    /// Filtered, paged list ordered by newest invoice first.
    pub async fn list(&self, filter: &FactureFilter, scope: &AccessScope) -> DbResult<Vec<Facture>> {
        let (unrestricted, branch) = scope.sql_params();

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM factures WHERE (branch_id IS NULL OR ");
        qb.push_bind(unrestricted)
            .push(" = 1 OR branch_id = ")
            .push_bind(branch.map(str::to_string))
            .push(")");

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(supplier_id) = &filter.supplier_id {
            qb.push(" AND supplier_id = ").push_bind(supplier_id.clone());
        }
        if let Some(branch_id) = &filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id.clone());
        }
        if let Some(from) = filter.invoice_date_from {
            qb.push(" AND invoice_date >= ").push_bind(from);
        }
        if let Some(to) = filter.invoice_date_to {
            qb.push(" AND invoice_date <= ").push_bind(to);
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", term);
            qb.push(" AND (supplier_invoice_number LIKE ")
                .push_bind(pattern.clone())
                .push(" OR internal_reference_number LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        qb.push(" ORDER BY invoice_date DESC, internal_reference_number DESC LIMIT ")
            .push_bind(filter.effective_limit() as i64)
            .push(" OFFSET ")
            .push_bind(filter.effective_offset() as i64);

        debug!(?filter, "Listing factures");

        let factures = qb.build_query_as::<Facture>().fetch_all(&self.pool).await?;
        Ok(factures)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Records counted quantities and moves the facture to Verified.
    ///
    /// Every submitted item must belong to the facture; an unknown item
    /// rolls the whole verification back.
    pub async fn verify(
        &self,
        id: &str,
        scope: &AccessScope,
        verifications: &[ItemVerification],
        actor_id: &str,
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET
                status = 'verified',
                verified_by = ?, verified_at = ?,
                updated_by = ?, updated_at = ?
            WHERE id = ? AND status = 'received' AND {}
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(now)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::Verify, 0).await);
        }

        for v in verifications {
            let result = sqlx::query(
                r#"
                UPDATE facture_items SET
                    received_quantity = ?, accepted_quantity = ?,
                    is_verified = 1, verified_by = ?, verified_at = ?
                WHERE id = ? AND facture_id = ?
                "#,
            )
            .bind(v.received_quantity)
            .bind(v.accepted_quantity)
            .bind(actor_id)
            .bind(now)
            .bind(&v.item_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ValidationError::UnknownReference {
                    field: "item_id".to_string(),
                    value: v.item_id.clone(),
                }
                .into());
            }
        }

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Approves a Verified facture at or above `threshold`.
    pub async fn approve(
        &self,
        id: &str,
        scope: &AccessScope,
        actor_id: &str,
        note: &str,
        threshold: i64,
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET
                status = 'approved',
                approved_by = ?, approved_at = ?,
                {},
                updated_by = ?, updated_at = ?
            WHERE id = ? AND status = 'verified' AND total_amount >= ? AND {}
            "#,
            APPEND_NOTE, SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(now)
            .bind(note)
            .bind(note)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(threshold)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::Approve, threshold).await);
        }

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Puts a facture on hold. Paid amounts are untouched.
    pub async fn dispute(
        &self,
        id: &str,
        scope: &AccessScope,
        actor_id: &str,
        reason: &str,
        documents: &[String],
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let note = format!("Disputed: {}", reason);
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET
                status = 'disputed',
                dispute_reason = ?,
                {},
                updated_by = ?, updated_at = ?
            WHERE id = ? AND status NOT IN ('paid', 'cancelled', 'disputed') AND {}
            "#,
            APPEND_NOTE, SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(reason)
            .bind(&note)
            .bind(&note)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::Dispute, 0).await);
        }

        if !documents.is_empty() {
            let mut detail = written_detail(&mut tx, id).await?;
            for doc in documents {
                if !detail.facture.supporting_documents.contains(doc) {
                    detail.facture.supporting_documents.push(doc.clone());
                }
            }
            sqlx::query("UPDATE factures SET supporting_documents = ? WHERE id = ?")
                .bind(encode_documents(&detail.facture.supporting_documents)?)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Takes a facture off hold.
    ///
    /// Returns to Received (verification cleared) when nothing was paid, or
    /// to PartiallyPaid when payments were already confirmed. The dispute
    /// reason moves into the notes history.
    pub async fn resume(
        &self,
        id: &str,
        scope: &AccessScope,
        actor_id: &str,
        note: &str,
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        // SET expressions see the pre-update row, so notes still reads the
        // old dispute_reason.
        let sql = format!(
            r#"
            UPDATE factures SET
                status = CASE WHEN paid_amount > 0 THEN 'partially_paid' ELSE 'received' END,
                verified_by = CASE WHEN paid_amount > 0 THEN verified_by END,
                verified_at = CASE WHEN paid_amount > 0 THEN verified_at END,
                approved_by = CASE WHEN paid_amount > 0 THEN approved_by END,
                approved_at = CASE WHEN paid_amount > 0 THEN approved_at END,
                notes = CASE WHEN notes IS NULL OR notes = '' THEN '' ELSE notes || char(10) END
                    || 'Resumed (' || COALESCE(dispute_reason, '') || '): ' || ?,
                dispute_reason = NULL,
                updated_by = ?, updated_at = ?
            WHERE id = ? AND status = 'disputed' AND {}
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(note)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::Resume, 0).await);
        }

        sqlx::query(
            r#"
            UPDATE facture_items SET is_verified = 0, verified_by = NULL, verified_at = NULL
            WHERE facture_id = ?
              AND (SELECT status FROM factures WHERE id = ?) = 'received'
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Cancels a facture nothing has been paid on. Irreversible.
    ///
    /// Scheduled and Processed payments fail with the same reason.
    pub async fn cancel(
        &self,
        id: &str,
        scope: &AccessScope,
        actor_id: &str,
        reason: &str,
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let note = format!("Cancelled: {}", reason);
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET
                status = 'cancelled',
                cancelled_by = ?, cancelled_at = ?,
                {},
                updated_by = ?, updated_at = ?
            WHERE id = ?
              AND status NOT IN ('paid', 'partially_paid', 'cancelled')
              AND paid_amount = 0
              AND {}
            "#,
            APPEND_NOTE, SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(now)
            .bind(&note)
            .bind(&note)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::Cancel, 0).await);
        }

        let failed = sqlx::query(
            r#"
            UPDATE facture_payments SET
                status = 'failed', failure_reason = ?,
                failed_by = ?, failed_at = ?, updated_at = ?
            WHERE facture_id = ? AND status IN ('scheduled', 'processed')
            "#,
        )
        .bind(format!("facture cancelled: {}", reason))
        .bind(actor_id)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if failed > 0 {
            debug!(facture_id = %id, failed, "Failed open payments of cancelled facture");
        }

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Updates editable header fields while Received or Verified.
    pub async fn update_metadata(
        &self,
        id: &str,
        scope: &AccessScope,
        actor_id: &str,
        changes: &UpdateFacture,
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET
                due_date = COALESCE(?, due_date),
                purchase_order_number = COALESCE(?, purchase_order_number),
                delivery_note_number = COALESCE(?, delivery_note_number),
                delivery_date = COALESCE(?, delivery_date),
                notes = COALESCE(?, notes),
                updated_by = ?, updated_at = ?
            WHERE id = ? AND status IN ('received', 'verified') AND {}
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(changes.due_date)
            .bind(&changes.purchase_order_number)
            .bind(&changes.delivery_note_number)
            .bind(changes.delivery_date)
            .bind(&changes.notes)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::Update, 0).await);
        }

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Appends an item while the facture is still Received.
    ///
    /// An item-derived total is recomputed from all items.
    pub async fn add_item(
        &self,
        id: &str,
        scope: &AccessScope,
        actor_id: &str,
        item: &NewFactureItem,
    ) -> DbResult<FactureDetail> {
        let now = Utc::now();
        let (unrestricted, branch) = scope.sql_params();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE factures SET updated_by = ?, updated_at = ?
            WHERE id = ? AND status = 'received' AND {}
            "#,
            SCOPE_FILTER
        );
        let result = sqlx::query(&sql)
            .bind(actor_id)
            .bind(now)
            .bind(id)
            .bind(unrestricted)
            .bind(branch)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, id, scope, FactureAction::AddItem, 0).await);
        }

        let next_line: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(line_no), 0) + 1 FROM facture_items WHERE facture_id = ?",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        insert_item(&mut tx, id, next_line, item, now).await?;

        let detail = written_detail(&mut tx, id).await?;
        if detail.facture.total_from_items {
            let total = calc::total_from_items(
                &detail.items,
                Money::from_minor(detail.facture.tax_amount),
                Money::from_minor(detail.facture.discount_amount),
            )?;
            sqlx::query("UPDATE factures SET total_amount = ? WHERE id = ?")
                .bind(total.minor())
                .bind(id)
                .execute(&mut *tx)
                .await?;
            debug!(facture_id = %id, total = total.minor(), "Recomputed item-derived total");
        }

        let detail = written_detail(&mut tx, id).await?;
        tx.commit().await?;
        Ok(detail)
    }

    // -------------------------------------------------------------------------
    // Workflow Queries
    // -------------------------------------------------------------------------

    async fn query_scoped(
        &self,
        condition: &str,
        order: &str,
        scope: &AccessScope,
        binds: QueryBinds,
    ) -> DbResult<Vec<Facture>> {
        let (unrestricted, branch) = scope.sql_params();
        let sql = format!(
            "SELECT * FROM factures WHERE {} AND {} ORDER BY {}",
            condition, SCOPE_FILTER, order
        );

        let mut query = sqlx::query_as::<_, Facture>(&sql);
        query = match binds {
            QueryBinds::None => query,
            QueryBinds::Amount(amount) => query.bind(amount),
            QueryBinds::Date(date) => query.bind(date),
            QueryBinds::DateRange(from, to) => query.bind(from).bind(to),
            QueryBinds::Status(status) => query.bind(status.as_str()),
        };

        let factures = query
            .bind(unrestricted)
            .bind(branch)
            .fetch_all(&self.pool)
            .await?;
        Ok(factures)
    }

    /// Received factures waiting for item verification, oldest first.
    pub async fn pending_verification(&self, scope: &AccessScope) -> DbResult<Vec<Facture>> {
        self.query_scoped(
            "status = ?",
            "received_at ASC",
            scope,
            QueryBinds::Status(FactureStatus::Received),
        )
        .await
    }

    /// Verified factures at or above the threshold, waiting for approval.
    pub async fn pending_approval(&self, scope: &AccessScope, threshold: i64) -> DbResult<Vec<Facture>> {
        self.query_scoped(
            "status = 'verified' AND total_amount >= ?",
            "due_date ASC",
            scope,
            QueryBinds::Amount(threshold),
        )
        .await
    }

    /// Open factures with `due_date < today`, most overdue first.
    pub async fn overdue(&self, scope: &AccessScope, today: NaiveDate) -> DbResult<Vec<Facture>> {
        self.query_scoped(
            &format!("{} AND due_date < ?", OPEN_STATUS_FILTER),
            "due_date ASC",
            scope,
            QueryBinds::Date(today),
        )
        .await
    }

    /// Open factures due within `[from, to]`.
    pub async fn due_between(
        &self,
        scope: &AccessScope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<Facture>> {
        self.query_scoped(
            &format!("{} AND due_date >= ? AND due_date <= ?", OPEN_STATUS_FILTER),
            "due_date ASC",
            scope,
            QueryBinds::DateRange(from, to),
        )
        .await
    }

    /// Open factures with something left to pay.
    pub async fn outstanding(&self, scope: &AccessScope) -> DbResult<Vec<Facture>> {
        self.query_scoped(
            &format!("{} AND total_amount > paid_amount", OPEN_STATUS_FILTER),
            "due_date ASC",
            scope,
            QueryBinds::None,
        )
        .await
    }

    /// Counts and amounts per status plus outstanding/overdue totals.
    pub async fn summary(&self, scope: &AccessScope, today: NaiveDate) -> DbResult<FactureSummary> {
        let (unrestricted, branch) = scope.sql_params();

        let sql = format!(
            r#"
            SELECT status,
                   COUNT(*) AS count,
                   COALESCE(SUM(total_amount), 0) AS total_amount,
                   COALESCE(SUM(paid_amount), 0) AS paid_amount
            FROM factures
            WHERE {}
            GROUP BY status
            "#,
            SCOPE_FILTER
        );
        let mut by_status = sqlx::query_as::<_, StatusTotal>(&sql)
            .bind(unrestricted)
            .bind(branch)
            .fetch_all(&self.pool)
            .await?;
        by_status.sort_by_key(|row| {
            FactureStatus::ALL
                .iter()
                .position(|s| *s == row.status)
                .unwrap_or(usize::MAX)
        });

        let sql = format!(
            r#"
            SELECT COALESCE(SUM(total_amount - paid_amount), 0),
                   COALESCE(SUM(CASE WHEN due_date < ? THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN due_date < ? THEN total_amount - paid_amount ELSE 0 END), 0)
            FROM factures
            WHERE {} AND {}
            "#,
            OPEN_STATUS_FILTER, SCOPE_FILTER
        );
        let (total_outstanding, overdue_count, total_overdue): (i64, i64, i64) =
            sqlx::query_as(&sql)
                .bind(today)
                .bind(today)
                .bind(unrestricted)
                .bind(branch)
                .fetch_one(&self.pool)
                .await?;

        Ok(FactureSummary {
            by_status,
            total_outstanding,
            overdue_count,
            total_overdue,
        })
    }

    /// Number of factures visible in the scope.
    pub async fn count(&self, scope: &AccessScope) -> DbResult<i64> {
        let (unrestricted, branch) = scope.sql_params();
        let sql = format!("SELECT COUNT(*) FROM factures WHERE {}", SCOPE_FILTER);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(unrestricted)
            .bind(branch)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Parameters bound before the scope predicate in [`FactureRepository::query_scoped`].
enum QueryBinds {
    None,
    Amount(i64),
    Date(NaiveDate),
    DateRange(NaiveDate, NaiveDate),
    Status(FactureStatus),
}

/// Calendar year used for a reference allocated now.
pub fn current_reference_year() -> i32 {
    Utc::now().year()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use facture_core::CoreError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_facture(number: &str, branch: Option<&str>, total: i64) -> NewFacture {
        NewFacture {
            request: ReceiveFacture {
                supplier_id: "sup-1".to_string(),
                supplier_invoice_number: number.to_string(),
                branch_id: branch.map(str::to_string),
                invoice_date: date(2024, 1, 1),
                total_amount: Some(total),
                items: vec![NewFactureItem {
                    description: "Rice 5kg".to_string(),
                    quantity: 10,
                    unit_price: 25_000,
                    ..Default::default()
                }],
                ..Default::default()
            },
            due_date: date(2024, 1, 31),
            total_amount: total,
            total_from_items: false,
            received_by: "u-admin".to_string(),
            reference_year: 2024,
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_receive_allocates_sequential_references() {
        let db = db().await;
        let repo = db.factures();

        let a = repo.receive(&new_facture("INV-1", None, 1_000_000)).await.unwrap();
        let b = repo.receive(&new_facture("INV-2", None, 1_000_000)).await.unwrap();

        assert_eq!(a.facture.internal_reference_number, "INT-FAC-2024-00001");
        assert_eq!(b.facture.internal_reference_number, "INT-FAC-2024-00002");
        assert_eq!(a.facture.status, FactureStatus::Received);
        assert_eq!(a.items.len(), 1);
        assert_eq!(a.items[0].line_no, 1);
    }

    #[tokio::test]
    async fn test_duplicate_supplier_invoice_rolls_back_reference() {
        let db = db().await;
        let repo = db.factures();

        repo.receive(&new_facture("INV-1", None, 1_000_000)).await.unwrap();
        let err = repo
            .receive(&new_facture("INV-1", None, 1_000_000))
            .await
            .unwrap_err();

        assert!(err.is_duplicate_supplier_invoice());
        assert_eq!(db.sequences().current("INT-FAC-2024-").await.unwrap(), 1);
        assert!(repo.supplier_invoice_exists("sup-1", "INV-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_scope_hides_other_branch() {
        let db = db().await;
        let repo = db.factures();

        let b = repo.receive(&new_facture("INV-B", Some("B"), 1_000_000)).await.unwrap();
        let shared = repo.receive(&new_facture("INV-ALL", None, 1_000_000)).await.unwrap();

        let scope_a = AccessScope::Branch("A".to_string());
        assert!(repo.get(&b.facture.id, &scope_a).await.unwrap().is_none());
        assert!(repo.get(&shared.facture.id, &scope_a).await.unwrap().is_some());

        let listed = repo.list(&FactureFilter::default(), &scope_a).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, shared.facture.id);
        assert_eq!(repo.count(&scope_a).await.unwrap(), 1);
        assert_eq!(repo.count(&AccessScope::Unrestricted).await.unwrap(), 2);

        let err = repo
            .verify(&b.facture.id, &scope_a, &[], "u-a")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_verify_then_verify_again_is_rejected() {
        let db = db().await;
        let repo = db.factures();
        let scope = AccessScope::Unrestricted;

        let f = repo.receive(&new_facture("INV-1", None, 1_000_000)).await.unwrap();
        let item_id = f.items[0].id.clone();
        let verified = repo
            .verify(
                &f.facture.id,
                &scope,
                &[ItemVerification {
                    item_id,
                    received_quantity: 10,
                    accepted_quantity: 9,
                }],
                "u-admin",
            )
            .await
            .unwrap();

        assert_eq!(verified.facture.status, FactureStatus::Verified);
        assert!(verified.items[0].is_verified);
        assert_eq!(verified.items[0].accepted_quantity, Some(9));

        let err = repo.verify(&f.facture.id, &scope, &[], "u-admin").await.unwrap_err();
        assert!(matches!(err, DbError::Rejected(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_verify_unknown_item_rolls_back() {
        let db = db().await;
        let repo = db.factures();
        let scope = AccessScope::Unrestricted;

        let f = repo.receive(&new_facture("INV-1", None, 1_000_000)).await.unwrap();
        let err = repo
            .verify(
                &f.facture.id,
                &scope,
                &[ItemVerification {
                    item_id: "nope".to_string(),
                    received_quantity: 1,
                    accepted_quantity: 1,
                }],
                "u-admin",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Rejected(CoreError::Validation(_))));
        let after = repo.get(&f.facture.id, &scope).await.unwrap().unwrap();
        assert_eq!(after.status, FactureStatus::Received);
    }

    #[tokio::test]
    async fn test_add_item_recomputes_derived_total() {
        let db = db().await;
        let repo = db.factures();
        let scope = AccessScope::Unrestricted;

        let mut new = new_facture("INV-1", None, 250_000);
        new.total_from_items = true;
        let f = repo.receive(&new).await.unwrap();

        let detail = repo
            .add_item(
                &f.facture.id,
                &scope,
                "u-admin",
                &NewFactureItem {
                    description: "Sugar 1kg".to_string(),
                    quantity: 5,
                    unit_price: 10_000,
                    tax_rate_bps: 1000,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[1].line_no, 2);
        assert_eq!(detail.facture.total_amount, 250_000 + 55_000);
    }

    #[tokio::test]
    async fn test_dispute_resume_cycle() {
        let db = db().await;
        let repo = db.factures();
        let scope = AccessScope::Unrestricted;

        let f = repo.receive(&new_facture("INV-1", None, 1_000_000)).await.unwrap();
        let disputed = repo
            .dispute(&f.facture.id, &scope, "u-admin", "short delivery", &["scan/1.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(disputed.facture.status, FactureStatus::Disputed);
        assert_eq!(disputed.facture.dispute_reason.as_deref(), Some("short delivery"));
        assert_eq!(disputed.facture.supporting_documents, vec!["scan/1.pdf".to_string()]);

        let resumed = repo
            .resume(&f.facture.id, &scope, "u-admin", "credit note received")
            .await
            .unwrap();
        assert_eq!(resumed.facture.status, FactureStatus::Received);
        assert!(resumed.facture.dispute_reason.is_none());
        let notes = resumed.facture.notes.unwrap();
        assert!(notes.contains("short delivery"));
        assert!(notes.contains("credit note received"));
    }

    #[tokio::test]
    async fn test_overdue_and_summary() {
        let db = db().await;
        let repo = db.factures();
        let scope = AccessScope::Unrestricted;

        repo.receive(&new_facture("INV-1", None, 1_000_000)).await.unwrap();
        let cancelled = repo.receive(&new_facture("INV-2", None, 2_000_000)).await.unwrap();
        repo.cancel(&cancelled.facture.id, &scope, "u-admin", "wrong supplier")
            .await
            .unwrap();

        let overdue = repo.overdue(&scope, date(2024, 2, 1)).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert!(repo.overdue(&scope, date(2024, 1, 31)).await.unwrap().is_empty());

        let summary = repo.summary(&scope, date(2024, 2, 1)).await.unwrap();
        assert_eq!(summary.total_outstanding, 1_000_000);
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.total_overdue, 1_000_000);
        assert_eq!(summary.by_status.len(), 2);
        assert_eq!(summary.by_status[0].status, FactureStatus::Received);
    }
}
