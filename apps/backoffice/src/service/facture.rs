//! Facture lifecycle operations.

use facture_core::calc::{resolve_due_date, total_from_new_items};
use facture_core::validation::{
    validate_date_order, validate_document_refs, validate_optional_text, validate_reason,
};
use facture_core::{
    Facture, FactureDetail, FactureFilter, ItemVariance, ItemVerification, Money, NewFactureItem,
    ReceiveFacture, UpdateFacture, ValidationError, MAX_FACTURE_ITEMS,
};
use facture_db::repository::facture::current_reference_year;
use facture_db::{with_retry, NewFacture};
use tracing::{info, warn};

use super::FactureService;
use crate::error::{ServiceError, ServiceResult};

impl FactureService {
    // =========================================================================
    // Receive
    // =========================================================================

    /// Registers a supplier invoice, with or without items.
    ///
    /// ## What This Does
    /// 1. Validates the request and that the branch is inside the actor's scope
    /// 2. Looks up the supplier (unknown → Validation)
    /// 3. Rejects a supplier invoice number already received for the supplier
    /// 4. Derives the total from the items when there are any; a declared
    ///    total must then match
    /// 5. Resolves the due date from the supplier's payment terms
    /// 6. Persists header + items and allocates `INT-FAC-<year>-NNNNN`
    pub async fn receive_invoice(&self, actor_id: &str, req: ReceiveFacture) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        req.validate()?;

        if let Some(branch) = req.branch_id.as_deref() {
            if !scope.allows(Some(branch)) {
                warn!(actor = %actor.user_id, branch, "Receive into branch outside scope");
                return Err(ServiceError::not_found("branch", branch));
            }
        }

        let supplier = self
            .suppliers
            .get_supplier(&req.supplier_id, &actor)
            .await?
            .ok_or_else(|| ValidationError::UnknownReference {
                field: "supplier_id".to_string(),
                value: req.supplier_id.clone(),
            })?;

        let factures = &self.db.factures();
        if factures
            .supplier_invoice_exists(&supplier.id, &req.supplier_invoice_number)
            .await?
        {
            return Err(ValidationError::Duplicate {
                field: "supplier_invoice_number".to_string(),
                value: req.supplier_invoice_number.trim().to_string(),
            }
            .into());
        }

        let (total_amount, total_from_items) = if req.items.is_empty() {
            (req.total_amount.unwrap_or_default(), false)
        } else {
            let computed = total_from_new_items(
                &req.items,
                Money::from_minor(req.tax_amount),
                Money::from_minor(req.discount_amount),
            )?
            .minor();
            if let Some(declared) = req.total_amount {
                if declared != computed {
                    return Err(ValidationError::TotalMismatch { declared, computed }.into());
                }
            }
            (computed, true)
        };
        if total_amount <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "total_amount".to_string(),
            }
            .into());
        }

        let due_date = resolve_due_date(req.invoice_date, req.due_date, supplier.payment_terms_days)?;
        validate_date_order(req.invoice_date, due_date)?;

        let new = NewFacture {
            request: req,
            due_date,
            total_amount,
            total_from_items,
            received_by: actor.user_id.clone(),
            reference_year: current_reference_year(),
        };

        let new = &new;
        let detail = with_retry(self.retry, "receive_invoice", move || factures.receive(new)).await?;

        info!(
            facture_id = %detail.facture.id,
            reference = %detail.facture.internal_reference_number,
            supplier_id = %detail.facture.supplier_id,
            total = detail.facture.total_amount,
            "Invoice received"
        );
        Ok(detail)
    }

    /// Appends an item to a Received invoice.
    pub async fn add_item(&self, actor_id: &str, facture_id: &str, item: NewFactureItem) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        item.validate()?;

        let factures = &self.db.factures();
        if let Some(detail) = factures.get_detail(facture_id, &scope).await? {
            if detail.items.len() >= MAX_FACTURE_ITEMS {
                return Err(ValidationError::OutOfRange {
                    field: "items".to_string(),
                    min: 0,
                    max: MAX_FACTURE_ITEMS as i64,
                }
                .into());
            }
        }

        let (scope, actor_id, item) = (&scope, actor.user_id.as_str(), &item);
        let detail = with_retry(self.retry, "add_item", move || {
            factures.add_item(facture_id, scope, actor_id, item)
        })
        .await?;

        info!(facture_id = %facture_id, items = detail.items.len(), "Item added");
        Ok(detail)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Records received/accepted quantities and moves the invoice to Verified.
    pub async fn verify_items(
        &self,
        actor_id: &str,
        facture_id: &str,
        verifications: Vec<ItemVerification>,
    ) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        for v in &verifications {
            v.validate()?;
        }
        for (i, v) in verifications.iter().enumerate() {
            if verifications[..i].iter().any(|prev| prev.item_id == v.item_id) {
                return Err(ValidationError::Duplicate {
                    field: "item_id".to_string(),
                    value: v.item_id.clone(),
                }
                .into());
            }
        }

        let factures = &self.db.factures();
        let (scope, actor_id, verifications) = (&scope, actor.user_id.as_str(), verifications.as_slice());
        let detail = with_retry(self.retry, "verify_items", move || {
            factures.verify(facture_id, scope, verifications, actor_id)
        })
        .await?;

        info!(facture_id = %facture_id, verified_by = %actor_id, "Invoice verified");
        Ok(detail)
    }

    /// Approves a Verified invoice at or above the approval threshold.
    pub async fn approve_invoice(
        &self,
        actor_id: &str,
        facture_id: &str,
        note: Option<&str>,
    ) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        validate_optional_text("note", note, 2000)?;

        let note = match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => format!("Approved by {}: {}", actor.user_id, n),
            None => format!("Approved by {}", actor.user_id),
        };

        let factures = &self.db.factures();
        let threshold = self.settings.approval_threshold;
        let (scope, actor_id, note) = (&scope, actor.user_id.as_str(), note.as_str());
        let detail = with_retry(self.retry, "approve_invoice", move || {
            factures.approve(facture_id, scope, actor_id, note, threshold)
        })
        .await?;

        info!(facture_id = %facture_id, approved_by = %actor_id, "Invoice approved");
        Ok(detail)
    }

    /// Puts an invoice on hold with a reason and optional document references.
    pub async fn dispute_invoice(
        &self,
        actor_id: &str,
        facture_id: &str,
        reason: &str,
        documents: Vec<String>,
    ) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        let reason = validate_reason(reason)?;
        validate_document_refs(&documents)?;

        let factures = &self.db.factures();
        let (scope, actor_id, reason, documents) =
            (&scope, actor.user_id.as_str(), reason.as_str(), documents.as_slice());
        let detail = with_retry(self.retry, "dispute_invoice", move || {
            factures.dispute(facture_id, scope, actor_id, reason, documents)
        })
        .await?;

        info!(facture_id = %facture_id, reason = %reason, "Invoice disputed");
        Ok(detail)
    }

    /// Takes a Disputed invoice off hold.
    pub async fn resume_invoice(&self, actor_id: &str, facture_id: &str, note: &str) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        let note = validate_reason(note)?;

        let factures = &self.db.factures();
        let (scope, actor_id, note) = (&scope, actor.user_id.as_str(), note.as_str());
        let detail = with_retry(self.retry, "resume_invoice", move || {
            factures.resume(facture_id, scope, actor_id, note)
        })
        .await?;

        info!(facture_id = %facture_id, status = %detail.facture.status, "Invoice resumed");
        Ok(detail)
    }

    /// Cancels an invoice nothing has been paid on.
    pub async fn cancel_invoice(&self, actor_id: &str, facture_id: &str, reason: &str) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        let reason = validate_reason(reason)?;

        let factures = &self.db.factures();
        let (scope, actor_id, reason) = (&scope, actor.user_id.as_str(), reason.as_str());
        let detail = with_retry(self.retry, "cancel_invoice", move || {
            factures.cancel(facture_id, scope, actor_id, reason)
        })
        .await?;

        info!(facture_id = %facture_id, reason = %reason, "Invoice cancelled");
        Ok(detail)
    }

    /// Edits due date, PO number, delivery info or notes while Received/Verified.
    pub async fn update_invoice(
        &self,
        actor_id: &str,
        facture_id: &str,
        changes: UpdateFacture,
    ) -> ServiceResult<FactureDetail> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        if changes.is_empty() {
            return Err(ValidationError::Required {
                field: "at least one field".to_string(),
            }
            .into());
        }
        changes.validate()?;

        let factures = &self.db.factures();
        if let Some(due) = changes.due_date {
            let current = factures
                .get(facture_id, &scope)
                .await?
                .ok_or_else(|| ServiceError::not_found("facture", facture_id))?;
            validate_date_order(current.invoice_date, due)?;
        }

        let (scope, actor_id, changes) = (&scope, actor.user_id.as_str(), &changes);
        let detail = with_retry(self.retry, "update_invoice", move || {
            factures.update_metadata(facture_id, scope, actor_id, changes)
        })
        .await?;

        info!(facture_id = %facture_id, "Invoice updated");
        Ok(detail)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Invoice with items and payments.
    pub async fn get_by_id(&self, actor_id: &str, facture_id: &str) -> ServiceResult<FactureDetail> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        self.db
            .factures()
            .get_detail(facture_id, &scope)
            .await?
            .ok_or_else(|| ServiceError::not_found("facture", facture_id))
    }

    pub async fn list(&self, actor_id: &str, filter: &FactureFilter) -> ServiceResult<Vec<Facture>> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        if let (Some(from), Some(to)) = (filter.invoice_date_from, filter.invoice_date_to) {
            if from > to {
                return Err(ValidationError::InvalidFormat {
                    field: "invoice_date_from".to_string(),
                    reason: "must not be after invoice_date_to".to_string(),
                }
                .into());
            }
        }
        Ok(self.db.factures().list(filter, &scope).await?)
    }

    /// Ordered vs received vs accepted per item.
    pub async fn item_variances(&self, actor_id: &str, facture_id: &str) -> ServiceResult<Vec<ItemVariance>> {
        let detail = self.get_by_id(actor_id, facture_id).await?;
        Ok(detail.item_variances(self.settings.receive_tolerance_bps))
    }
}
