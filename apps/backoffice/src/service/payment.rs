//! Payment lifecycle operations.

use chrono::Utc;
use facture_core::validation::{validate_optional_text, validate_reason};
use facture_core::{FacturePayment, PaymentResult, ProcessPayment, SchedulePayment, UpdatePayment};
use facture_db::with_retry;
use tracing::info;

use super::FactureService;
use crate::error::{ServiceError, ServiceResult};

impl FactureService {
    /// Schedules a payment against a payable invoice.
    ///
    /// The amount must be positive and fit in what is left after confirmed
    /// and already-scheduled payments.
    pub async fn schedule_payment(
        &self,
        actor_id: &str,
        facture_id: &str,
        req: SchedulePayment,
    ) -> ServiceResult<PaymentResult> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        req.validate()?;

        let payments = &self.db.payments();
        let threshold = self.settings.approval_threshold;
        let (scope, actor_id, req) = (&scope, actor.user_id.as_str(), &req);
        let result = with_retry(self.retry, "schedule_payment", move || {
            payments.schedule(facture_id, scope, req, actor_id, threshold)
        })
        .await?;

        info!(
            payment_id = %result.payment.id,
            facture_id = %facture_id,
            amount = req.amount,
            "Payment scheduled"
        );
        Ok(result)
    }

    /// Records the transfer/check reference of a Scheduled payment.
    pub async fn process_payment(
        &self,
        actor_id: &str,
        payment_id: &str,
        req: ProcessPayment,
    ) -> ServiceResult<PaymentResult> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        req.validate()?;

        let today = Utc::now().date_naive();
        let payments = &self.db.payments();
        let (scope, actor_id, req) = (&scope, actor.user_id.as_str(), &req);
        let result = with_retry(self.retry, "process_payment", move || {
            payments.process(payment_id, scope, req, actor_id, today)
        })
        .await?;

        info!(payment_id = %payment_id, reference = %req.reference_number, "Payment processed");
        Ok(result)
    }

    /// Confirms a Processed payment and applies it to the invoice.
    ///
    /// Payment and invoice change in one transaction. A retry after a
    /// committed attempt finds the payment Confirmed and is rejected, so the
    /// paid amount is never incremented twice.
    pub async fn confirm_payment(
        &self,
        actor_id: &str,
        payment_id: &str,
        acknowledgement: Option<&str>,
    ) -> ServiceResult<PaymentResult> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        validate_optional_text("supplier_acknowledgement", acknowledgement, 500)?;

        let payments = &self.db.payments();
        let threshold = self.settings.approval_threshold;
        let (scope, actor_id) = (&scope, actor.user_id.as_str());
        let result = with_retry(self.retry, "confirm_payment", move || {
            payments.confirm(payment_id, scope, acknowledgement, actor_id, threshold)
        })
        .await?;

        info!(
            payment_id = %payment_id,
            facture_id = %result.facture.id,
            paid = result.facture.paid_amount,
            outstanding = result.facture.outstanding().minor(),
            status = %result.facture.status,
            "Payment confirmed"
        );
        Ok(result)
    }

    /// Fails a payment that is not yet Confirmed. Invoice totals are untouched.
    pub async fn cancel_payment(&self, actor_id: &str, payment_id: &str, reason: &str) -> ServiceResult<PaymentResult> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        let reason = validate_reason(reason)?;

        let payments = &self.db.payments();
        let (scope, actor_id, reason) = (&scope, actor.user_id.as_str(), reason.as_str());
        let result = with_retry(self.retry, "cancel_payment", move || {
            payments.fail(payment_id, scope, reason, actor_id)
        })
        .await?;

        info!(payment_id = %payment_id, reason = %reason, "Payment cancelled");
        Ok(result)
    }

    /// Edits bank account or notes of an open payment.
    pub async fn update_payment(
        &self,
        actor_id: &str,
        payment_id: &str,
        req: UpdatePayment,
    ) -> ServiceResult<PaymentResult> {
        let (actor, scope) = self.resolve_actor(actor_id).await?;
        req.validate()?;

        let payments = &self.db.payments();
        let (scope, actor_id, req) = (&scope, actor.user_id.as_str(), &req);
        let result = with_retry(self.retry, "update_payment", move || {
            payments.update(payment_id, scope, req, actor_id)
        })
        .await?;

        info!(payment_id = %payment_id, "Payment updated");
        Ok(result)
    }

    /// Payments of one invoice in scheduling order.
    pub async fn list_payments(&self, actor_id: &str, facture_id: &str) -> ServiceResult<Vec<FacturePayment>> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        self.db
            .payments()
            .list_for_facture(facture_id, &scope)
            .await?
            .ok_or_else(|| ServiceError::not_found("facture", facture_id))
    }
}
