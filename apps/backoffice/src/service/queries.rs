//! Workflow queries.
//!
//! All take `today` so reports can be produced for any as-of date.

use chrono::{Duration, NaiveDate};
use facture_core::calc::{aging_report, AgingReport};
use facture_core::{Facture, FactureSummary};
use tracing::debug;

use super::FactureService;
use crate::error::ServiceResult;

impl FactureService {
    /// Received invoices waiting for item verification.
    pub async fn pending_verification(&self, actor_id: &str) -> ServiceResult<Vec<Facture>> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        Ok(self.db.factures().pending_verification(&scope).await?)
    }

    /// Verified invoices at or above the approval threshold.
    pub async fn pending_approval(&self, actor_id: &str) -> ServiceResult<Vec<Facture>> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        Ok(self
            .db
            .factures()
            .pending_approval(&scope, self.settings.approval_threshold)
            .await?)
    }

    /// Open invoices past their due date, Disputed included.
    pub async fn overdue_payments(&self, actor_id: &str, today: NaiveDate) -> ServiceResult<Vec<Facture>> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        Ok(self.db.factures().overdue(&scope, today).await?)
    }

    /// Open invoices due within the configured window from `today`.
    pub async fn due_soon(&self, actor_id: &str, today: NaiveDate) -> ServiceResult<Vec<Facture>> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        let until = today + Duration::days(self.settings.due_soon_days);
        Ok(self.db.factures().due_between(&scope, today, until).await?)
    }

    /// Outstanding amounts bucketed by days overdue.
    pub async fn aging_report(&self, actor_id: &str, today: NaiveDate) -> ServiceResult<AgingReport> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        let open = self.db.factures().outstanding(&scope).await?;

        debug!(open = open.len(), %today, "Building aging report");
        Ok(aging_report(open.iter(), today))
    }

    /// Counts and amounts per status, plus outstanding and overdue totals.
    pub async fn summary(&self, actor_id: &str, today: NaiveDate) -> ServiceResult<FactureSummary> {
        let (_, scope) = self.resolve_actor(actor_id).await?;
        Ok(self.db.factures().summary(&scope, today).await?)
    }
}
