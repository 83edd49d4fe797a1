//! # Facture Service
//!
//! The workflow entry point: one method per exposed operation.
//!
//! ## Request Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Every Operation                                    │
//! │                                                                         │
//! │  1. Resolve actor ── UserDirectory::get_user(actor_id)                 │
//! │       │                 unknown ──► NotFound                           │
//! │       ▼                 failure ──► DependencyUnavailable              │
//! │  2. AccessScope::for_actor(&actor)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Validate request (facture-core) ── before any write                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  4. with_retry(policy, op, || repo.op(...))                            │
//! │       │     one transaction per attempt, guards inside                 │
//! │       ▼                                                                 │
//! │  5. DbError ──► ServiceError                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Operations live in submodules by area:
//! - [`facture`]: receive, items, verify, approve, dispute, resume, cancel, update, reads
//! - [`payment`]: schedule, process, confirm, cancel, update, list
//! - [`queries`]: pending/overdue/due-soon lists, aging report, summary

mod facture;
mod payment;
mod queries;

use std::sync::Arc;

use facture_core::{AccessScope, Actor};
use facture_db::{Database, RetryPolicy};
use tracing::debug;

use crate::config::{BackofficeConfig, WorkflowSettings};
use crate::directory::{SqliteDirectory, SupplierDirectory, UserDirectory};
use crate::error::{ServiceError, ServiceResult};

/// Supplier invoice workflow service.
///
/// Cheap to clone; all state is behind the pool and `Arc`s.
#[derive(Clone)]
pub struct FactureService {
    db: Database,
    suppliers: Arc<dyn SupplierDirectory>,
    users: Arc<dyn UserDirectory>,
    settings: WorkflowSettings,
    retry: RetryPolicy,
}

impl std::fmt::Debug for FactureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactureService")
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl FactureService {
    pub fn new(
        db: Database,
        suppliers: Arc<dyn SupplierDirectory>,
        users: Arc<dyn UserDirectory>,
        settings: WorkflowSettings,
        retry: RetryPolicy,
    ) -> Self {
        FactureService {
            db,
            suppliers,
            users,
            settings,
            retry,
        }
    }

    /// Service whose directories are the `suppliers`/`users` tables of `db`.
    pub fn with_sqlite_directory(db: Database, settings: WorkflowSettings, retry: RetryPolicy) -> Self {
        let directory = Arc::new(SqliteDirectory::new(db.directory()));
        FactureService::new(db, directory.clone(), directory, settings, retry)
    }

    /// Opens the configured database and builds the service on it.
    pub async fn connect(config: &BackofficeConfig) -> ServiceResult<Self> {
        let db = Database::new(config.database.to_db_config()).await?;
        Ok(FactureService::with_sqlite_directory(
            db,
            config.workflow,
            config.retry.policy(),
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Looks the actor up and derives their branch scope.
    async fn resolve_actor(&self, actor_id: &str) -> ServiceResult<(Actor, AccessScope)> {
        let actor = self
            .users
            .get_user(actor_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", actor_id))?;
        let scope = AccessScope::for_actor(&actor);

        debug!(actor = %actor.user_id, role = ?actor.role, ?scope, "Resolved actor");
        Ok((actor, scope))
    }
}
