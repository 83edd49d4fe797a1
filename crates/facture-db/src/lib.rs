//! # facture-db: Database Layer for the Facture Workflow
//!
//! SQLite storage for factures, their items and payments, plus the
//! reference-number counters and the bundled supplier/user directory.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back Office Data Flow                            │
//! │                                                                         │
//! │  FactureService (apps/backoffice)                                      │
//! │       │  guards checked, actor scope resolved                          │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   facture-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ FactureRepo    │    │ 001_init.sql │ │   │
//! │  │   │ SqlitePool    │◄───│ PaymentRepo    │    │              │ │   │
//! │  │   │ WAL, busy     │    │ SequenceRepo   │    │              │ │   │
//! │  │   │ timeout       │    │ DirectoryRepo  │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  │   retry.rs: bounded exponential backoff on busy/locked         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Rules
//! - Every mutation is one transaction, opened with a write first so SQLite
//!   takes the write lock up front.
//! - Status changes are `UPDATE ... WHERE status IN (...)`; zero affected rows
//!   means someone else moved the record first ([`DbError::StaleState`]).
//! - Payment confirmation increments `paid_amount` in SQL, guarded by
//!   `paid_amount + amount <= total_amount`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use facture_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("backoffice.db")).await?;
//! let detail = db.factures().get_detail(&id, &scope).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use retry::{with_retry, RetryPolicy};

// Repository re-exports for convenience
pub use repository::directory::DirectoryRepository;
pub use repository::facture::{FactureRepository, NewFacture};
pub use repository::payment::PaymentRepository;
pub use repository::sequence::SequenceRepository;
