//! # Repository Module
//!
//! Database repository implementations for the facture workflow.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories and their tables                        │
//! │                                                                         │
//! │  FactureService                                                        │
//! │       │                                                                 │
//! │       │  db.factures().verify(&id, &scope, &items, actor)              │
//! │       ▼                                                                 │
//! │  FactureRepository  ──► factures, facture_items                        │
//! │  PaymentRepository  ──► facture_payments (+ factures.paid_amount)      │
//! │  SequenceRepository ──► reference_sequences                            │
//! │  DirectoryRepository ─► suppliers, users                               │
//! │                                                                         │
//! │  Every read and write takes an AccessScope and filters with            │
//! │  (branch_id IS NULL OR ? = 1 OR branch_id = ?)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`facture::FactureRepository`] - Receive, lifecycle transitions, workflow queries
//! - [`payment::PaymentRepository`] - Payment lifecycle and paid-amount aggregation
//! - [`sequence::SequenceRepository`] - Reference number counters
//! - [`directory::DirectoryRepository`] - Suppliers and users

pub mod directory;
pub mod facture;
pub mod payment;
pub mod sequence;

/// Branch predicate for queries on `factures`. Bind `(unrestricted, branch)`
/// from [`facture_core::AccessScope::sql_params`].
pub(crate) const SCOPE_FILTER: &str = "(branch_id IS NULL OR ? = 1 OR branch_id = ?)";

/// Appends a line to the `notes` column. Bind the line twice.
pub(crate) const APPEND_NOTE: &str =
    "notes = CASE WHEN notes IS NULL OR notes = '' THEN ? ELSE notes || char(10) || ? END";
