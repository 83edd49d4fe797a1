//! # facture-core: Pure Business Logic for Supplier Invoices
//!
//! This crate is the **heart** of the back-office invoice workflow. It holds
//! every rule of the facture lifecycle as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Back Office Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/backoffice (FactureService)                │   │
//! │  │   receive, verify, approve, schedule/process/confirm payment   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ facture-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   calc    │  │ lifecycle │  │   scope   │  │   │
//! │  │   │  Facture  │  │ LineTotal │  │  guards   │  │  Branch   │  │   │
//! │  │   │  Payment  │  │  Aging    │  │  status   │  │  gate     │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  facture-db (Database Layer)                    │   │
//! │  │          SQLite queries, migrations, sequences, retry           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Facture, FactureItem, FacturePayment, ...)
//! - [`requests`] - Inputs for the workflow operations
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`calc`] - Line totals, due dates, aging buckets
//! - [`lifecycle`] - Transition guards for factures and payments
//! - [`scope`] - Branch access scope
//! - [`sequence`] - Internal reference number format
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use facture_core::calc::line_total;
//! use facture_core::money::Money;
//! use facture_core::types::TaxRate;
//!
//! // 10 units at 25,000 with a 5,000 line discount
//! let line = line_total(10, Money::from_minor(25_000), Money::from_minor(5_000)).unwrap();
//! assert_eq!(line.minor(), 245_000);
//!
//! // 11% VAT on the line
//! let tax = line.calculate_tax(TaxRate::from_bps(1100));
//! assert_eq!(tax.minor(), 26_950);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calc;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod requests;
pub mod scope;
pub mod sequence;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use requests::*;
pub use scope::AccessScope;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Invoices at or above this total must be approved before payment.
///
/// Expressed in the smallest currency unit. Below the threshold a verified
/// invoice may go straight to payment scheduling.
pub const APPROVAL_THRESHOLD: i64 = 50_000_000;

/// Received quantity above `ordered × tolerance` is flagged as a variance.
///
/// In basis points: 11_000 = 110% of the ordered quantity.
pub const RECEIVE_TOLERANCE_BPS: u32 = 11_000;

/// Default look-ahead window for the due-soon query.
pub const DEFAULT_DUE_SOON_DAYS: i64 = 7;

/// Maximum ordered quantity on a single facture line.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

/// Maximum number of lines on a single facture.
pub const MAX_FACTURE_ITEMS: usize = 500;

/// Largest single amount in minor units: a line with its tax, a header tax or
/// discount, a declared total.
///
/// `MAX_FACTURE_ITEMS` lines at this cap still sum well inside `i64`.
pub const MAX_LINE_AMOUNT: i64 = 1_000_000_000_000_000;
