//! # Titan Back Office
//!
//! Supplier invoice (facture) workflow service.
//!
//! ## Module Organization
//! ```text
//! backoffice/
//! ├── lib.rs          ◄─── You are here (exports, tracing setup)
//! ├── config.rs       ◄─── BackofficeConfig: defaults → TOML → env
//! ├── directory.rs    ◄─── Supplier/user directory traits + SQLite impl
//! ├── error.rs        ◄─── ServiceError taxonomy, ApiError for callers
//! └── service/
//!     ├── mod.rs      ◄─── FactureService, actor resolution
//!     ├── facture.rs  ◄─── receive, verify, approve, dispute, cancel, ...
//!     ├── payment.rs  ◄─── schedule, process, confirm, cancel, update
//!     └── queries.rs  ◄─── pending lists, overdue, aging, summary
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use backoffice::{BackofficeConfig, FactureService};
//!
//! let config = BackofficeConfig::load(None)?;
//! let service = FactureService::connect(&config).await?;
//! let detail = service.receive_invoice("u-admin", request).await?;
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod service;

pub use config::{BackofficeConfig, WorkflowSettings};
pub use directory::{DirectoryError, SqliteDirectory, SupplierDirectory, UserDirectory};
pub use error::{ApiError, ErrorCode, ServiceError, ServiceResult};
pub use service::FactureService;

use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,backoffice=debug,facture_db=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=facture_db=trace` - Trace the database layer only
/// - Default: [`DEFAULT_LOG_FILTER`]
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
