//! # Directories
//!
//! Supplier and user lookups the workflow depends on.
//!
//! Both are traits so a deployment can point them at whatever owns that data.
//! [`SqliteDirectory`] serves them from the `suppliers` and `users` tables of
//! the workflow database.

use async_trait::async_trait;
use facture_core::{Actor, Supplier};
use facture_db::{DirectoryRepository, DbError};
use thiserror::Error;

/// A directory lookup failed (not "absent": absence is `Ok(None)`).
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DbError> for DirectoryError {
    fn from(err: DbError) -> Self {
        DirectoryError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    /// Supplier as seen by `actor`, `None` if unknown.
    async fn get_supplier(&self, id: &str, actor: &Actor) -> Result<Option<Supplier>, DirectoryError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Role and branch of a user, `None` if unknown.
    async fn get_user(&self, id: &str) -> Result<Option<Actor>, DirectoryError>;
}

/// Directory backed by the workflow database.
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    repo: DirectoryRepository,
}

impl SqliteDirectory {
    pub fn new(repo: DirectoryRepository) -> Self {
        SqliteDirectory { repo }
    }
}

#[async_trait]
impl SupplierDirectory for SqliteDirectory {
    async fn get_supplier(&self, id: &str, _actor: &Actor) -> Result<Option<Supplier>, DirectoryError> {
        Ok(self.repo.get_supplier(id).await?)
    }
}

#[async_trait]
impl UserDirectory for SqliteDirectory {
    async fn get_user(&self, id: &str) -> Result<Option<Actor>, DirectoryError> {
        Ok(self.repo.get_user(id).await?)
    }
}
