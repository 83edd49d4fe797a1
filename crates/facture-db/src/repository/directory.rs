//! # Directory Repository
//!
//! Suppliers and users backing the bundled directory implementation.

use chrono::Utc;
use facture_core::{Actor, Role, Supplier};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Repository for supplier and user records.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: SqlitePool,
}

impl DirectoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DirectoryRepository { pool }
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT id, company_name, payment_terms_days, credit_limit
            FROM suppliers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(supplier)
    }

    pub async fn insert_supplier(&self, supplier: &Supplier) -> DbResult<()> {
        debug!(supplier_id = %supplier.id, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, company_name, payment_terms_days, credit_limit, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.company_name)
        .bind(supplier.payment_terms_days)
        .bind(supplier.credit_limit)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_suppliers(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_user(&self, id: &str) -> DbResult<Option<Actor>> {
        let user = sqlx::query_as::<_, Actor>("SELECT id, role, branch_id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn insert_user(
        &self,
        id: &str,
        name: &str,
        role: Role,
        branch_id: Option<&str>,
    ) -> DbResult<Actor> {
        debug!(user_id = %id, ?role, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, name, role, branch_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(role)
        .bind(branch_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(Actor {
            user_id: id.to_string(),
            role,
            branch_id: branch_id.map(str::to_string),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_supplier_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = db.directory();

        let supplier = Supplier {
            id: "sup-1".to_string(),
            company_name: "PT Sumber Makmur".to_string(),
            payment_terms_days: 30,
            credit_limit: 100_000_000,
        };
        dir.insert_supplier(&supplier).await.unwrap();

        assert_eq!(dir.get_supplier("sup-1").await.unwrap(), Some(supplier));
        assert_eq!(dir.get_supplier("missing").await.unwrap(), None);
        assert_eq!(dir.count_suppliers().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_role_and_branch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = db.directory();

        dir.insert_user("u-admin", "Ayu", Role::Admin, None).await.unwrap();
        dir.insert_user("u-staff", "Budi", Role::Staff, Some("B-01")).await.unwrap();

        let staff = dir.get_user("u-staff").await.unwrap().unwrap();
        assert_eq!(staff.role, Role::Staff);
        assert_eq!(staff.branch_id.as_deref(), Some("B-01"));

        let err = dir.insert_user("u-staff", "Budi", Role::Staff, None).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
