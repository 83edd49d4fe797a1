//! # Sequence Repository
//!
//! Counters behind the internal reference numbers.
//!
//! ```text
//!   reference_sequences
//!   ┌──────────────────┬────────────┐
//!   │ prefix           │ last_value │
//!   ├──────────────────┼────────────┤
//!   │ INT-FAC-2024-    │ 1287       │
//!   │ INT-FAC-2025-    │ 42         │
//!   └──────────────────┴────────────┘
//! ```
//!
//! Allocation is a single upsert-increment with `RETURNING`, executed as the
//! first statement of the receive transaction. The row write serializes
//! concurrent receives, and a rolled-back receive gives its number back.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Allocates the next value for `prefix` on the given connection.
///
/// Must run inside the caller's transaction so the number is only consumed
/// if the caller commits.
pub(crate) async fn allocate(conn: &mut SqliteConnection, prefix: &str) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO reference_sequences (prefix, last_value)
        VALUES (?, 1)
        ON CONFLICT(prefix) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await?;

    debug!(prefix = %prefix, value, "Allocated sequence value");
    Ok(value)
}

/// Repository for reference counters.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Last allocated value for `prefix`, zero if none yet.
    pub async fn current(&self, prefix: &str) -> DbResult<i64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM reference_sequences WHERE prefix = ?")
                .bind(prefix)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.unwrap_or(0))
    }

    /// Allocates one value in its own transaction.
    pub async fn next(&self, prefix: &str) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let value = allocate(&mut tx, prefix).await?;
        tx.commit().await?;
        Ok(value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_allocation_is_sequential_per_prefix() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        assert_eq!(seq.current("INT-FAC-2024-").await.unwrap(), 0);
        assert_eq!(seq.next("INT-FAC-2024-").await.unwrap(), 1);
        assert_eq!(seq.next("INT-FAC-2024-").await.unwrap(), 2);
        assert_eq!(seq.next("INT-FAC-2025-").await.unwrap(), 1);
        assert_eq!(seq.current("INT-FAC-2024-").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rolled_back_allocation_is_not_consumed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.pool().begin().await.unwrap();
            assert_eq!(allocate(&mut tx, "INT-FAC-2024-").await.unwrap(), 1);
            tx.rollback().await.unwrap();
        }

        assert_eq!(db.sequences().next("INT-FAC-2024-").await.unwrap(), 1);
    }
}
