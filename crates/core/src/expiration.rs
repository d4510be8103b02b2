//! Expiration tracking collaborator.
//!
//! When a processed document carries an expiration date (licenses, passports,
//! insurance cards), the processor forwards it here so the portal can surface
//! renewal reminders.

use anyhow::Context;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

#[async_trait::async_trait]
pub trait ExpirationSink: Send + Sync {
    async fn save_expiration(
        &self,
        document_id: &str,
        expires_at: &str,
        user_id: &str,
        notify: bool,
    ) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SqliteExpirationStore {
    pool: SqlitePool,
}

impl SqliteExpirationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ExpirationSink for SqliteExpirationStore {
    async fn save_expiration(
        &self,
        document_id: &str,
        expires_at: &str,
        user_id: &str,
        notify: bool,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO document_expirations (document_id, user_id, expires_at, notify, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(document_id) DO UPDATE SET
               expires_at = excluded.expires_at,
               notify = excluded.notify",
        )
        .bind(document_id)
        .bind(user_id)
        .bind(expires_at)
        .bind(notify as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("save expiration data")?;

        debug!(document_id, expires_at, "recorded expiration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::models::ExpirationRow;

    #[tokio::test]
    async fn save_is_an_upsert() {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        let store = SqliteExpirationStore::new(pool.clone());

        store
            .save_expiration("doc1", "2030-01-01", "u1", true)
            .await
            .unwrap();
        store
            .save_expiration("doc1", "2031-06-15", "u1", true)
            .await
            .unwrap();

        let rows = sqlx::query_as::<_, ExpirationRow>("SELECT * FROM document_expirations")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].expires_at, "2031-06-15");
    }
}
