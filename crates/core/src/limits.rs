//! Plan entitlements and monthly OCR page accounting.
//!
//! Usage lives on the user row as a counter plus the month it belongs to;
//! a new month implicitly resets the counter on first read or write.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use storage::models::UserRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Trial,
    Free,
    Starter,
    Growth,
    Pro,
}

impl Plan {
    /// Unknown or missing plan names fall back to the free tier.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some("trial") => Plan::Trial,
            Some("starter") => Plan::Starter,
            Some("growth") => Plan::Growth,
            Some("pro") => Plan::Pro,
            _ => Plan::Free,
        }
    }

    pub fn ocr_pages_per_month(&self) -> i64 {
        match self {
            Plan::Trial => 15,
            Plan::Free => 10,
            Plan::Starter => 150,
            Plan::Growth => 500,
            Plan::Pro => 2000,
        }
    }
}

/// A trial only blocks processing once its expiry has passed. Missing or
/// unparseable timestamps count as not expired.
pub fn is_trial_expired(trial_expires_at: Option<&str>) -> bool {
    let Some(raw) = trial_expires_at else {
        return false;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(expiry) => Utc::now() > expiry,
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LimitCheck {
    pub allowed: bool,
    pub current_usage: i64,
    pub new_total: i64,
}

#[derive(Clone)]
pub struct UsageTracker {
    pool: SqlitePool,
}

impl UsageTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load_user(&self, user_id: &str) -> anyhow::Result<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Pages used so far this month; counters from earlier months read as 0.
    pub async fn current_usage(&self, user_id: &str) -> anyhow::Result<i64> {
        let user = self
            .load_user(user_id)
            .await?
            .with_context(|| format!("user {user_id} not found"))?;
        if user.usage_month.as_deref() == Some(current_month().as_str()) {
            Ok(user.ocr_pages_used)
        } else {
            Ok(0)
        }
    }

    pub async fn check_ocr_limit(
        &self,
        user_id: &str,
        page_count: i64,
        limit: i64,
    ) -> anyhow::Result<LimitCheck> {
        let current_usage = self.current_usage(user_id).await?;
        let new_total = current_usage + page_count;
        Ok(LimitCheck {
            allowed: new_total <= limit,
            current_usage,
            new_total,
        })
    }

    /// Add to the monthly counter, resetting it first if the stored month is
    /// stale. Returns the new monthly total.
    pub async fn increment_ocr_usage(
        &self,
        user_id: &str,
        page_count: i64,
    ) -> anyhow::Result<i64> {
        let month = current_month();
        sqlx::query(
            "UPDATE users
             SET ocr_pages_used = CASE WHEN usage_month = ? THEN ocr_pages_used + ? ELSE ? END,
                 usage_month = ?
             WHERE id = ?",
        )
        .bind(&month)
        .bind(page_count)
        .bind(page_count)
        .bind(&month)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("increment ocr usage")?;

        self.current_usage(user_id).await
    }
}

fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_pool() -> SqlitePool {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        pool
    }

    async fn insert_user(pool: &SqlitePool, id: &str, plan: Option<&str>, used: i64, month: Option<&str>) {
        sqlx::query(
            "INSERT INTO users (id, plan, trial_expires_at, ocr_pages_used, usage_month)
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(id)
        .bind(plan)
        .bind(used)
        .bind(month)
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    fn unknown_plans_fall_back_to_free() {
        assert_eq!(Plan::from_name(Some("pro")), Plan::Pro);
        assert_eq!(Plan::from_name(Some("enterprise")), Plan::Free);
        assert_eq!(Plan::from_name(None), Plan::Free);
    }

    #[test]
    fn trial_expiry_compares_against_now() {
        let past = (Utc::now() - Duration::days(1)).to_rfc3339();
        let future = (Utc::now() + Duration::days(1)).to_rfc3339();
        assert!(is_trial_expired(Some(&past)));
        assert!(!is_trial_expired(Some(&future)));
        assert!(!is_trial_expired(None));
        assert!(!is_trial_expired(Some("not-a-date")));
    }

    #[tokio::test]
    async fn limit_check_counts_the_requested_pages() {
        let pool = test_pool().await;
        let month = current_month();
        insert_user(&pool, "u1", Some("trial"), 14, Some(&month)).await;

        let tracker = UsageTracker::new(pool);
        let ok = tracker.check_ocr_limit("u1", 1, 15).await.unwrap();
        assert!(ok.allowed);
        assert_eq!(ok.new_total, 15);

        let over = tracker.check_ocr_limit("u1", 2, 15).await.unwrap();
        assert!(!over.allowed);
    }

    #[tokio::test]
    async fn stale_month_reads_as_zero_and_resets_on_increment() {
        let pool = test_pool().await;
        insert_user(&pool, "u1", Some("starter"), 120, Some("2020-01")).await;

        let tracker = UsageTracker::new(pool);
        assert_eq!(tracker.current_usage("u1").await.unwrap(), 0);

        let total = tracker.increment_ocr_usage("u1", 3).await.unwrap();
        assert_eq!(total, 3);

        let total = tracker.increment_ocr_usage("u1", 2).await.unwrap();
        assert_eq!(total, 5);
    }
}
