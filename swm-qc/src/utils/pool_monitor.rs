//! Transaction timing
//!
//! Wraps a SQLite transaction so acquisition wait and hold time show up in the
//! logs. A consolidation run holds its transaction for the whole run, so a slow
//! run is visible here first.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;
use swm_common::{Error, Result};

const SLOW_ACQUIRE_MS: u128 = 1000;
const LONG_HOLD_MS: u128 = 2000;

/// Transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> MonitoredTransaction<'c> {
    /// Connection to run statements on
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.tx
            .as_deref_mut()
            .ok_or(Error::TransactionFinished(self.caller))
    }

    pub async fn commit(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.commit().await?;
        self.log_release("commit");
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        let tx = self.take()?;
        tx.rollback().await?;
        self.log_release("rollback");
        Ok(())
    }

    fn take(&mut self) -> Result<Transaction<'c, Sqlite>> {
        self.tx
            .take()
            .ok_or(Error::TransactionFinished(self.caller))
    }

    fn log_release(&self, how: &'static str) {
        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > LONG_HOLD_MS {
            tracing::warn!(caller = self.caller, held_ms, how, "Long transaction");
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Transaction released");
        }
    }
}

impl Drop for MonitoredTransaction<'_> {
    fn drop(&mut self) {
        // Still open here means an error path; sqlx rolls back on drop
        if self.tx.is_some() {
            tracing::warn!(
                caller = self.caller,
                held_ms = self.acquired_at.elapsed().as_millis(),
                "Transaction dropped without commit, rolling back"
            );
        }
    }
}

/// Begin a transaction with timing logs
pub async fn begin_monitored<'c>(
    pool: &'c SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction<'c>> {
    let start = Instant::now();
    tracing::debug!(caller, "Transaction requested");

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > SLOW_ACQUIRE_MS {
        tracing::warn!(caller, wait_ms, "Slow connection acquisition");
    } else {
        tracing::debug!(caller, wait_ms, "Transaction started");
    }

    Ok(MonitoredTransaction {
        tx: Some(tx),
        caller,
        acquired_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_persists_and_drop_rolls_back() {
        let pool = swm_common::db::open_in_memory().await.unwrap();

        let mut tx = begin_monitored(&pool, "test::commit").await.unwrap();
        sqlx::query("INSERT INTO sites (site_name) VALUES ('Committed Creek')")
            .execute(tx.conn().unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        {
            let mut tx = begin_monitored(&pool, "test::drop").await.unwrap();
            sqlx::query("INSERT INTO sites (site_name) VALUES ('Dropped Creek')")
                .execute(tx.conn().unwrap())
                .await
                .unwrap();
        }

        let names: Vec<String> = sqlx::query_scalar("SELECT site_name FROM sites ORDER BY site_name")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(names, vec!["Committed Creek".to_string()]);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let pool = swm_common::db::open_in_memory().await.unwrap();

        let mut tx = begin_monitored(&pool, "test::rollback").await.unwrap();
        sqlx::query("INSERT INTO sites (site_name) VALUES ('Rolled Back Run')")
            .execute(tx.conn().unwrap())
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
