//! Circuit-breaker state per account.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use super::{from_ms, to_ms, DbPool};
use crate::error::ProbeError;

/// Backoff doubling is capped at 2^5 = 32x the base
const MAX_BACKOFF_SHIFT: u32 = 5;

#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub retry_not_before: Option<DateTime<Utc>>,
}

pub fn get(pool: &DbPool, account_id: &str) -> Result<Option<FailureRecord>, ProbeError> {
    let conn = pool.get()?;
    let record = conn
        .query_row(
            "SELECT failure_count, last_error, retry_not_before
             FROM account_failures WHERE account_id = ?1",
            params![account_id],
            |row| {
                Ok(FailureRecord {
                    failure_count: row.get(0)?,
                    last_error: row.get(1)?,
                    retry_not_before: row.get::<_, Option<i64>>(2)?.map(from_ms),
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Record a failed check: bump the rolling count and push retry_not_before
/// out by the profile's base backoff, doubled per consecutive failure.
/// Returns the new retry floor.
pub fn record_failure(
    pool: &DbPool,
    account_id: &str,
    error: &str,
    backoff_minutes: i64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ProbeError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let previous: u32 = tx
        .query_row(
            "SELECT failure_count FROM account_failures WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let count = previous + 1;
    let factor = 1i64 << (count - 1).min(MAX_BACKOFF_SHIFT);
    let retry_not_before = now + Duration::minutes(backoff_minutes * factor);

    tx.execute(
        "INSERT INTO account_failures (account_id, failure_count, last_error, retry_not_before)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(account_id) DO UPDATE SET
            failure_count = excluded.failure_count,
            last_error = excluded.last_error,
            retry_not_before = excluded.retry_not_before",
        params![account_id, count, error, to_ms(retry_not_before)],
    )?;

    tx.commit()?;
    Ok(retry_not_before)
}

/// Clear the breaker after a successful check
pub fn clear(pool: &DbPool, account_id: &str) -> Result<(), ProbeError> {
    let conn = pool.get()?;
    conn.execute(
        "DELETE FROM account_failures WHERE account_id = ?1",
        params![account_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{accounts, test_pool};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let pool = test_pool();
        let now = Utc::now();
        accounts::ensure_account(&pool, "a@example.com", "generic", now).unwrap();

        let r1 = record_failure(&pool, "a@example.com", "timeout", 10, now).unwrap();
        assert_eq!(r1, now + Duration::minutes(10));

        let r2 = record_failure(&pool, "a@example.com", "timeout", 10, now).unwrap();
        assert_eq!(r2, now + Duration::minutes(20));

        let r3 = record_failure(&pool, "a@example.com", "timeout", 10, now).unwrap();
        assert_eq!(r3, now + Duration::minutes(40));

        // Drive the count past the cap
        for _ in 0..10 {
            record_failure(&pool, "a@example.com", "timeout", 10, now).unwrap();
        }
        let capped = record_failure(&pool, "a@example.com", "timeout", 10, now).unwrap();
        assert_eq!(capped, now + Duration::minutes(10 * 32));

        let record = get(&pool, "a@example.com").unwrap().unwrap();
        assert_eq!(record.failure_count, 14);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_clear_resets_breaker() {
        let pool = test_pool();
        let now = Utc::now();
        accounts::ensure_account(&pool, "a@example.com", "generic", now).unwrap();

        record_failure(&pool, "a@example.com", "auth refused", 5, now).unwrap();
        clear(&pool, "a@example.com").unwrap();
        assert!(get(&pool, "a@example.com").unwrap().is_none());

        // The next failure starts from the base backoff again
        let r = record_failure(&pool, "a@example.com", "timeout", 5, now).unwrap();
        assert_eq!(r, now + Duration::minutes(5));
    }
}
