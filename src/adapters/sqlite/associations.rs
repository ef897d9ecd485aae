//! The (test, account) association rows the check scheduler filters on.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{from_ms, to_ms, DbPool};
use crate::error::ProbeError;
use crate::types::test::Association;

/// Seed association rows for a new test. Runs inside the create_test
/// transaction, so it takes the open connection rather than the pool.
pub(crate) fn seed(
    conn: &Connection,
    test_id: &str,
    account_ids: &[String],
) -> Result<(), ProbeError> {
    let mut stmt = conn.prepare(
        "INSERT INTO test_accounts (test_id, account_id, received)
         VALUES (?1, ?2, 0)",
    )?;
    for account_id in account_ids {
        stmt.execute(params![test_id, account_id])?;
    }
    Ok(())
}

/// Candidate set for one account's check: not yet received, parent test
/// still live (pending/in_progress and before its deadline). Cancelled and
/// timed-out parents drop out here, which is what stops the scheduler
/// selecting them after a cancel.
pub fn pending_for_account(
    pool: &DbPool,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Association>, ProbeError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT ta.test_id, t.token, ta.account_id, ta.received,
                ta.received_at, ta.last_checked_at, t.created_at
         FROM test_accounts ta
         JOIN tests t ON t.id = ta.test_id
         WHERE ta.account_id = ?1
           AND ta.received = 0
           AND t.status IN ('pending', 'in_progress')
           AND t.timeout_at > ?2
         ORDER BY t.created_at ASC",
    )?;

    let associations = stmt
        .query_map(params![account_id, to_ms(now)], map_association)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(associations)
}

fn map_association(row: &rusqlite::Row) -> rusqlite::Result<Association> {
    Ok(Association {
        test_id: row.get(0)?,
        token: row.get(1)?,
        account_id: row.get(2)?,
        received: row.get::<_, i64>(3)? != 0,
        received_at: row.get::<_, Option<i64>>(4)?.map(from_ms),
        last_checked_at: row.get::<_, Option<i64>>(5)?.map(from_ms),
        test_created_at: from_ms(row.get(6)?),
    })
}

/// Stamp a check attempt. Runs for every association in the due set, hit
/// or miss — the interval logic depends on it advancing.
pub fn stamp_checked(
    pool: &DbPool,
    test_id: &str,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<(), ProbeError> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE test_accounts SET last_checked_at = ?3
         WHERE test_id = ?1 AND account_id = ?2",
        params![test_id, account_id, to_ms(now)],
    )?;
    Ok(())
}

/// Flip the association to received. Returns false when it already was,
/// so reprocessing the same match never double-counts.
pub fn mark_received(
    pool: &DbPool,
    test_id: &str,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, ProbeError> {
    let conn = pool.get()?;
    let n = conn.execute(
        "UPDATE test_accounts SET received = 1, received_at = ?3
         WHERE test_id = ?1 AND account_id = ?2 AND received = 0",
        params![test_id, account_id, to_ms(now)],
    )?;
    Ok(n > 0)
}

pub fn get(
    pool: &DbPool,
    test_id: &str,
    account_id: &str,
) -> Result<Option<Association>, ProbeError> {
    let conn = pool.get()?;
    let assoc = conn
        .query_row(
            "SELECT ta.test_id, t.token, ta.account_id, ta.received,
                    ta.received_at, ta.last_checked_at, t.created_at
             FROM test_accounts ta
             JOIN tests t ON t.id = ta.test_id
             WHERE ta.test_id = ?1 AND ta.account_id = ?2",
            params![test_id, account_id],
            map_association,
        )
        .optional()?;
    Ok(assoc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{accounts, test_pool, tests as test_rows};
    use crate::types::test::TestRequest;

    fn seed_test(pool: &DbPool, now: DateTime<Utc>) -> String {
        accounts::ensure_account(pool, "probe@example.com", "generic", now).unwrap();
        let request = TestRequest {
            visitor_email: "v@example.com".to_string(),
            visitor_ip: "198.51.100.9".to_string(),
            audience: None,
            expected_emails: 1,
        };
        test_rows::create_test(
            pool,
            &request,
            &["probe@example.com".to_string()],
            30,
            30,
            now,
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_pending_excludes_received_and_dead_parents() {
        let pool = test_pool();
        let now = Utc::now();
        let test_id = seed_test(&pool, now);

        let pending = pending_for_account(&pool, "probe@example.com", now).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].test_id, test_id);
        assert!(pending[0].last_checked_at.is_none());

        // Received associations drop out
        assert!(mark_received(&pool, &test_id, "probe@example.com", now).unwrap());
        assert!(pending_for_account(&pool, "probe@example.com", now)
            .unwrap()
            .is_empty());

        // Second mark is a no-op
        assert!(!mark_received(&pool, &test_id, "probe@example.com", now).unwrap());
    }

    #[test]
    fn test_pending_excludes_cancelled_parent() {
        let pool = test_pool();
        let now = Utc::now();
        let test_id = seed_test(&pool, now);

        test_rows::cancel(&pool, &test_id).unwrap();
        assert!(pending_for_account(&pool, "probe@example.com", now)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_pending_excludes_overdue_parent() {
        let pool = test_pool();
        let now = Utc::now();
        seed_test(&pool, now);

        let past_deadline = now + chrono::Duration::minutes(31);
        assert!(pending_for_account(&pool, "probe@example.com", past_deadline)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stamp_checked_advances() {
        let pool = test_pool();
        let now = Utc::now();
        let test_id = seed_test(&pool, now);

        stamp_checked(&pool, &test_id, "probe@example.com", now).unwrap();
        let assoc = get(&pool, &test_id, "probe@example.com").unwrap().unwrap();
        assert_eq!(
            assoc.last_checked_at.unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }
}
