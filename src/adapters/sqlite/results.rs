//! Result rows: one immutable record per matched delivery.

use rusqlite::params;

use super::{from_ms, to_ms, DbPool};
use crate::error::ProbeError;
use crate::types::result::{
    AuthResults, DkimResult, DmarcResult, Placement, SpfResult, TestResult,
};

/// Insert a result row. The UNIQUE(test_id, account_id) constraint plus
/// INSERT OR IGNORE makes reprocessing the same match a no-op; returns
/// whether a row was actually written.
pub fn insert(pool: &DbPool, result: &TestResult) -> Result<bool, ProbeError> {
    let conn = pool.get()?;
    let n = conn.execute(
        "INSERT OR IGNORE INTO test_results
            (id, test_id, account_id, message_id, subject, from_address,
             placement, spf, dkim, dmarc, size_bytes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            result.id,
            result.test_id,
            result.account_id,
            result.message_id,
            result.subject,
            result.from_address,
            result.placement.as_str(),
            result.auth.spf.as_str(),
            result.auth.dkim.as_str(),
            result.auth.dmarc.as_str(),
            result.size_bytes.map(|s| s as i64),
            to_ms(result.created_at),
        ],
    )?;
    Ok(n > 0)
}

/// Results for a test, in arrival order — the reporting read path.
pub fn list_for_test(pool: &DbPool, test_id: &str) -> Result<Vec<TestResult>, ProbeError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, test_id, account_id, message_id, subject, from_address,
                placement, spf, dkim, dmarc, size_bytes, created_at
         FROM test_results
         WHERE test_id = ?1
         ORDER BY created_at ASC",
    )?;

    let results = stmt
        .query_map(params![test_id], |row| {
            Ok(TestResult {
                id: row.get(0)?,
                test_id: row.get(1)?,
                account_id: row.get(2)?,
                message_id: row.get(3)?,
                subject: row.get(4)?,
                from_address: row.get(5)?,
                placement: Placement::from_str(&row.get::<_, String>(6)?),
                auth: AuthResults {
                    spf: SpfResult::from_header_value(&row.get::<_, String>(7)?),
                    dkim: DkimResult::from_header_value(&row.get::<_, String>(8)?),
                    dmarc: DmarcResult::from_header_value(&row.get::<_, String>(9)?),
                },
                size_bytes: row.get::<_, Option<i64>>(10)?.map(|s| s as u64),
                created_at: from_ms(row.get(11)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{accounts, test_pool, tests as test_rows};
    use crate::types::test::TestRequest;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample(test_id: &str, account_id: &str) -> TestResult {
        TestResult {
            id: Uuid::new_v4().to_string(),
            test_id: test_id.to_string(),
            account_id: account_id.to_string(),
            message_id: "<abc@mail.example>".to_string(),
            subject: Some("Delivery test tok123".to_string()),
            from_address: Some("sender@example.org".to_string()),
            placement: Placement::Inbox,
            auth: AuthResults {
                spf: SpfResult::Pass,
                dkim: DkimResult::Pass,
                dmarc: DmarcResult::Pass,
            },
            size_bytes: Some(2048),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_is_idempotent_per_pair() {
        let pool = test_pool();
        let now = Utc::now();
        accounts::ensure_account(&pool, "probe@example.com", "generic", now).unwrap();
        let test = test_rows::create_test(
            &pool,
            &TestRequest {
                visitor_email: "v@example.com".to_string(),
                visitor_ip: "192.0.2.1".to_string(),
                audience: None,
                expected_emails: 1,
            },
            &["probe@example.com".to_string()],
            30,
            30,
            now,
        )
        .unwrap();

        assert!(insert(&pool, &sample(&test.id, "probe@example.com")).unwrap());
        // Second insert for the same pair is ignored even with a fresh id
        assert!(!insert(&pool, &sample(&test.id, "probe@example.com")).unwrap());

        let rows = list_for_test(&pool, &test.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].placement, Placement::Inbox);
        assert_eq!(rows[0].auth.spf, SpfResult::Pass);
    }
}
