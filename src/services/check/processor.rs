//! Result processor: writes one search pass back into the registry.
//!
//! Every due association gets its `last_checked_at` stamped, hit or miss —
//! the scheduler's interval logic depends on it advancing. Matches become
//! result rows (idempotent per (test, account)), flip the association to
//! received, and bump the parent test's counter through its guarded UPDATE.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::imap::EmailMatch;
use crate::adapters::sqlite::{associations, results, tests as test_registry, DbPool};
use crate::error::ProbeError;
use crate::types::result::{AuthResults, DkimResult, DmarcResult, SpfResult, TestResult};
use crate::types::test::Association;

#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    pub matched: usize,
    pub missed: usize,
    /// Matches that failed to apply and stay eligible for retry
    pub skipped: usize,
}

/// Apply one account's search outcomes to its due associations.
pub fn apply(
    pool: &DbPool,
    account_id: &str,
    due: &[Association],
    outcomes: &HashMap<String, EmailMatch>,
    now: DateTime<Utc>,
) -> Result<BatchStats, ProbeError> {
    let mut stats = BatchStats::default();

    for assoc in due {
        associations::stamp_checked(pool, &assoc.test_id, account_id, now)?;

        match outcomes.get(&assoc.token) {
            None => stats.missed += 1,
            Some(email_match) => match apply_match(pool, assoc, email_match, now) {
                Ok(()) => stats.matched += 1,
                Err(e) => {
                    // One bad match must not sink the rest of the batch;
                    // this pair stays pending and is retried next cycle
                    warn!(
                        test_id = %assoc.test_id,
                        account_id = %account_id,
                        "Failed to apply match: {}",
                        e
                    );
                    stats.skipped += 1;
                }
            },
        }
    }

    Ok(stats)
}

fn apply_match(
    pool: &DbPool,
    assoc: &Association,
    email_match: &EmailMatch,
    now: DateTime<Utc>,
) -> Result<(), ProbeError> {
    let result = TestResult {
        id: Uuid::new_v4().to_string(),
        test_id: assoc.test_id.clone(),
        account_id: assoc.account_id.clone(),
        message_id: email_match.message_id.clone(),
        subject: email_match.subject.clone(),
        from_address: email_match.from_address.clone(),
        placement: email_match.placement,
        auth: parse_auth_headers(&email_match.auth_headers),
        size_bytes: email_match.size_bytes,
        created_at: now,
    };

    results::insert(pool, &result)?;

    let newly_received =
        associations::mark_received(pool, &assoc.test_id, &assoc.account_id, now)?;
    if !newly_received {
        debug!(
            test_id = %assoc.test_id,
            account_id = %assoc.account_id,
            "Match already counted"
        );
        return Ok(());
    }

    if !test_registry::increment_received(pool, &assoc.test_id)? {
        warn!(
            test_id = %assoc.test_id,
            "Received-email count refused: test terminal or counter already full"
        );
    }

    Ok(())
}

/// Parse authentication outcomes from a raw header block.
///
/// Case-insensitive. A combined Authentication-Results header is preferred;
/// Received-SPF and bare spf=/dkim=/dmarc= tokens elsewhere in the block
/// are the fallback. Values are normalized into the storage vocabularies.
pub fn parse_auth_headers(raw: &str) -> AuthResults {
    let lower = raw.to_lowercase();
    let lines = unfold_headers(&lower);

    let combined = lines
        .iter()
        .filter(|line| line.starts_with("authentication-results:"))
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

    let spf = find_value(&combined, "spf=")
        .or_else(|| received_spf_value(&lines))
        .or_else(|| find_value(&lower, "spf="))
        .map(|v| SpfResult::from_header_value(&v))
        .unwrap_or(SpfResult::None);

    let dkim = find_value(&combined, "dkim=")
        .or_else(|| find_value(&lower, "dkim="))
        .map(|v| DkimResult::from_header_value(&v))
        .unwrap_or(DkimResult::None);

    let dmarc = find_value(&combined, "dmarc=")
        .or_else(|| find_value(&lower, "dmarc="))
        .map(|v| DmarcResult::from_header_value(&v))
        .unwrap_or(DmarcResult::None);

    AuthResults { spf, dkim, dmarc }
}

/// RFC 5322 continuation lines join their parent header line
fn unfold_headers(raw: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = lines.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
                continue;
            }
        }
        lines.push(line.trim_end().to_string());
    }
    lines
}

/// Value of the first `key=value` token in the haystack
fn find_value(haystack: &str, key: &str) -> Option<String> {
    let start = haystack.find(key)? + key.len();
    let value: String = haystack[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// First word of a Received-SPF header, e.g. "Received-SPF: pass (...)"
fn received_spf_value(lines: &[String]) -> Option<String> {
    let line = lines.iter().find(|l| l.starts_with("received-spf:"))?;
    line["received-spf:".len()..]
        .trim_start()
        .split_whitespace()
        .next()
        .map(|word| {
            word.chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .collect()
        })
}
