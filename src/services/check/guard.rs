//! Dispatch guard: at most one in-flight check per mailbox account.
//!
//! A single mailbox session cannot be shared across concurrent callers and
//! providers rate-limit by connection count, so checks are serialized per
//! account with a named, time-bounded lock. The guard also fronts the
//! circuit breaker (account failure record) and the provider's hourly
//! connection ceiling — both read before the lock is taken, fail-closed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::adapters::sqlite::{accounts, failures, DbPool};
use crate::error::ProbeError;
use crate::types::account::ProviderProfile;

/// Why an acquire attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    /// Another check currently holds this account
    Locked,
    /// Circuit breaker open until the given time
    Backoff(DateTime<Utc>),
    /// Hourly connection ceiling reached
    ConnectionCeiling,
}

#[derive(Debug)]
pub enum Acquire {
    Acquired(AccountLock),
    Busy(BusyReason),
}

/// A held account lock. Hand it back through [`DispatchGuard::release`];
/// if the holder crashes instead, the entry expires after the TTL and the
/// account becomes acquirable again.
#[derive(Debug)]
pub struct AccountLock {
    pub account_id: String,
    token: u64,
}

struct LockEntry {
    token: u64,
    expires_at: DateTime<Utc>,
}

pub struct DispatchGuard {
    locks: Mutex<HashMap<String, LockEntry>>,
    next_token: AtomicU64,
    ttl: Duration,
}

impl DispatchGuard {
    pub fn new(lock_ttl_minutes: i64) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            ttl: Duration::minutes(lock_ttl_minutes),
        }
    }

    /// Try to take an account for one check. An open breaker window, a
    /// full connection window, or a live lock all read as Busy; registry
    /// errors propagate so the caller skips the account (fail-closed).
    pub async fn try_acquire(
        &self,
        pool: &DbPool,
        account_id: &str,
        profile: &ProviderProfile,
        now: DateTime<Utc>,
    ) -> Result<Acquire, ProbeError> {
        if let Some(record) = failures::get(pool, account_id)? {
            if let Some(retry) = record.retry_not_before {
                if retry > now {
                    return Ok(Acquire::Busy(BusyReason::Backoff(retry)));
                }
            }
        }

        let used = accounts::connections_in_window(pool, account_id, now)?;
        if used >= profile.max_connections_per_hour {
            return Ok(Acquire::Busy(BusyReason::ConnectionCeiling));
        }

        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(account_id) {
            if entry.expires_at > now {
                return Ok(Acquire::Busy(BusyReason::Locked));
            }
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        locks.insert(
            account_id.to_string(),
            LockEntry {
                token,
                expires_at: now + self.ttl,
            },
        );

        Ok(Acquire::Acquired(AccountLock {
            account_id: account_id.to_string(),
            token,
        }))
    }

    /// Release a held lock. The token check means a stale holder whose
    /// lock expired and was re-acquired cannot drop the new holder's entry.
    pub async fn release(&self, lock: AccountLock) {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(&lock.account_id) {
            if entry.token == lock.token {
                locks.remove(&lock.account_id);
            }
        }
    }

    /// Successful check: the breaker resets
    pub fn on_success(&self, pool: &DbPool, account_id: &str) -> Result<(), ProbeError> {
        failures::clear(pool, account_id)
    }

    /// Failed check: count it and move the retry floor out per the
    /// provider's backoff policy. Returns the new floor.
    pub fn on_failure(
        &self,
        pool: &DbPool,
        account_id: &str,
        error: &str,
        profile: &ProviderProfile,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ProbeError> {
        let retry_not_before =
            failures::record_failure(pool, account_id, error, profile.backoff_minutes, now)?;
        warn!(
            account_id = %account_id,
            retry_not_before = %retry_not_before,
            "Check failed, backing off: {}",
            error
        );
        Ok(retry_not_before)
    }
}
