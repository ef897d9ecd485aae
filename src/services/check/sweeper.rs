//! Timeout sweeper: bounds test lifetime independently of account checks.
//!
//! Runs once per cycle, before any account is touched, so a test whose
//! accounts are all disabled or circuit-broken still resolves into a
//! terminal status at its deadline.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::adapters::sqlite::{tests as test_registry, DbPool};
use crate::error::ProbeError;

/// Reclassify overdue pending/in-progress tests as timed out. Idempotent.
pub fn sweep(pool: &DbPool, now: DateTime<Utc>) -> Result<usize, ProbeError> {
    let swept = test_registry::mark_timed_out(pool, now)?;
    if swept > 0 {
        info!("Swept {} overdue tests into timeout", swept);
    }
    Ok(swept)
}
