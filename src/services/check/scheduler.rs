//! Check scheduler: which pending associations are due this cycle.
//!
//! Emails usually arrive within minutes, so the progressive interval table
//! checks aggressively early and backs off as a test ages — balancing
//! detection latency against provider rate limits.

use chrono::{DateTime, Utc};

use crate::types::account::ProviderProfile;
use crate::types::test::Association;

/// Pure filter over an account's candidate associations. The caller is
/// responsible for stamping `last_checked_at` after the actual search
/// attempt (hit or miss); nothing is mutated here.
pub fn due_associations(
    candidates: &[Association],
    profile: &ProviderProfile,
    now: DateTime<Utc>,
) -> Vec<Association> {
    candidates
        .iter()
        .filter(|assoc| is_due(assoc, profile, now))
        .cloned()
        .collect()
}

fn is_due(assoc: &Association, profile: &ProviderProfile, now: DateTime<Utc>) -> bool {
    let last_checked = match assoc.last_checked_at {
        None => return true,
        Some(t) => t,
    };

    let age_minutes = (now - assoc.test_created_at).num_minutes();
    match profile.interval_for_age(age_minutes) {
        // Past the interval table: the test will time out before another
        // check would help, so it is left to the sweeper
        None => false,
        Some(interval) => (now - last_checked).num_minutes() >= interval,
    }
}
