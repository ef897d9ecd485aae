//! Driver loop: fans account checks out to a small worker pool.
//!
//! One cycle sweeps timeouts globally, then pushes every active account as
//! a job onto a flume channel consumed by N workers. Each job runs the
//! guard → scheduler → search → processor pipeline on its own; one slow or
//! failing account never blocks the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::adapters::imap::MailboxSearch;
use crate::adapters::sqlite::{accounts, associations, DbPool};
use crate::config::{AccountConfig, AppConfig};
use crate::error::ProbeError;
use crate::services::check::guard::{Acquire, BusyReason, DispatchGuard};
use crate::services::check::processor::{self, BatchStats};
use crate::services::check::{scheduler, sweeper};
use crate::types::account::ProviderProfile;

/// Everything an account-check job needs; cheap to clone across workers
#[derive(Clone)]
pub struct CheckContext {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub guard: Arc<DispatchGuard>,
    pub client: Arc<dyn MailboxSearch>,
}

/// How one account's check ended
#[derive(Debug)]
pub enum CheckOutcome {
    /// Due associations were searched and applied
    Checked(BatchStats),
    /// Lock taken but nothing was due
    Idle,
    /// Guard refused the account this cycle
    Skipped(BusyReason),
    /// Mailbox search failed; counted by the circuit breaker
    Failed(String),
    /// Registry failure; aborted without touching the breaker
    Aborted(String),
}

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub accounts: usize,
    pub checked: usize,
    pub idle: usize,
    pub skipped: usize,
    pub failed: usize,
    pub matched: usize,
    pub swept: usize,
}

/// Run one full cycle at the given instant. The single entry point the
/// periodic trigger invokes.
pub async fn run_cycle(ctx: &CheckContext, now: DateTime<Utc>) -> Result<CycleSummary, ProbeError> {
    let mut summary = CycleSummary {
        swept: sweeper::sweep(&ctx.pool, now)?,
        ..Default::default()
    };

    let active = accounts::list_active(&ctx.pool)?;
    if active.is_empty() {
        return Ok(summary);
    }

    let (job_tx, job_rx) = flume::unbounded::<AccountConfig>();
    let (out_tx, out_rx) = flume::unbounded::<CheckOutcome>();

    for account in &active {
        match ctx.config.account(&account.email) {
            Some(cfg) if cfg.active => {
                summary.accounts += 1;
                let _ = job_tx.send(cfg.clone());
            }
            _ => {
                warn!(account_id = %account.email, "Active account missing from config, skipping");
            }
        }
    }
    drop(job_tx);

    let workers = ctx.config.driver.worker_count.max(1);
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let ctx = ctx.clone();
        let job_rx = job_rx.clone();
        let out_tx = out_tx.clone();
        handles.push(tokio::spawn(async move {
            while let Ok(account) = job_rx.recv_async().await {
                let outcome = check_account(&ctx, &account, now).await;
                let _ = out_tx.send(outcome);
            }
        }));
    }
    drop(out_tx);

    while let Ok(outcome) = out_rx.recv_async().await {
        match outcome {
            CheckOutcome::Checked(stats) => {
                summary.checked += 1;
                summary.matched += stats.matched;
            }
            CheckOutcome::Idle => summary.idle += 1,
            CheckOutcome::Skipped(_) => summary.skipped += 1,
            CheckOutcome::Failed(_) | CheckOutcome::Aborted(_) => summary.failed += 1,
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    info!(
        accounts = summary.accounts,
        checked = summary.checked,
        idle = summary.idle,
        skipped = summary.skipped,
        failed = summary.failed,
        matched = summary.matched,
        swept = summary.swept,
        "Cycle complete"
    );

    Ok(summary)
}

/// Check one account: take the lock, run the pipeline, settle the breaker,
/// release.
pub async fn check_account(
    ctx: &CheckContext,
    account: &AccountConfig,
    now: DateTime<Utc>,
) -> CheckOutcome {
    let profile = ctx.config.profile_for(&account.provider);

    let lock = match ctx
        .guard
        .try_acquire(&ctx.pool, &account.email, &profile, now)
        .await
    {
        Ok(Acquire::Acquired(lock)) => lock,
        Ok(Acquire::Busy(reason)) => {
            debug!(account_id = %account.email, "Account busy: {:?}", reason);
            return CheckOutcome::Skipped(reason);
        }
        Err(e) => {
            // Fail-closed: if the breaker state is unreadable, skip
            error!(account_id = %account.email, "Guard lookup failed: {}", e);
            return CheckOutcome::Aborted(e.to_string());
        }
    };

    let outcome = run_check(ctx, account, &profile, now).await;

    match &outcome {
        CheckOutcome::Checked(_) | CheckOutcome::Idle => {
            if let Err(e) = ctx.guard.on_success(&ctx.pool, &account.email) {
                warn!(account_id = %account.email, "Failed to clear breaker: {}", e);
            }
        }
        CheckOutcome::Failed(msg) => {
            if let Err(e) = ctx
                .guard
                .on_failure(&ctx.pool, &account.email, msg, &profile, now)
            {
                warn!(account_id = %account.email, "Failed to record breaker failure: {}", e);
            }
        }
        CheckOutcome::Aborted(msg) => {
            error!(account_id = %account.email, "Check aborted: {}", msg);
        }
        CheckOutcome::Skipped(_) => {}
    }

    ctx.guard.release(lock).await;
    outcome
}

async fn run_check(
    ctx: &CheckContext,
    account: &AccountConfig,
    profile: &ProviderProfile,
    now: DateTime<Utc>,
) -> CheckOutcome {
    let candidates = match associations::pending_for_account(&ctx.pool, &account.email, now) {
        Ok(candidates) => candidates,
        Err(e) => return CheckOutcome::Aborted(e.to_string()),
    };

    let mut due = scheduler::due_associations(&candidates, profile, now);
    if due.is_empty() {
        return CheckOutcome::Idle;
    }

    let cap = profile.max_checks_per_connection as usize;
    if cap > 0 && due.len() > cap {
        // The rest wait for the next connection; oldest tests go first
        due.truncate(cap);
    }

    let tokens: Vec<String> = due.iter().map(|a| a.token.clone()).collect();
    let since = due
        .iter()
        .map(|a| a.test_created_at)
        .min()
        .unwrap_or(now);

    if let Err(e) = accounts::record_connection(&ctx.pool, &account.email, now) {
        return CheckOutcome::Aborted(e.to_string());
    }

    debug!(
        account_id = %account.email,
        due = due.len(),
        "Searching mailbox for due tokens"
    );

    let budget = Duration::from_secs(ctx.config.driver.search_budget_seconds.max(1));
    let outcomes = match tokio::time::timeout(budget, ctx.client.search(account, &tokens, since)).await
    {
        Err(_) => {
            return CheckOutcome::Failed(format!(
                "search exceeded {}s budget",
                budget.as_secs()
            ))
        }
        Ok(Err(e)) => return CheckOutcome::Failed(e.to_string()),
        Ok(Ok(outcomes)) => outcomes,
    };

    match processor::apply(&ctx.pool, &account.email, &due, &outcomes, now) {
        Ok(stats) => CheckOutcome::Checked(stats),
        Err(e) => CheckOutcome::Aborted(e.to_string()),
    }
}

/// Periodic driver; ticks until the process stops.
pub async fn run(ctx: CheckContext) {
    let tick = Duration::from_secs(ctx.config.driver.tick_seconds.max(1));
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Err(e) = run_cycle(&ctx, Utc::now()).await {
            error!("Cycle failed: {}", e);
        }
    }
}
