//! Account registry rows and per-account connection-window tracking.
//!
//! Account identity and flags are mirrored from config at startup for FK
//! integrity; credentials and rate profiles stay config-owned. The
//! connection window is the mutable "last connection" record the dispatch
//! guard consults to enforce the provider's hourly ceiling.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{to_ms, DbPool};
use crate::config::AccountConfig;
use crate::error::ProbeError;
use crate::types::account::MailboxAccount;

const WINDOW_MS: i64 = 3_600_000;

/// Mirror the configured account list into the registry. Accounts that
/// disappeared from config are deactivated, not deleted.
pub fn sync_accounts(
    pool: &DbPool,
    configs: &[AccountConfig],
    now: DateTime<Utc>,
) -> Result<(), ProbeError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    tx.execute("UPDATE accounts SET active = 0", [])?;
    for cfg in configs {
        tx.execute(
            "INSERT INTO accounts (id, provider, active, authenticated, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(id) DO UPDATE SET
                provider = excluded.provider,
                active = excluded.active",
            params![cfg.email, cfg.provider, cfg.active as i64, to_ms(now)],
        )?;
    }

    tx.commit()?;
    info!("Synced {} accounts from config", configs.len());
    Ok(())
}

/// Ensure an account row exists (for FK integrity)
pub fn ensure_account(
    pool: &DbPool,
    account_id: &str,
    provider: &str,
    now: DateTime<Utc>,
) -> Result<(), ProbeError> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT OR IGNORE INTO accounts (id, provider, active, authenticated, created_at)
         VALUES (?1, ?2, 1, 1, ?3)",
        params![account_id, provider, to_ms(now)],
    )?;
    debug!(account_id = %account_id, "Ensured account row");
    Ok(())
}

/// Accounts the driver enumerates each cycle
pub fn list_active(pool: &DbPool) -> Result<Vec<MailboxAccount>, ProbeError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, provider, active, authenticated FROM accounts
         WHERE active = 1 AND authenticated = 1
         ORDER BY id",
    )?;

    let accounts = stmt
        .query_map([], |row| {
            Ok(MailboxAccount {
                email: row.get(0)?,
                provider: row.get(1)?,
                active: row.get::<_, i64>(2)? != 0,
                authenticated: row.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(accounts)
}

/// Connections counted against the current one-hour window.
/// A window older than an hour reads as zero.
pub fn connections_in_window(
    pool: &DbPool,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<u32, ProbeError> {
    let conn = pool.get()?;
    let row = conn
        .query_row(
            "SELECT window_start, connection_count FROM account_connections
             WHERE account_id = ?1",
            params![account_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?)),
        )
        .optional()?;

    Ok(match row {
        Some((start, count)) if to_ms(now) - start < WINDOW_MS => count,
        _ => 0,
    })
}

/// Count one mailbox session against the rolling window, resetting the
/// window when it has aged out. UPDATE expressions in SQLite all read the
/// old row, so the CASE pair stays consistent.
pub fn record_connection(
    pool: &DbPool,
    account_id: &str,
    now: DateTime<Utc>,
) -> Result<(), ProbeError> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO account_connections (account_id, window_start, connection_count, last_connected_at)
         VALUES (?1, ?2, 1, ?2)
         ON CONFLICT(account_id) DO UPDATE SET
            connection_count = CASE
                WHEN ?2 - window_start >= ?3 THEN 1
                ELSE connection_count + 1
            END,
            window_start = CASE
                WHEN ?2 - window_start >= ?3 THEN ?2
                ELSE window_start
            END,
            last_connected_at = ?2",
        params![account_id, to_ms(now), WINDOW_MS],
    )?;
    Ok(())
}
