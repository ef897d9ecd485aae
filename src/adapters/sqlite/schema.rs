use rusqlite::Connection;

use crate::error::ProbeError;

pub fn initialize_schema(conn: &Connection) -> Result<(), ProbeError> {
    conn.execute_batch("
        -- Deliverability tests. Never hard-deleted by the core;
        -- retention cleanup past expires_at is an admin concern.
        CREATE TABLE IF NOT EXISTS tests (
            id              TEXT PRIMARY KEY,   -- UUID
            token           TEXT NOT NULL UNIQUE,
            visitor_email   TEXT NOT NULL,
            visitor_ip      TEXT NOT NULL,
            audience        TEXT,
            expected_emails INTEGER NOT NULL,
            received_emails INTEGER NOT NULL DEFAULT 0,
            status          TEXT NOT NULL DEFAULT 'pending',  -- 'pending' | 'in_progress' | 'completed' | 'cancelled' | 'timeout'
            created_at      INTEGER NOT NULL,   -- unix epoch ms
            timeout_at      INTEGER NOT NULL,
            expires_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tests_status  ON tests(status, timeout_at);
        CREATE INDEX IF NOT EXISTS idx_tests_created ON tests(created_at DESC);

        -- Minimal account reference for FK integrity. Credentials and the
        -- provider rate profile are config-owned; the id is the email address.
        CREATE TABLE IF NOT EXISTS accounts (
            id              TEXT PRIMARY KEY,   -- email address
            provider        TEXT NOT NULL,
            active          INTEGER NOT NULL DEFAULT 1,
            authenticated   INTEGER NOT NULL DEFAULT 1,
            created_at      INTEGER NOT NULL
        );

        -- Per (test, account) tracking record, the unit the scheduler
        -- filters on. last_checked_at advances on every attempt, hit or miss.
        CREATE TABLE IF NOT EXISTS test_accounts (
            test_id         TEXT NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
            account_id      TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            received        INTEGER NOT NULL DEFAULT 0,
            received_at     INTEGER,
            last_checked_at INTEGER,
            PRIMARY KEY (test_id, account_id)
        );

        CREATE INDEX IF NOT EXISTS idx_test_accounts_account ON test_accounts(account_id, received);

        -- One row per matched delivery, immutable once created.
        -- The UNIQUE pair makes result insertion idempotent.
        CREATE TABLE IF NOT EXISTS test_results (
            id              TEXT PRIMARY KEY,   -- UUID
            test_id         TEXT NOT NULL REFERENCES tests(id) ON DELETE CASCADE,
            account_id      TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            message_id      TEXT NOT NULL,
            subject         TEXT,
            from_address    TEXT,
            placement       TEXT NOT NULL,      -- 'inbox' | 'spam' | 'other'
            spf             TEXT NOT NULL,      -- pass | fail | softfail | neutral | none | temperror | permerror
            dkim            TEXT NOT NULL,      -- pass | fail | none
            dmarc           TEXT NOT NULL,      -- pass | fail | none
            size_bytes      INTEGER,
            created_at      INTEGER NOT NULL,

            UNIQUE(test_id, account_id)
        );

        CREATE INDEX IF NOT EXISTS idx_test_results_test ON test_results(test_id);

        -- Circuit-breaker state, cleared on the next successful check
        CREATE TABLE IF NOT EXISTS account_failures (
            account_id       TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
            failure_count    INTEGER NOT NULL DEFAULT 0,
            last_error       TEXT,
            retry_not_before INTEGER
        );

        -- Rolling one-hour connection window per account, used to enforce
        -- the provider's connection ceiling
        CREATE TABLE IF NOT EXISTS account_connections (
            account_id        TEXT PRIMARY KEY REFERENCES accounts(id) ON DELETE CASCADE,
            window_start      INTEGER NOT NULL,
            connection_count  INTEGER NOT NULL DEFAULT 0,
            last_connected_at INTEGER
        );
    ")?;

    Ok(())
}
