pub mod accounts;
pub mod associations;
pub mod failures;
pub mod pool;
pub mod results;
pub mod schema;

// Re-export the pool type so callers can do `use crate::adapters::sqlite::DbPool`
pub use pool::DbPool;

use chrono::{DateTime, Utc};

// Timestamps are stored as unix epoch milliseconds (INTEGER columns).
pub(crate) fn to_ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Single-connection in-memory pool for registry tests
#[cfg(test)]
pub(crate) fn test_pool() -> DbPool {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
    schema::initialize_schema(&pool.get().unwrap()).unwrap();
    pool
}
