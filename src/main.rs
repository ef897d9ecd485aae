use std::fs;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use mailprobe::adapters::imap::ImapSearchClient;
use mailprobe::adapters::sqlite::{accounts, pool, schema};
use mailprobe::config;
use mailprobe::error::ProbeError;
use mailprobe::services::check::guard::DispatchGuard;
use mailprobe::services::check::worker::{self, CheckContext};

#[tokio::main]
async fn main() -> Result<(), ProbeError> {
    // Can be overridden with RUST_LOG; debug builds default to debug
    // level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("mailprobe=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting mailprobe ...");

    let config = config::load()?;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    info!("Registry database: {:?}", db_path);

    let pool = pool::create_pool(&db_path)?;
    let conn = pool.get()?;
    schema::initialize_schema(&conn)?;
    accounts::sync_accounts(&pool, &config.accounts, chrono::Utc::now())?;

    let ctx = CheckContext {
        pool,
        guard: Arc::new(DispatchGuard::new(config.driver.lock_ttl_minutes)),
        client: Arc::new(ImapSearchClient::new()),
        config: Arc::new(config),
    };

    worker::run(ctx).await;
    Ok(())
}
