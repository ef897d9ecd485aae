//! Configuration for the deliverability probe service.
//!
//! Loaded once at startup into an explicit [`AppConfig`] value that is
//! passed down to the driver — there is no process-global config cell.
//! Provider rate profiles and account credentials are config-owned; the
//! registry only mirrors the account list for FK integrity.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ProbeError;
use crate::types::account::ProviderProfile;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Override for the registry database path
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub driver: DriverConfig,

    /// Map of provider name to rate profile
    #[serde(default)]
    pub providers: HashMap<String, ProviderProfile>,

    /// Monitored mailbox accounts
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl AppConfig {
    /// Rate profile for a provider, falling back to the default profile
    /// for providers with no explicit entry.
    pub fn profile_for(&self, provider: &str) -> ProviderProfile {
        self.providers
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }

    pub fn account(&self, email: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.email == email)
    }

    /// Resolve the registry database path
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Driver loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Seconds between cycles
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,

    /// Size of the account-check worker pool
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Hard deadline for one mailbox search call; overrun counts as a
    /// failure for the circuit breaker
    #[serde(default = "default_search_budget_seconds")]
    pub search_budget_seconds: u64,

    /// Check window seeded into each new test's timeout deadline
    #[serde(default = "default_check_window_minutes")]
    pub check_window_minutes: i64,

    /// Retention period seeded into each new test's expiry
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// A held account lock auto-expires after this long
    #[serde(default = "default_lock_ttl_minutes")]
    pub lock_ttl_minutes: i64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            worker_count: default_worker_count(),
            search_budget_seconds: default_search_budget_seconds(),
            check_window_minutes: default_check_window_minutes(),
            retention_days: default_retention_days(),
            lock_ttl_minutes: default_lock_ttl_minutes(),
        }
    }
}

/// Monitored account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Email address, doubles as the account id
    pub email: String,

    /// Provider name, keys into the `providers` profile map
    pub provider: String,

    #[serde(default = "default_true")]
    pub active: bool,

    pub imap: ImapConfig,

    /// Folder searched for spam placement
    #[serde(default = "default_spam_folder")]
    pub spam_folder: String,
}

/// IMAP server configuration for a monitored account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub host: String,

    #[serde(default = "default_imap_port")]
    pub port: u16,

    pub user: String,

    pub password: String,
}

fn default_tick_seconds() -> u64 {
    60
}

fn default_worker_count() -> usize {
    4
}

fn default_search_budget_seconds() -> u64 {
    120
}

fn default_check_window_minutes() -> i64 {
    30
}

fn default_retention_days() -> i64 {
    30
}

fn default_lock_ttl_minutes() -> i64 {
    5
}

fn default_imap_port() -> u16 {
    993
}

fn default_spam_folder() -> String {
    "Spam".to_string()
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailprobe")
        .join("mailprobe.db")
}

/// Get default config paths
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("mailprobe").join("config.toml"));
    }

    if let Some(home_dir) = dirs::home_dir() {
        paths.push(
            home_dir
                .join(".config")
                .join("mailprobe")
                .join("config.toml"),
        );
    }

    paths
}

/// Load configuration from the first default path that exists, or fall
/// back to the built-in defaults.
pub fn load() -> Result<AppConfig, ProbeError> {
    for path in default_config_paths() {
        if path.exists() {
            info!("Found config at: {:?}", path);
            return load_from_path(&path);
        }
    }

    info!("No config file found, using defaults");
    Ok(AppConfig::default())
}

/// Load configuration from a specific path
pub fn load_from_path(path: &Path) -> Result<AppConfig, ProbeError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ProbeError::Config(format!("Failed to read config: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| ProbeError::Config(format!("Failed to parse config: {}", e)))
}
