use serde::{Deserialize, Serialize};

/// Monitored mailbox account as stored in the registry.
///
/// Credentials and the provider's rate profile live in config, not here;
/// the registry row exists for FK integrity and the active/authenticated
/// flags the driver enumerates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxAccount {
    /// Email address, doubles as the account id
    pub email: String,
    pub provider: String,
    pub active: bool,
    pub authenticated: bool,
}

/// One step of a progressive check-interval table
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntervalStep {
    /// Test age this step applies up to, inclusive
    pub up_to_minutes: i64,
    pub interval_minutes: i64,
}

/// Immutable per-provider rate profile, loaded once from config and passed
/// down — never re-fetched mid-operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    #[serde(default = "default_max_connections_per_hour")]
    pub max_connections_per_hour: u32,

    /// Cap on how many tests a single mailbox session may search for.
    /// Zero means unlimited.
    #[serde(default)]
    pub max_checks_per_connection: u32,

    /// Base backoff after a connection failure; doubles per consecutive
    /// failure up to a cap
    #[serde(default = "default_backoff_minutes")]
    pub backoff_minutes: i64,

    #[serde(default)]
    pub supports_idle: bool,

    #[serde(default = "default_check_intervals")]
    pub check_intervals: Vec<IntervalStep>,
}

impl ProviderProfile {
    /// Look up the check interval for a test of the given age.
    ///
    /// Returns None past the last step: the test will time out before
    /// another check would help.
    pub fn interval_for_age(&self, age_minutes: i64) -> Option<i64> {
        self.check_intervals
            .iter()
            .find(|step| age_minutes <= step.up_to_minutes)
            .map(|step| step.interval_minutes)
    }
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self {
            max_connections_per_hour: default_max_connections_per_hour(),
            max_checks_per_connection: 0,
            backoff_minutes: default_backoff_minutes(),
            supports_idle: false,
            check_intervals: default_check_intervals(),
        }
    }
}

fn default_max_connections_per_hour() -> u32 {
    60
}

fn default_backoff_minutes() -> i64 {
    10
}

fn default_check_intervals() -> Vec<IntervalStep> {
    vec![
        IntervalStep { up_to_minutes: 10, interval_minutes: 1 },
        IntervalStep { up_to_minutes: 20, interval_minutes: 2 },
        IntervalStep { up_to_minutes: 30, interval_minutes: 3 },
    ]
}
