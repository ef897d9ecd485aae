use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a deliverability test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Timeout,
}

impl TestStatus {
    /// Get the status string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "timeout" => Self::Timeout,
            _ => Self::Pending,
        }
    }

    /// Terminal statuses are never left again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Timeout)
    }
}

/// A deliverability test as stored in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryTest {
    pub id: String,
    /// Unique token embedded in the seeded email's subject
    pub token: String,
    pub visitor_email: String,
    pub visitor_ip: String,
    pub audience: Option<String>,
    pub expected_emails: u32,
    pub received_emails: u32,
    pub status: TestStatus,
    pub created_at: DateTime<Utc>,
    /// Hard deadline after which the timeout sweeper claims the test
    pub timeout_at: DateTime<Utc>,
    /// Retention expiry; deletion past this point is an admin concern
    pub expires_at: DateTime<Utc>,
}

/// Visitor-submitted test request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequest {
    pub visitor_email: String,
    pub visitor_ip: String,
    pub audience: Option<String>,
    pub expected_emails: u32,
}

/// Per (test, account) tracking record — the unit the scheduler filters on.
///
/// Carries the parent test's token and creation time so a candidate batch
/// can be scheduled and searched without re-reading the tests table.
#[derive(Debug, Clone)]
pub struct Association {
    pub test_id: String,
    pub token: String,
    pub account_id: String,
    pub received: bool,
    pub received_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub test_created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            TestStatus::Pending,
            TestStatus::InProgress,
            TestStatus::Completed,
            TestStatus::Cancelled,
            TestStatus::Timeout,
        ] {
            assert_eq!(TestStatus::from_str(s.as_str()), s);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_pending() {
        assert_eq!(TestStatus::from_str("garbage"), TestStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TestStatus::Pending.is_terminal());
        assert!(!TestStatus::InProgress.is_terminal());
        assert!(TestStatus::Completed.is_terminal());
        assert!(TestStatus::Cancelled.is_terminal());
        assert!(TestStatus::Timeout.is_terminal());
    }
}
