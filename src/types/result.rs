use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which folder the matched email landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Inbox,
    Spam,
    Other,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Spam => "spam",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "inbox" => Self::Inbox,
            "spam" => Self::Spam,
            _ => Self::Other,
        }
    }
}

/// SPF outcome. The stored vocabulary is the full RFC 7208 result set,
/// so transient values pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpfResult {
    Pass,
    Fail,
    Softfail,
    Neutral,
    None,
    Temperror,
    Permerror,
}

impl SpfResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Softfail => "softfail",
            Self::Neutral => "neutral",
            Self::None => "none",
            Self::Temperror => "temperror",
            Self::Permerror => "permerror",
        }
    }

    pub fn from_header_value(s: &str) -> Self {
        match s {
            "pass" => Self::Pass,
            "fail" => Self::Fail,
            "softfail" => Self::Softfail,
            "neutral" => Self::Neutral,
            "temperror" => Self::Temperror,
            "permerror" => Self::Permerror,
            _ => Self::None,
        }
    }
}

/// DKIM outcome. Storage vocabulary is {pass, fail, none}; transient
/// values (temperror, permerror) and anything unrecognized normalize
/// to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DkimResult {
    Pass,
    Fail,
    None,
}

impl DkimResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::None => "none",
        }
    }

    pub fn from_header_value(s: &str) -> Self {
        match s {
            "pass" => Self::Pass,
            "none" => Self::None,
            _ => Self::Fail,
        }
    }
}

/// DMARC outcome, same vocabulary and normalization as DKIM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmarcResult {
    Pass,
    Fail,
    None,
}

impl DmarcResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::None => "none",
        }
    }

    pub fn from_header_value(s: &str) -> Self {
        match s {
            "pass" => Self::Pass,
            "none" => Self::None,
            _ => Self::Fail,
        }
    }
}

/// Parsed authentication outcomes for one matched delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResults {
    pub spf: SpfResult,
    pub dkim: DkimResult,
    pub dmarc: DmarcResult,
}

impl Default for AuthResults {
    fn default() -> Self {
        Self {
            spf: SpfResult::None,
            dkim: DkimResult::None,
            dmarc: DmarcResult::None,
        }
    }
}

/// One matched delivery, immutable once created. Exactly one row may
/// exist per (test, account) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub test_id: String,
    pub account_id: String,
    pub message_id: String,
    pub subject: Option<String>,
    pub from_address: Option<String>,
    pub placement: Placement,
    pub auth: AuthResults,
    pub size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spf_passes_transient_values_through() {
        assert_eq!(SpfResult::from_header_value("softfail"), SpfResult::Softfail);
        assert_eq!(SpfResult::from_header_value("temperror"), SpfResult::Temperror);
        assert_eq!(SpfResult::from_header_value("permerror"), SpfResult::Permerror);
        assert_eq!(SpfResult::from_header_value("bogus"), SpfResult::None);
    }

    #[test]
    fn test_dkim_normalizes_transient_to_fail() {
        assert_eq!(DkimResult::from_header_value("pass"), DkimResult::Pass);
        assert_eq!(DkimResult::from_header_value("none"), DkimResult::None);
        assert_eq!(DkimResult::from_header_value("temperror"), DkimResult::Fail);
        assert_eq!(DkimResult::from_header_value("permerror"), DkimResult::Fail);
        assert_eq!(DkimResult::from_header_value("policy"), DkimResult::Fail);
    }

    #[test]
    fn test_dmarc_normalizes_transient_to_fail() {
        assert_eq!(DmarcResult::from_header_value("temperror"), DmarcResult::Fail);
        assert_eq!(DmarcResult::from_header_value("pass"), DmarcResult::Pass);
    }
}
