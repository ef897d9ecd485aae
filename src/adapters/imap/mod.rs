//! Mailbox search client.
//!
//! The check engine consumes mailbox accounts only through the narrow
//! [`MailboxSearch`] contract: one authenticated session per call, searching
//! a set of pending tokens and returning the first matching message's
//! metadata per token. Tokens absent from the returned map were not found.

pub mod search;

pub use search::ImapSearchClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::config::AccountConfig;
use crate::error::ProbeError;
use crate::types::result::Placement;

/// First matching message for a token
#[derive(Debug, Clone)]
pub struct EmailMatch {
    pub message_id: String,
    pub subject: Option<String>,
    pub from_address: Option<String>,
    /// Folder classification of where the message was found
    pub placement: Placement,
    /// Raw header block, scanned later for authentication results
    pub auth_headers: String,
    pub size_bytes: Option<u64>,
    pub date: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait MailboxSearch: Send + Sync {
    /// Search one account for a batch of pending tokens in a single
    /// mailbox session. `since` scopes the search window to the oldest
    /// relevant test so the server-side search stays bounded.
    async fn search(
        &self,
        account: &AccountConfig,
        tokens: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, EmailMatch>, ProbeError>;
}
