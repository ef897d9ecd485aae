//! async-imap implementation of the mailbox search contract.
//!
//! Session setup (TCP, TLS, LOGIN, folder EXAMINE) dominates the cost of a
//! check, so one session covers the whole token batch: INBOX first, then
//! the provider's spam folder for whatever is still missing.

use std::collections::HashMap;

use async_imap::types::Fetch;
use async_imap::Session;
use async_native_tls::TlsStream;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mailparse::MailHeaderMap;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::{EmailMatch, MailboxSearch};
use crate::config::AccountConfig;
use crate::error::ProbeError;
use crate::types::result::Placement;

// An IMAP session is generic over the stream type — here TLS-encrypted
// TCP.
pub type ImapSession = Session<TlsStream<TcpStream>>;

#[derive(Debug, Default)]
pub struct ImapSearchClient;

impl ImapSearchClient {
    pub fn new() -> Self {
        Self
    }
}

async fn connect(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<ImapSession, ProbeError> {
    debug!(host = %host, port = port, "Connecting to IMAP server");

    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|e| ProbeError::Mailbox(format!("TCP connection failed: {}", e)))?;

    let tls = async_native_tls::TlsConnector::new();
    let tls_stream = tls
        .connect(host, tcp)
        .await
        .map_err(|e| ProbeError::Mailbox(format!("TLS handshake failed: {}", e)))?;

    let client = async_imap::Client::new(tls_stream);

    let session = client
        .login(username, password)
        .await
        .map_err(|(e, _)| ProbeError::Mailbox(format!("Login failed: {}", e)))?;

    Ok(session)
}

/// Search one folder for every still-unmatched token. Matches land in
/// `found` with the folder's placement.
async fn search_folder(
    session: &mut ImapSession,
    folder: &str,
    placement: Placement,
    tokens: &[String],
    since: DateTime<Utc>,
    found: &mut HashMap<String, EmailMatch>,
) -> Result<(), ProbeError> {
    session
        .examine(folder)
        .await
        .map_err(|e| ProbeError::Mailbox(format!("EXAMINE {} failed: {}", folder, e)))?;

    let since_str = since.format("%d-%b-%Y").to_string();

    for token in tokens {
        if found.contains_key(token) {
            continue;
        }

        let query = format!("SUBJECT {} SINCE {}", token, since_str);
        let uids = session
            .uid_search(&query)
            .await
            .map_err(|e| ProbeError::Mailbox(format!("SEARCH failed: {}", e)))?;

        // First matching message only
        let uid = match uids.iter().min() {
            Some(&uid) => uid,
            None => continue,
        };

        let fetches: Vec<Fetch> = session
            .uid_fetch(
                &uid.to_string(),
                "(UID RFC822.SIZE INTERNALDATE BODY.PEEK[HEADER])",
            )
            .await
            .map_err(|e| ProbeError::Mailbox(format!("FETCH failed: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| ProbeError::Mailbox(format!("Collect failed: {}", e)))?;

        let fetch = match fetches.iter().find(|f| f.uid == Some(uid)) {
            Some(f) => f,
            None => continue,
        };

        let header_bytes = fetch.header().unwrap_or(&[]);
        let headers = match mailparse::parse_headers(header_bytes) {
            Ok((headers, _)) => headers,
            Err(e) => {
                // Leave the token unmatched; the association stays pending
                // and gets another look on the next scheduled check
                warn!(token = %token, folder = %folder, "Header parse failed: {}", e);
                continue;
            }
        };

        let email_match = EmailMatch {
            message_id: headers
                .get_first_value("Message-ID")
                .unwrap_or_else(|| format!("<uid-{}@{}>", uid, folder)),
            subject: headers.get_first_value("Subject"),
            from_address: headers.get_first_value("From"),
            placement,
            auth_headers: String::from_utf8_lossy(header_bytes).into_owned(),
            size_bytes: fetch.size.map(u64::from),
            date: fetch.internal_date().map(|d| d.with_timezone(&Utc)),
        };

        debug!(token = %token, folder = %folder, uid = uid, "Token matched");
        found.insert(token.clone(), email_match);
    }

    Ok(())
}

#[async_trait]
impl MailboxSearch for ImapSearchClient {
    async fn search(
        &self,
        account: &AccountConfig,
        tokens: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashMap<String, EmailMatch>, ProbeError> {
        let mut session = connect(
            &account.imap.host,
            account.imap.port,
            &account.imap.user,
            &account.imap.password,
        )
        .await?;

        let mut found = HashMap::new();

        search_folder(
            &mut session,
            "INBOX",
            Placement::Inbox,
            tokens,
            since,
            &mut found,
        )
        .await?;

        if found.len() < tokens.len() {
            // A missing or renamed spam folder is not a connection failure;
            // the inbox results still count
            if let Err(e) = search_folder(
                &mut session,
                &account.spam_folder,
                Placement::Spam,
                tokens,
                since,
                &mut found,
            )
            .await
            {
                warn!(account_id = %account.email, folder = %account.spam_folder, "Spam folder search failed: {}", e);
            }
        }

        let _ = session.logout().await;

        info!(
            account_id = %account.email,
            searched = tokens.len(),
            matched = found.len(),
            "Mailbox search complete"
        );

        Ok(found)
    }
}
