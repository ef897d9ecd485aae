#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),
}

impl From<r2d2::Error> for ProbeError {
    fn from(e: r2d2::Error) -> Self {
        ProbeError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for ProbeError {
    fn from(e: rusqlite::Error) -> Self {
        ProbeError::Database(e.to_string())
    }
}
