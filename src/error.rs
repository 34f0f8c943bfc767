use thiserror::Error;

/// Domain error type. Each variant carries enough shape to let callers
/// decide retry vs. skip vs. shutdown without re-parsing a message.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("reorg detected at height {} ({})", .0.at_height, .0.at_hash)]
    Reorg(ReorgSignal),

    #[error("config error: {0}")]
    Config(String),

    #[error("webhook error: {0}")]
    Webhook(String),

    #[error("shutdown: {0}")]
    Shutdown(String),

    #[error("invalid tenant id: {0}")]
    InvalidTenantId(String),
}

/// Carried by the synchronizer to the fallback worker when `NextHeaders`
/// detects a parent-hash mismatch. Not an error in the panic sense — it is
/// the normal signal that reshapes into a rollback.
#[derive(Debug, Clone)]
pub struct ReorgSignal {
    pub at_height: i64,
    pub at_hash: String,
}

impl From<reqwest::Error> for WalletError {
    fn from(e: reqwest::Error) -> Self {
        WalletError::Rpc(e.to_string())
    }
}

impl From<config::ConfigError> for WalletError {
    fn from(e: config::ConfigError) -> Self {
        WalletError::Config(e.to_string())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Whether an error is worth retrying under the bounded-backoff policy, as
/// opposed to being fatal to the current DB transaction attempt.
impl WalletError {
    pub fn is_transient_db(&self) -> bool {
        matches!(self, WalletError::Database(_))
    }
}
