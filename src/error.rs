//! Error types shared by the offline queue, the menu cache and their
//! collaborators.

use thiserror::Error;

/// Failure reported by a remote gateway.
///
/// Transient failures (network, timeouts, backend overload) are worth
/// retrying on the next drain; permanent failures (validation, malformed
/// responses) will fail again. The queue retains both kinds, the split only
/// matters for logging and for callers of the direct submit path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("transient gateway failure: {0}")]
    Transient(String),

    #[error("permanent gateway failure: {0}")]
    Permanent(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Transient(msg) | GatewayError::Permanent(msg) => msg,
        }
    }
}

#[derive(Debug, Error)]
pub enum OfflineError {
    /// The local persistent store could not be opened, read or written.
    #[error("local storage failure: {0}")]
    Storage(String),

    /// A persisted value exists but is not valid JSON for its key.
    #[error("corrupt persisted value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The menu could not be fetched while the network was reachable.
    #[error("menu fetch failed: {0}")]
    RemoteFetch(#[source] GatewayError),

    /// A direct (online) order submission was rejected.
    #[error("order submission failed: {0}")]
    RemoteSubmit(#[source] GatewayError),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for OfflineError {
    fn from(err: rusqlite::Error) -> Self {
        OfflineError::Storage(err.to_string())
    }
}

pub type Result<T, E = OfflineError> = std::result::Result<T, E>;
