use hdforge_crypto::CryptoError;
use hdforge_storage::StorageError;
use hdforge_types::TypesError;
use thiserror::Error;

/// Errors that can occur while building a wallet.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletError {
    /// Rejected before any transaction was opened.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Wallet wrapper has no private deriver")]
    MissingPrivateDeriver,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid data: {0}")]
    Types(#[from] TypesError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(e: tokio::task::JoinError) -> Self {
        WalletError::Task(e.to_string())
    }
}
