use thiserror::Error;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Cannot derive hardened child {0:#x} from a public key")]
    HardenedFromPublic(u32),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid seed length: expected 16..=64, got {0}")]
    InvalidSeedLength(usize),

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Expected a private extended key")]
    NotPrivate,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}

impl From<bitcoin::bip32::Error> for CryptoError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        CryptoError::KeyDerivationFailed(e.to_string())
    }
}

impl From<hex::FromHexError> for CryptoError {
    fn from(e: hex::FromHexError) -> Self {
        CryptoError::InvalidHex(e.to_string())
    }
}
