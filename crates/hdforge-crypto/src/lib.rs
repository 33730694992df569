//! hdforge Crypto - Cryptographic primitives for the hdforge wallet engine.
//!
//! This crate provides:
//! - BIP32 extended keys with hardened/soft child derivation
//! - The single-address codec over derived public keys
//! - Argon2id + AES-256-GCM password cipher
//! - Root key encryption for storage
//! - A `Crypto` capability handle bundling the above

pub mod cipher;
pub mod context;
pub mod error;
pub mod keys;
pub mod root_store;

pub use cipher::{Argon2Cipher, KdfParams, PasswordCipher};
pub use context::Crypto;
pub use error::CryptoError;
pub use keys::{harden, ExtendedKey, KeyDeriver, EXTENDED_KEY_LEN};
pub use root_store::{decrypt_root_key, encrypt_root_key};
