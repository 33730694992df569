//! Password cipher for key material at rest.
//!
//! Argon2id derives a 32-byte key from the password, AES-256-GCM encrypts.
//! Blob layout:
//!
//! ```text
//! version(1) | memory_cost(4) | time_cost(4) | parallelism(4)
//!   | salt(16) | nonce(12) | checksum(32) | verifier(32) | ciphertext
//! ```
//!
//! The first four fields are the GCM associated data. `checksum` is an
//! unkeyed blake3 over every other byte of the blob and catches corruption
//! before any key is derived. `verifier = blake3(derived_key[16..32])` does
//! not depend on the ciphertext, so a mismatch can only mean a wrong password.

use crate::error::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

const BLOB_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const CHECKSUM_LEN: usize = 32;
const VERIFIER_LEN: usize = 32;
const PARAMS_LEN: usize = 12;
const AAD_LEN: usize = 1 + PARAMS_LEN + SALT_LEN + NONCE_LEN;
const HEADER_LEN: usize = AAD_LEN + CHECKSUM_LEN + VERIFIER_LEN;

/// 4 GiB, in KiB.
const MAX_MEMORY_COST: u32 = 4 * 1024 * 1024;
const MAX_TIME_COST: u32 = 64;
const MAX_PARALLELISM: u32 = 64;

/// Encrypts and decrypts byte strings under a password.
pub trait PasswordCipher: Send + Sync + fmt::Debug {
    fn encrypt(&self, password: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Fails with [`CryptoError::InvalidPassword`] on a wrong password and
    /// [`CryptoError::MalformedCiphertext`] / [`CryptoError::DecryptionFailed`]
    /// on a damaged blob.
    fn decrypt(&self, password: &str, blob: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KdfParams {
    /// KiB of memory
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and throwaway wallets.
    pub fn light() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Whether every cost is within the supported maximum.
    pub fn is_bounded(&self) -> bool {
        self.memory_cost <= MAX_MEMORY_COST
            && self.time_cost <= MAX_TIME_COST
            && self.parallelism <= MAX_PARALLELISM
    }

    fn argon2(&self) -> Result<Argon2<'static>, CryptoError> {
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, Some(32))
            .map_err(|e| CryptoError::KeyDerivationFailed(format!("{:?}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn to_bytes(self) -> [u8; PARAMS_LEN] {
        let mut out = [0u8; PARAMS_LEN];
        out[0..4].copy_from_slice(&self.memory_cost.to_le_bytes());
        out[4..8].copy_from_slice(&self.time_cost.to_le_bytes());
        out[8..12].copy_from_slice(&self.parallelism.to_le_bytes());
        out
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let word = |i: usize| {
            let mut w = [0u8; 4];
            w.copy_from_slice(&bytes[i..i + 4]);
            u32::from_le_bytes(w)
        };
        Self {
            memory_cost: word(0),
            time_cost: word(4),
            parallelism: word(8),
        }
    }
}

/// Argon2id + AES-256-GCM cipher.
#[derive(Debug, Clone, Default)]
pub struct Argon2Cipher {
    params: KdfParams,
}

impl Argon2Cipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    fn derive_key(
        params: &KdfParams,
        password: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let mut key = Zeroizing::new([0u8; 32]);
        params
            .argon2()?
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| CryptoError::KeyDerivationFailed(format!("{:?}", e)))?;
        Ok(key)
    }

    fn verifier(key: &[u8; 32]) -> blake3::Hash {
        blake3::hash(&key[16..32])
    }

    fn checksum(aad: &[u8], verifier: &[u8], ciphertext: &[u8]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(aad);
        hasher.update(verifier);
        hasher.update(ciphertext);
        hasher.finalize()
    }
}

impl PasswordCipher for Argon2Cipher {
    fn encrypt(&self, password: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if !self.params.is_bounded() {
            return Err(CryptoError::KeyDerivationFailed(format!(
                "cost parameters out of range: {:?}",
                self.params
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let mut aad = Vec::with_capacity(AAD_LEN);
        aad.push(BLOB_VERSION);
        aad.extend_from_slice(&self.params.to_bytes());
        aad.extend_from_slice(&salt);
        aad.extend_from_slice(&nonce_bytes);

        let key = Self::derive_key(&self.params, password, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(format!("{:?}", e)))?;
        let verifier = Self::verifier(&key);
        let checksum = Self::checksum(&aad, verifier.as_bytes(), &ciphertext);

        let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        blob.extend_from_slice(&aad);
        blob.extend_from_slice(checksum.as_bytes());
        blob.extend_from_slice(verifier.as_bytes());
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn decrypt(&self, password: &str, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() <= HEADER_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "blob too short: {} bytes",
                blob.len()
            )));
        }
        if blob[0] != BLOB_VERSION {
            return Err(CryptoError::MalformedCiphertext(format!(
                "unsupported version: {}",
                blob[0]
            )));
        }

        let (aad, rest) = blob.split_at(AAD_LEN);
        let (checksum, rest) = rest.split_at(CHECKSUM_LEN);
        let (verifier, ciphertext) = rest.split_at(VERIFIER_LEN);
        if Self::checksum(aad, verifier, ciphertext).as_bytes() != checksum {
            return Err(CryptoError::MalformedCiphertext(
                "checksum mismatch".to_string(),
            ));
        }

        let (params, rest) = aad[1..].split_at(PARAMS_LEN);
        let (salt, nonce_bytes) = rest.split_at(SALT_LEN);

        // params come from the blob so stored keys survive config changes
        let params = KdfParams::from_bytes(params);
        if !params.is_bounded() {
            return Err(CryptoError::MalformedCiphertext(format!(
                "cost parameters out of range: {:?}",
                params
            )));
        }
        let key = Self::derive_key(&params, password, salt)?;

        if Self::verifier(&key).as_bytes() != verifier {
            return Err(CryptoError::InvalidPassword);
        }

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
        cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed("authentication tag mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> Argon2Cipher {
        Argon2Cipher::new(KdfParams::light())
    }

    /// Recompute the checksum after editing a blob, so only the later checks
    /// can notice the edit.
    fn reseal(blob: &mut [u8]) {
        let (head, ciphertext) = blob.split_at_mut(HEADER_LEN);
        let (aad, rest) = head.split_at_mut(AAD_LEN);
        let (checksum, verifier) = rest.split_at_mut(CHECKSUM_LEN);
        let fresh = Argon2Cipher::checksum(aad, verifier, ciphertext);
        checksum.copy_from_slice(fresh.as_bytes());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let secret = [42u8; 78];
        let blob = cipher().encrypt("test_password_123", &secret).unwrap();
        assert_ne!(&blob[HEADER_LEN..], &secret[..]);

        let plain = cipher().decrypt("test_password_123", &blob).unwrap();
        assert_eq!(plain, secret);
    }

    #[test]
    fn test_decrypt_wrong_password() {
        let blob = cipher().encrypt("correct_password", b"secret").unwrap();
        assert_eq!(
            cipher().decrypt("wrong_password", &blob),
            Err(CryptoError::InvalidPassword)
        );
    }

    #[test]
    fn test_decrypt_truncated() {
        let blob = cipher().encrypt("pw", b"secret").unwrap();
        let result = cipher().decrypt("pw", &blob[..HEADER_LEN]);
        assert!(matches!(result, Err(CryptoError::MalformedCiphertext(_))));
    }

    #[test]
    fn test_decrypt_bad_version() {
        let mut blob = cipher().encrypt("pw", b"secret").unwrap();
        blob[0] = 9;
        assert!(matches!(
            cipher().decrypt("pw", &blob),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_corrupt_ciphertext_is_not_a_wrong_password() {
        let mut blob = cipher().encrypt("pw", b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(matches!(
            cipher().decrypt("pw", &blob),
            Err(CryptoError::MalformedCiphertext(_))
        ));

        reseal(&mut blob);
        assert!(matches!(
            cipher().decrypt("pw", &blob),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_corrupt_salt_is_not_a_wrong_password() {
        let mut blob = cipher().encrypt("pw", b"secret").unwrap();
        blob[1 + PARAMS_LEN] ^= 0x01;
        assert!(matches!(
            cipher().decrypt("pw", &blob),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_header_is_authenticated() {
        let mut blob = cipher().encrypt("pw", b"secret").unwrap();
        // nonce is covered by the GCM tag, not by the password verifier
        blob[AAD_LEN - 1] ^= 0x01;
        reseal(&mut blob);
        assert!(matches!(
            cipher().decrypt("pw", &blob),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_unbounded_params_are_rejected() {
        let mut blob = cipher().encrypt("pw", b"secret").unwrap();
        blob[5..9].copy_from_slice(&u32::MAX.to_le_bytes());
        reseal(&mut blob);
        assert!(matches!(
            cipher().decrypt("pw", &blob),
            Err(CryptoError::MalformedCiphertext(_))
        ));

        let greedy = Argon2Cipher::new(KdfParams {
            memory_cost: u32::MAX,
            ..KdfParams::light()
        });
        assert!(greedy.encrypt("pw", b"secret").is_err());
    }

    #[test]
    fn test_params_travel_with_blob() {
        let blob = cipher().encrypt("pw", b"secret").unwrap();
        // a cipher with different defaults still reads the stored parameters
        let other = Argon2Cipher::new(KdfParams {
            memory_cost: 2048,
            time_cost: 2,
            parallelism: 1,
        });
        assert_eq!(other.decrypt("pw", &blob).unwrap(), b"secret");
    }

    #[test]
    fn test_salt_randomized() {
        let a = cipher().encrypt("pw", b"secret").unwrap();
        let b = cipher().encrypt("pw", b"secret").unwrap();
        assert_ne!(a, b);
    }
}
