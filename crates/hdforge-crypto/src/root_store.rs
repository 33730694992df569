//! Encryption of root private keys before they reach storage.
//!
//! Only the hex of the cipher blob is ever persisted. Plaintext key bytes live
//! in zeroized buffers for the duration of a call.

use crate::cipher::PasswordCipher;
use crate::error::CryptoError;
use crate::keys::ExtendedKey;
use zeroize::Zeroizing;

/// Encrypt a private extended key, returning the hex blob to store.
pub fn encrypt_root_key(
    cipher: &dyn PasswordCipher,
    password: &str,
    root: &ExtendedKey,
) -> Result<String, CryptoError> {
    if !root.is_private() {
        return Err(CryptoError::NotPrivate);
    }
    let raw = Zeroizing::new(root.encode());
    let blob = cipher.encrypt(password, &raw[..])?;
    Ok(hex::encode(blob))
}

/// Decrypt a stored hex blob back into the private extended key.
pub fn decrypt_root_key(
    cipher: &dyn PasswordCipher,
    password: &str,
    hash: &str,
) -> Result<ExtendedKey, CryptoError> {
    let blob = hex::decode(hash)?;
    let raw = Zeroizing::new(cipher.decrypt(password, &blob)?);
    ExtendedKey::decode_private(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{Argon2Cipher, KdfParams};
    use crate::keys::KeyDeriver;

    fn setup() -> (Argon2Cipher, KeyDeriver, ExtendedKey) {
        let deriver = KeyDeriver::new();
        let root = deriver.master_from_seed(&[7u8; 32]).unwrap();
        (Argon2Cipher::new(KdfParams::light()), deriver, root)
    }

    #[test]
    fn test_root_roundtrip() {
        let (cipher, _, root) = setup();
        let hash = encrypt_root_key(&cipher, "pw", &root).unwrap();
        assert!(!hash.contains(&hex::encode(root.encode())));
        assert_eq!(decrypt_root_key(&cipher, "pw", &hash).unwrap(), root);
    }

    #[test]
    fn test_root_wrong_password() {
        let (cipher, _, root) = setup();
        let hash = encrypt_root_key(&cipher, "pw", &root).unwrap();
        assert_eq!(
            decrypt_root_key(&cipher, "nope", &hash),
            Err(CryptoError::InvalidPassword)
        );
    }

    #[test]
    fn test_public_key_rejected() {
        let (cipher, deriver, root) = setup();
        let public = deriver.to_public(&root);
        assert_eq!(
            encrypt_root_key(&cipher, "pw", &public),
            Err(CryptoError::NotPrivate)
        );
    }

    #[test]
    fn test_corrupt_hex() {
        let (cipher, _, _) = setup();
        assert!(matches!(
            decrypt_root_key(&cipher, "pw", "zz"),
            Err(CryptoError::InvalidHex(_))
        ));
    }
}
