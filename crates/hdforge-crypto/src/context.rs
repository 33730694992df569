use crate::cipher::{Argon2Cipher, KdfParams, PasswordCipher};
use crate::keys::KeyDeriver;
use std::sync::Arc;

/// Cryptographic capabilities handed to the wallet engine.
///
/// Cheap to clone. Tests swap in their own [`PasswordCipher`].
#[derive(Debug, Clone)]
pub struct Crypto {
    deriver: KeyDeriver,
    cipher: Arc<dyn PasswordCipher>,
}

impl Crypto {
    pub fn new(cipher: Arc<dyn PasswordCipher>) -> Self {
        Self {
            deriver: KeyDeriver::new(),
            cipher,
        }
    }

    /// Argon2id cipher with the given cost parameters.
    pub fn with_kdf_params(params: KdfParams) -> Self {
        Self::new(Arc::new(Argon2Cipher::new(params)))
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    pub fn cipher(&self) -> &dyn PasswordCipher {
        self.cipher.as_ref()
    }

    /// Shared handle to the cipher, for moving onto a blocking thread.
    pub fn cipher_handle(&self) -> Arc<dyn PasswordCipher> {
        Arc::clone(&self.cipher)
    }
}

impl Default for Crypto {
    fn default() -> Self {
        Self::with_kdf_params(KdfParams::default())
    }
}
