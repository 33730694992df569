//! BIP32 extended keys and child derivation.
//!
//! Indices at or above [`HARD_DERIVATION_START`] are hardened and can only be
//! derived from a private parent.

use crate::error::CryptoError;
use bitcoin::bip32::{ChildNumber, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::NetworkKind;
use hdforge_types::constants::{is_hardened, HARD_DERIVATION_START};
use hdforge_types::{Discrimination, SingleAddress};
use std::fmt;

/// Length of a serialized extended key.
pub const EXTENDED_KEY_LEN: usize = 78;

/// Private or public-only extended key.
#[derive(Clone, PartialEq, Eq)]
pub enum ExtendedKey {
    Private(Xpriv),
    Public(Xpub),
}

impl ExtendedKey {
    pub fn is_private(&self) -> bool {
        matches!(self, ExtendedKey::Private(_))
    }

    /// Depth below the master key.
    pub fn depth(&self) -> u8 {
        match self {
            ExtendedKey::Private(k) => k.depth,
            ExtendedKey::Public(k) => k.depth,
        }
    }

    /// Serialized extended key.
    pub fn encode(&self) -> [u8; EXTENDED_KEY_LEN] {
        match self {
            ExtendedKey::Private(k) => k.encode(),
            ExtendedKey::Public(k) => k.encode(),
        }
    }

    pub fn decode_private(bytes: &[u8]) -> Result<Self, CryptoError> {
        Xpriv::decode(bytes)
            .map(ExtendedKey::Private)
            .map_err(|e| CryptoError::InvalidExtendedKey(e.to_string()))
    }

    pub fn decode_public(bytes: &[u8]) -> Result<Self, CryptoError> {
        Xpub::decode(bytes)
            .map(ExtendedKey::Public)
            .map_err(|e| CryptoError::InvalidExtendedKey(e.to_string()))
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedKey::Private(k) => write!(f, "ExtendedKey::Private(depth={})", k.depth),
            ExtendedKey::Public(k) => write!(f, "ExtendedKey::Public({})", k),
        }
    }
}

/// Derivation capability. Owns the secp256k1 context so callers never touch
/// a process-wide one.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    secp: Secp256k1<All>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDeriver {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Master private key from a BIP32 seed (16 to 64 bytes).
    pub fn master_from_seed(&self, seed: &[u8]) -> Result<ExtendedKey, CryptoError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(CryptoError::InvalidSeedLength(seed.len()));
        }
        let xpriv = Xpriv::new_master(NetworkKind::Main, seed)?;
        Ok(ExtendedKey::Private(xpriv))
    }

    /// Derive the child at `index`. Hardened indices require a private parent.
    pub fn derive(&self, parent: &ExtendedKey, index: u32) -> Result<ExtendedKey, CryptoError> {
        let child = ChildNumber::from(index);
        match parent {
            ExtendedKey::Private(xpriv) => {
                Ok(ExtendedKey::Private(xpriv.derive_priv(&self.secp, &[child])?))
            }
            ExtendedKey::Public(xpub) => {
                if is_hardened(index) {
                    return Err(CryptoError::HardenedFromPublic(index));
                }
                Ok(ExtendedKey::Public(xpub.ckd_pub(&self.secp, child)?))
            }
        }
    }

    /// Derive along `path`, one index at a time.
    pub fn derive_path(
        &self,
        parent: &ExtendedKey,
        path: &[u32],
    ) -> Result<ExtendedKey, CryptoError> {
        path.iter()
            .try_fold(parent.clone(), |key, index| self.derive(&key, *index))
    }

    /// Neuter a key. Public keys are returned unchanged.
    pub fn to_public(&self, key: &ExtendedKey) -> ExtendedKey {
        match key {
            ExtendedKey::Private(xpriv) => {
                ExtendedKey::Public(Xpub::from_priv(&self.secp, xpriv))
            }
            ExtendedKey::Public(_) => key.clone(),
        }
    }

    /// Compressed secp256k1 public key of `key`.
    pub fn raw_public_key(&self, key: &ExtendedKey) -> [u8; 33] {
        match key {
            ExtendedKey::Private(xpriv) => {
                Xpub::from_priv(&self.secp, xpriv).public_key.serialize()
            }
            ExtendedKey::Public(xpub) => xpub.public_key.serialize(),
        }
    }

    /// Address codec: single address of `key`'s public key on a network.
    pub fn address(&self, key: &ExtendedKey, discrimination: Discrimination) -> SingleAddress {
        SingleAddress::from_public_key(&self.raw_public_key(key), discrimination)
    }
}

/// Hardened index for a human account number (`0` → `0x8000_0000`).
pub fn harden(index: u32) -> Result<u32, CryptoError> {
    index
        .checked_add(HARD_DERIVATION_START)
        .filter(|i| is_hardened(*i))
        .ok_or_else(|| CryptoError::KeyDerivationFailed(format!("index {} out of range", index)))
}
