//! Rows of every table the wallet engine writes.
//!
//! Each table has an `*Insert` record (what the caller supplies) and a `*Row`
//! record (the insert plus the identifier the store assigned to it).

use crate::error::TypesError;

/// Identifier assigned by the store on insert.
pub type RowId = u64;

/// Top-level wallet identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConceptualWalletInsert {
    pub coin_type: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConceptualWalletRow {
    pub conceptual_wallet_id: RowId,
    pub coin_type: u32,
    pub name: String,
}

/// Key material. `hash` is the hex of either an encrypted private key blob or
/// a plain encoded public key.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyInsert {
    pub hash: String,
    pub is_encrypted: bool,
    /// Unix seconds of the last password change, `None` if never changed.
    pub password_last_update: Option<u64>,
}

#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyRow {
    pub key_id: RowId,
    pub hash: String,
    pub is_encrypted: bool,
    pub password_last_update: Option<u64>,
}

// Key material stays out of logs.
impl std::fmt::Debug for KeyInsert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyInsert")
            .field("is_encrypted", &self.is_encrypted)
            .field("password_last_update", &self.password_last_update)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for KeyRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRow")
            .field("key_id", &self.key_id)
            .field("is_encrypted", &self.is_encrypted)
            .field("password_last_update", &self.password_last_update)
            .finish_non_exhaustive()
    }
}

/// One node of the persisted derivation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyDerivationInsert {
    pub private_key_id: Option<RowId>,
    pub public_key_id: Option<RowId>,
    /// `None` only for the root.
    pub parent: Option<RowId>,
    /// `None` only for the root.
    pub index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyDerivationRow {
    pub key_derivation_id: RowId,
    pub private_key_id: Option<RowId>,
    pub public_key_id: Option<RowId>,
    pub parent: Option<RowId>,
    pub index: Option<u32>,
}

/// Signing and deriving levels of a conceptual wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WrapperInsert {
    pub conceptual_wallet_id: RowId,
    pub signer_level: u32,
    pub public_deriver_level: u32,
    pub private_deriver_level: Option<u32>,
    pub private_deriver_key_derivation_id: Option<RowId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WrapperRow {
    pub wrapper_id: RowId,
    pub conceptual_wallet_id: RowId,
    pub signer_level: u32,
    pub public_deriver_level: u32,
    pub private_deriver_level: Option<u32>,
    pub private_deriver_key_derivation_id: Option<RowId>,
}

fn private_deriver_pair(
    id: Option<RowId>,
    level: Option<u32>,
) -> Result<Option<(RowId, u32)>, TypesError> {
    match (id, level) {
        (Some(id), Some(level)) => Ok(Some((id, level))),
        (None, None) => Ok(None),
        _ => Err(TypesError::PartialPrivateDeriver),
    }
}

impl WrapperInsert {
    /// Returns the private deriver `(key_derivation_id, level)` if present.
    pub fn private_deriver(&self) -> Result<Option<(RowId, u32)>, TypesError> {
        private_deriver_pair(
            self.private_deriver_key_derivation_id,
            self.private_deriver_level,
        )
    }
}

impl WrapperRow {
    /// Returns the private deriver `(key_derivation_id, level)` if present.
    pub fn private_deriver(&self) -> Result<Option<(RowId, u32)>, TypesError> {
        private_deriver_pair(
            self.private_deriver_key_derivation_id,
            self.private_deriver_level,
        )
    }
}

/// Account-level node exposed for public derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublicDeriverInsert {
    pub conceptual_wallet_id: RowId,
    pub key_derivation_id: RowId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublicDeriverRow {
    pub public_deriver_id: RowId,
    pub conceptual_wallet_id: RowId,
    pub key_derivation_id: RowId,
    pub name: String,
}

/// Per-chain metadata. `display_cutoff` is `Some` only on the external chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainMetaInsert {
    pub key_derivation_id: RowId,
    pub display_cutoff: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainMetaRow {
    pub chain_meta_id: RowId,
    pub key_derivation_id: RowId,
    pub display_cutoff: Option<u32>,
}

/// Address attached to an address-level node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressInsert {
    pub key_derivation_id: RowId,
    /// Hex of the raw address bytes.
    pub hash: String,
    /// Short lookup digest of `hash`.
    pub digest: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressRow {
    pub address_id: RowId,
    pub key_derivation_id: RowId,
    pub hash: String,
    pub digest: u64,
}
