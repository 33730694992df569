//! hdforge Types - Core type definitions for the hdforge wallet engine.
//!
//! This crate provides the fundamental types shared by every layer:
//! - Derivation constants (hardened threshold, purpose, coin type, chains, gap size)
//! - Derivation levels of the wallet key tree
//! - Single addresses (header byte + key hash, Bech32m encoded)
//! - Row and insert records for every persisted table

pub mod address;
pub mod constants;
pub mod error;
pub mod level;
pub mod rows;

pub use address::{Discrimination, SingleAddress};
pub use constants::WalletScheme;
pub use error::TypesError;
pub use level::DerivationLevel;
pub use rows::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::constants::*;
    pub use crate::{
        DerivationLevel, Discrimination, SingleAddress, TypesError, WalletScheme,
    };
    pub use crate::rows::{
        AddressInsert, AddressRow, ChainMetaInsert, ChainMetaRow, ConceptualWalletInsert,
        ConceptualWalletRow, KeyDerivationInsert, KeyDerivationRow, KeyInsert, KeyRow,
        PublicDeriverInsert, PublicDeriverRow, RowId, WrapperInsert, WrapperRow,
    };
}
