//! hdforge Wallet - Wallet construction on top of the key tree and storage.
//!
//! This crate provides:
//! - Gap-limit address generation from an account public key
//! - Address association (hash mapper)
//! - Insert plans for the chain and address nodes of an account
//! - The staged, transactional `WalletBuilder`
//! - `create_standard_wallet`, the one-call path used by the CLI

pub mod builder;
pub mod error;
pub mod gap;
pub mod hash_mapper;
pub mod plan;
pub mod standard;

pub use builder::{
    DeriverRequest, DerivedNode, HasConceptualWallet, HasPublicDeriver, HasRoot, HasWrapper,
    PublicDeriverHandle, RootHandle, RootRequest, Stage, WalletBuilder,
};
pub use error::WalletError;
pub use gap::{generate_gap_addresses, GapAddresses};
pub use hash_mapper::{address_digest, AddressAssociator, HashMapper};
pub use plan::{account_default_derivations, InsertFn, InsertPlan, LevelRow, PlannedInsert};
pub use standard::{create_standard_wallet, StandardWalletRequest};
