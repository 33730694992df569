//! The standard single-account wallet.

use crate::builder::{DeriverRequest, HasPublicDeriver, RootRequest, WalletBuilder};
use crate::error::WalletError;
use crate::gap::generate_gap_addresses;
use crate::hash_mapper::HashMapper;
use crate::plan::{account_default_derivations, InsertPlan};
use hdforge_crypto::{encrypt_root_key, Crypto, ExtendedKey};
use hdforge_storage::Database;
use hdforge_types::constants::{is_hardened, BIP44_SCAN_SIZE, HARD_DERIVATION_START};
use hdforge_types::{
    ConceptualWalletInsert, DerivationLevel, Discrimination, KeyInsert, WalletScheme,
    WrapperInsert,
};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Inputs of [`create_standard_wallet`].
pub struct StandardWalletRequest {
    pub discrimination: Discrimination,
    pub root_key: ExtendedKey,
    pub password: Zeroizing<String>,
    /// Hardened account index.
    pub account_index: u32,
    pub wallet_name: String,
    pub account_name: String,
    pub scheme: WalletScheme,
}

impl std::fmt::Debug for StandardWalletRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardWalletRequest")
            .field("discrimination", &self.discrimination)
            .field("account_index", &self.account_index)
            .field("wallet_name", &self.wallet_name)
            .field("account_name", &self.account_name)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

/// Create a wallet with its root key encrypted at the root node, one account
/// as public deriver and a full address gap on both chains, in one
/// transaction.
pub async fn create_standard_wallet(
    db: &Database,
    crypto: &Crypto,
    request: StandardWalletRequest,
) -> Result<HasPublicDeriver, WalletError> {
    if !is_hardened(request.account_index) {
        return Err(WalletError::Precondition(format!(
            "account index {} must be at least {:#x}",
            request.account_index, HARD_DERIVATION_START
        )));
    }
    if !request.root_key.is_private() {
        return Err(WalletError::Precondition(
            "root key must be a private key".to_string(),
        ));
    }

    let encrypted_root = {
        let cipher = crypto.cipher_handle();
        let password = request.password.clone();
        let root = request.root_key.clone();
        tokio::task::spawn_blocking(move || encrypt_root_key(cipher.as_ref(), &password, &root))
            .await??
    };

    let path = request.scheme.account_path(request.account_index);
    let deriver = crypto.deriver();
    let account = deriver.to_public(&deriver.derive_path(&request.root_key, &path)?);
    let gap = generate_gap_addresses(deriver, &account, request.discrimination, BIP44_SCAN_SIZE)?;
    let initial_derivations = account_default_derivations(gap, Arc::new(HashMapper::new()))?;

    // The private deriver is the root itself.
    let private_deriver_level = DerivationLevel::Root.level();
    let public_deriver_level = DerivationLevel::Root.descend(path.len() as u32)?.level();

    let coin_type = request.scheme.coin_type();
    let wallet_name = request.wallet_name;
    let account_name = request.account_name;
    let password = request.password;

    let state = WalletBuilder::start(db, crypto)
        .add_conceptual_wallet(move |_| {
            Ok(ConceptualWalletInsert {
                coin_type,
                name: wallet_name,
            })
        })
        .add_root(move |_| {
            Ok(RootRequest {
                private_key: Some(KeyInsert {
                    hash: encrypted_root,
                    is_encrypted: true,
                    password_last_update: None,
                }),
                public_key: None,
                tree: InsertPlan::new(),
            })
        })
        .add_wrapper(move |state| {
            Ok(WrapperInsert {
                conceptual_wallet_id: state.conceptual_wallet.conceptual_wallet_id,
                signer_level: DerivationLevel::Root.level(),
                public_deriver_level,
                private_deriver_level: Some(private_deriver_level),
                private_deriver_key_derivation_id: Some(state.root.key_derivation.key_derivation_id),
            })
        })
        .derive_public_deriver(move |_| {
            Ok(DeriverRequest {
                password,
                name: account_name,
                path: path.to_vec(),
                initial_derivations,
            })
        })
        .commit()
        .await?;

    tracing::info!(
        "Created wallet {} with account {:#x}",
        state.conceptual_wallet.conceptual_wallet_id,
        request.account_index
    );
    Ok(state)
}
