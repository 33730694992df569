//! Gap-limit address generation.
//!
//! A fresh account must already hold `BIP44_SCAN_SIZE` unused addresses on
//! both chains, whether or not a network scan ever runs. These are computed
//! here from the account public key alone.

use crate::error::WalletError;
use hdforge_crypto::{CryptoError, ExtendedKey, KeyDeriver};
use hdforge_types::constants::{EXTERNAL, INTERNAL};
use hdforge_types::Discrimination;

/// Hex address encodings for the first `N` indices of both chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapAddresses {
    pub external: Vec<String>,
    pub internal: Vec<String>,
}

impl GapAddresses {
    pub fn len(&self) -> usize {
        self.external.len() + self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.external.is_empty() && self.internal.is_empty()
    }
}

/// Derive `scan_size` addresses on the external and internal chains of an
/// account. Element `i` is the address of soft child `i` of the chain key.
/// `scan_size` must be positive.
pub fn generate_gap_addresses(
    deriver: &KeyDeriver,
    account: &ExtendedKey,
    discrimination: Discrimination,
    scan_size: u32,
) -> Result<GapAddresses, WalletError> {
    if scan_size == 0 {
        return Err(WalletError::Precondition(
            "scan size must be positive".to_string(),
        ));
    }
    let account = deriver.to_public(account);
    let external = chain_addresses(deriver, &account, EXTERNAL, discrimination, scan_size)?;
    let internal = chain_addresses(deriver, &account, INTERNAL, discrimination, scan_size)?;

    tracing::debug!(
        "Generated {} gap addresses per chain at account depth {}",
        scan_size,
        account.depth()
    );

    Ok(GapAddresses { external, internal })
}

fn chain_addresses(
    deriver: &KeyDeriver,
    account: &ExtendedKey,
    chain: u32,
    discrimination: Discrimination,
    scan_size: u32,
) -> Result<Vec<String>, CryptoError> {
    let chain_key = deriver.derive(account, chain)?;
    (0..scan_size)
        .map(|index| {
            let key = deriver.derive(&chain_key, index)?;
            Ok(deriver.address(&key, discrimination).to_hex())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdforge_types::constants::{BIP44_SCAN_SIZE, HARD_DERIVATION_START};
    use hdforge_types::{SingleAddress, WalletScheme};
    use proptest::prelude::*;

    fn account(deriver: &KeyDeriver, seed: [u8; 32]) -> ExtendedKey {
        let root = deriver.master_from_seed(&seed).unwrap();
        let path = WalletScheme::Cip1852.account_path(HARD_DERIVATION_START);
        deriver.to_public(&deriver.derive_path(&root, &path).unwrap())
    }

    #[test]
    fn test_full_gap_on_both_chains() {
        let deriver = KeyDeriver::new();
        let account = account(&deriver, [1u8; 32]);
        let gap = generate_gap_addresses(
            &deriver,
            &account,
            Discrimination::Production,
            BIP44_SCAN_SIZE,
        )
        .unwrap();

        assert_eq!(gap.external.len(), BIP44_SCAN_SIZE as usize);
        assert_eq!(gap.internal.len(), BIP44_SCAN_SIZE as usize);
        assert_eq!(gap.len(), 40);
        for hash in gap.external.iter().chain(&gap.internal) {
            let address = SingleAddress::from_hex(hash).unwrap();
            assert_eq!(address.discrimination(), Discrimination::Production);
        }
    }

    #[test]
    fn test_element_matches_manual_derivation() {
        let deriver = KeyDeriver::new();
        let account = account(&deriver, [2u8; 32]);
        let gap =
            generate_gap_addresses(&deriver, &account, Discrimination::Test, 5).unwrap();

        let key = deriver
            .derive_path(&account, &[INTERNAL, 3])
            .unwrap();
        assert_eq!(gap.internal[3], deriver.address(&key, Discrimination::Test).to_hex());
        assert_ne!(gap.external[3], gap.internal[3]);
    }

    #[test]
    fn test_private_account_gives_same_addresses() {
        let deriver = KeyDeriver::new();
        let root = deriver.master_from_seed(&[3u8; 32]).unwrap();
        let path = WalletScheme::Bip44.account_path(HARD_DERIVATION_START);
        let private = deriver.derive_path(&root, &path).unwrap();

        let from_private =
            generate_gap_addresses(&deriver, &private, Discrimination::Production, 4).unwrap();
        let from_public = generate_gap_addresses(
            &deriver,
            &deriver.to_public(&private),
            Discrimination::Production,
            4,
        )
        .unwrap();
        assert_eq!(from_private, from_public);
    }

    #[test]
    fn test_zero_scan_size_is_rejected() {
        let deriver = KeyDeriver::new();
        let account = account(&deriver, [4u8; 32]);
        let result = generate_gap_addresses(&deriver, &account, Discrimination::Production, 0);
        assert!(matches!(result, Err(WalletError::Precondition(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn generation_is_deterministic(seed in any::<[u8; 32]>()) {
            let deriver = KeyDeriver::new();
            let account = account(&deriver, seed);
            let a = generate_gap_addresses(&deriver, &account, Discrimination::Production, 3).unwrap();
            let b = generate_gap_addresses(&deriver, &account, Discrimination::Production, 3).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
