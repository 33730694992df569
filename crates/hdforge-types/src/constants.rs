//! Fixed numbers of the derivation scheme.

/// First hardened child index. Indices at or above it require a private parent.
pub const HARD_DERIVATION_START: u32 = 0x8000_0000;

/// BIP44 purpose, hardened.
pub const BIP44_PURPOSE: u32 = HARD_DERIVATION_START + 44;

/// CIP-1852 purpose, hardened.
pub const CIP_1852_PURPOSE: u32 = HARD_DERIVATION_START + 1852;

/// Registered coin type, hardened.
pub const CARDANO_COINTYPE: u32 = HARD_DERIVATION_START + 1815;

/// Receive chain index under an account.
pub const EXTERNAL: u32 = 0;

/// Change chain index under an account.
pub const INTERNAL: u32 = 1;

/// Unused-address window kept on every chain.
pub const BIP44_SCAN_SIZE: u32 = 20;

/// Whether `index` falls in the hardened half of the index space.
pub const fn is_hardened(index: u32) -> bool {
    index >= HARD_DERIVATION_START
}

/// Derivation scheme of a wallet, selecting its purpose constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WalletScheme {
    /// `m / 44' / 1815' / account'`
    Bip44,
    /// `m / 1852' / 1815' / account'`
    #[default]
    Cip1852,
}

impl WalletScheme {
    pub const fn purpose(&self) -> u32 {
        match self {
            WalletScheme::Bip44 => BIP44_PURPOSE,
            WalletScheme::Cip1852 => CIP_1852_PURPOSE,
        }
    }

    pub const fn coin_type(&self) -> u32 {
        CARDANO_COINTYPE
    }

    /// Path from the root to the given (hardened) account.
    pub fn account_path(&self, account_index: u32) -> [u32; 3] {
        [self.purpose(), self.coin_type(), account_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardened_split() {
        assert!(!is_hardened(0));
        assert!(!is_hardened(HARD_DERIVATION_START - 1));
        assert!(is_hardened(HARD_DERIVATION_START));
        assert!(is_hardened(u32::MAX));
    }

    #[test]
    fn test_scheme_paths() {
        let path = WalletScheme::Cip1852.account_path(HARD_DERIVATION_START);
        assert_eq!(path, [CIP_1852_PURPOSE, CARDANO_COINTYPE, HARD_DERIVATION_START]);

        let path = WalletScheme::Bip44.account_path(HARD_DERIVATION_START + 3);
        assert_eq!(path[0], BIP44_PURPOSE);
        assert!(path.iter().all(|i| is_hardened(*i)));
    }
}
