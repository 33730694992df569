use crate::error::TypesError;
use std::fmt;

/// Depth of a node in the wallet key tree, counted from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DerivationLevel {
    Root,
    Purpose,
    CoinType,
    Account,
    Chain,
    Address,
}

impl DerivationLevel {
    pub const ALL: [DerivationLevel; 6] = [
        DerivationLevel::Root,
        DerivationLevel::Purpose,
        DerivationLevel::CoinType,
        DerivationLevel::Account,
        DerivationLevel::Chain,
        DerivationLevel::Address,
    ];

    pub const fn level(&self) -> u32 {
        match self {
            DerivationLevel::Root => 0,
            DerivationLevel::Purpose => 1,
            DerivationLevel::CoinType => 2,
            DerivationLevel::Account => 3,
            DerivationLevel::Chain => 4,
            DerivationLevel::Address => 5,
        }
    }

    pub fn from_level(level: u32) -> Result<Self, TypesError> {
        Self::ALL
            .get(level as usize)
            .copied()
            .ok_or(TypesError::InvalidLevel(level))
    }

    /// The level `depth` steps below this one.
    pub fn descend(&self, depth: u32) -> Result<Self, TypesError> {
        Self::from_level(self.level() + depth)
    }

    /// Levels below the account are derived with soft indices.
    pub const fn is_hardened(&self) -> bool {
        matches!(
            self,
            DerivationLevel::Purpose | DerivationLevel::CoinType | DerivationLevel::Account
        )
    }
}

impl fmt::Display for DerivationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivationLevel::Root => "root",
            DerivationLevel::Purpose => "purpose",
            DerivationLevel::CoinType => "coin_type",
            DerivationLevel::Account => "account",
            DerivationLevel::Chain => "chain",
            DerivationLevel::Address => "address",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_roundtrip() {
        for level in DerivationLevel::ALL {
            assert_eq!(DerivationLevel::from_level(level.level()).unwrap(), level);
        }
        assert_eq!(
            DerivationLevel::from_level(6),
            Err(TypesError::InvalidLevel(6))
        );
    }

    #[test]
    fn test_descend() {
        assert_eq!(
            DerivationLevel::Account.descend(1).unwrap(),
            DerivationLevel::Chain
        );
        assert_eq!(
            DerivationLevel::Account.descend(2).unwrap(),
            DerivationLevel::Address
        );
        assert!(DerivationLevel::Address.descend(1).is_err());
    }

    #[test]
    fn test_hardened_levels() {
        assert!(!DerivationLevel::Root.is_hardened());
        assert!(DerivationLevel::Account.is_hardened());
        assert!(!DerivationLevel::Chain.is_hardened());
    }
}
