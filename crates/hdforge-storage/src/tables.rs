//! In-memory table set. The whole set is what gets serialized to disk.

use hdforge_types::rows::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rows keyed by an auto-incremented id. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table<R> {
    last_id: RowId,
    rows: BTreeMap<RowId, R>,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            last_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<R: Clone> Table<R> {
    /// Assign the next id, build the row with it and store it.
    pub(crate) fn insert_with(&mut self, build: impl FnOnce(RowId) -> R) -> R {
        self.last_id += 1;
        let row = build(self.last_id);
        self.rows.insert(self.last_id, row.clone());
        row
    }

    pub fn get(&self, id: RowId) -> Option<&R> {
        self.rows.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RowId) -> Option<&mut R> {
        self.rows.get_mut(&id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Rows in id order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Every table of a wallet database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub conceptual_wallets: Table<ConceptualWalletRow>,
    pub keys: Table<KeyRow>,
    pub key_derivations: Table<KeyDerivationRow>,
    pub wrappers: Table<WrapperRow>,
    pub public_derivers: Table<PublicDeriverRow>,
    pub chain_meta: Table<ChainMetaRow>,
    pub addresses: Table<AddressRow>,
}

impl Tables {
    pub fn counts(&self) -> TableCounts {
        TableCounts {
            conceptual_wallets: self.conceptual_wallets.len(),
            keys: self.keys.len(),
            key_derivations: self.key_derivations.len(),
            wrappers: self.wrappers.len(),
            public_derivers: self.public_derivers.len(),
            chain_meta: self.chain_meta.len(),
            addresses: self.addresses.len(),
        }
    }
}

/// Row count per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub conceptual_wallets: usize,
    pub keys: usize,
    pub key_derivations: usize,
    pub wrappers: usize,
    pub public_derivers: usize,
    pub chain_meta: usize,
    pub addresses: usize,
}

impl TableCounts {
    pub fn total(&self) -> usize {
        self.conceptual_wallets
            + self.keys
            + self.key_derivations
            + self.wrappers
            + self.public_derivers
            + self.chain_meta
            + self.addresses
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(id: RowId) -> ConceptualWalletRow {
        ConceptualWalletRow {
            conceptual_wallet_id: id,
            coin_type: 1,
            name: format!("w{}", id),
        }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut table = Table::default();
        let a = table.insert_with(wallet);
        let b = table.insert_with(wallet);
        assert_eq!(a.conceptual_wallet_id, 1);
        assert_eq!(b.conceptual_wallet_id, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(2), Some(&b));
    }

    #[test]
    fn test_table_serde_keeps_counter() {
        let mut table = Table::default();
        table.insert_with(wallet);
        table.insert_with(wallet);

        let json = serde_json::to_string(&table).unwrap();
        let mut back: Table<ConceptualWalletRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.insert_with(wallet).conceptual_wallet_id, 3);
    }

    #[test]
    fn test_counts() {
        let mut tables = Tables::default();
        assert!(tables.counts().is_empty());
        tables.conceptual_wallets.insert_with(wallet);
        assert_eq!(tables.counts().conceptual_wallets, 1);
        assert_eq!(tables.counts().total(), 1);
    }
}
