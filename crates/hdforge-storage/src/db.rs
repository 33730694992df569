//! Wallet database - JSON file backed, single writer, many readers.

use crate::error::StorageError;
use crate::tables::{TableCounts, Tables};
use crate::transaction::Transaction;
use hdforge_types::rows::*;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// File name of the database inside its directory.
pub const DB_FILE: &str = "wallet_db.json";

/// Database handle. Cheap to clone; clones share state and the writer lock.
#[derive(Debug, Clone)]
pub struct Database {
    file: Option<PathBuf>,
    committed: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
}

impl Database {
    /// Database that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            committed: Arc::new(RwLock::new(Tables::default())),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Open (or create) the database stored in `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;

        let file = dir.join(DB_FILE);
        let tables = if file.exists() {
            let content = fs::read_to_string(&file)?;
            let tables: Tables = serde_json::from_str(&content)?;
            tracing::info!(
                "Opened wallet database at {} ({} rows)",
                file.display(),
                tables.counts().total()
            );
            tables
        } else {
            tracing::info!("Created wallet database at {}", file.display());
            Tables::default()
        };

        Ok(Self {
            file: Some(file),
            committed: Arc::new(RwLock::new(tables)),
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Start a write transaction. Waits until no other transaction is open.
    pub async fn begin(&self) -> Transaction {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        Transaction::new(guard, Arc::clone(&self.committed), self.file.clone())
    }

    /// Snapshot of the committed state.
    pub fn snapshot(&self) -> Tables {
        self.committed.read().clone()
    }

    pub fn counts(&self) -> TableCounts {
        self.committed.read().counts()
    }

    pub fn conceptual_wallets(&self) -> Vec<ConceptualWalletRow> {
        self.committed.read().conceptual_wallets.iter().cloned().collect()
    }

    pub fn wrapper_for_wallet(&self, conceptual_wallet_id: RowId) -> Option<WrapperRow> {
        self.committed
            .read()
            .wrappers
            .iter()
            .find(|row| row.conceptual_wallet_id == conceptual_wallet_id)
            .cloned()
    }

    pub fn public_derivers_for_wallet(&self, conceptual_wallet_id: RowId) -> Vec<PublicDeriverRow> {
        self.committed
            .read()
            .public_derivers
            .iter()
            .filter(|row| row.conceptual_wallet_id == conceptual_wallet_id)
            .cloned()
            .collect()
    }

    pub fn key(&self, key_id: RowId) -> Option<KeyRow> {
        self.committed.read().keys.get(key_id).cloned()
    }

    pub fn key_derivation(&self, key_derivation_id: RowId) -> Option<KeyDerivationRow> {
        self.committed
            .read()
            .key_derivations
            .get(key_derivation_id)
            .cloned()
    }

    /// Children of a node, ordered by derivation index.
    pub fn children_of(&self, key_derivation_id: RowId) -> Vec<KeyDerivationRow> {
        let mut children: Vec<_> = self
            .committed
            .read()
            .key_derivations
            .iter()
            .filter(|row| row.parent == Some(key_derivation_id))
            .cloned()
            .collect();
        children.sort_by_key(|row| row.index);
        children
    }

    /// Nodes from the root down to (and including) `key_derivation_id`.
    pub fn path_to(&self, key_derivation_id: RowId) -> Result<Vec<KeyDerivationRow>, StorageError> {
        let tables = self.committed.read();
        let mut path = Vec::new();
        let mut current = Some(key_derivation_id);
        while let Some(id) = current {
            let row = tables
                .key_derivations
                .get(id)
                .ok_or(StorageError::NotFound {
                    table: "key_derivations",
                    id,
                })?;
            // Parent links only point at rows inserted earlier, so this terminates.
            if path.len() > tables.key_derivations.len() {
                return Err(StorageError::ConstraintViolation(format!(
                    "cycle in derivation tree at node {}",
                    id
                )));
            }
            current = row.parent;
            path.push(row.clone());
        }
        path.reverse();
        Ok(path)
    }

    pub fn chain_meta(&self, chain_key_derivation_id: RowId) -> Option<ChainMetaRow> {
        self.committed
            .read()
            .chain_meta
            .iter()
            .find(|row| row.key_derivation_id == chain_key_derivation_id)
            .cloned()
    }

    /// Addresses under a chain node as `(index, row)`, ordered by index.
    pub fn addresses_for_chain(&self, chain_key_derivation_id: RowId) -> Vec<(u32, AddressRow)> {
        let tables = self.committed.read();
        let mut addresses: Vec<_> = tables
            .key_derivations
            .iter()
            .filter(|node| node.parent == Some(chain_key_derivation_id))
            .filter_map(|node| {
                let index = node.index?;
                tables
                    .addresses
                    .iter()
                    .find(|row| row.key_derivation_id == node.key_derivation_id)
                    .map(|row| (index, row.clone()))
            })
            .collect();
        addresses.sort_by_key(|(index, _)| *index);
        addresses
    }

    /// Move the display cutoff of a chain in its own transaction.
    pub async fn set_display_cutoff(
        &self,
        chain_key_derivation_id: RowId,
        display_cutoff: Option<u32>,
    ) -> Result<ChainMetaRow, StorageError> {
        let mut tx = self.begin().await;
        let row = tx.update_display_cutoff(chain_key_derivation_id, display_cutoff)?;
        tx.commit().await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seed_chain(db: &Database) -> (RowId, RowId) {
        let mut tx = db.begin().await;
        let root = tx
            .insert_key_derivation(KeyDerivationInsert {
                private_key_id: None,
                public_key_id: None,
                parent: None,
                index: None,
            })
            .unwrap();
        let chain = tx
            .insert_key_derivation(KeyDerivationInsert {
                private_key_id: None,
                public_key_id: None,
                parent: Some(root.key_derivation_id),
                index: Some(0),
            })
            .unwrap();
        tx.insert_chain_meta(ChainMetaInsert {
            key_derivation_id: chain.key_derivation_id,
            display_cutoff: Some(0),
        })
        .unwrap();
        for index in [2u32, 0, 1] {
            let node = tx
                .insert_key_derivation(KeyDerivationInsert {
                    private_key_id: None,
                    public_key_id: None,
                    parent: Some(chain.key_derivation_id),
                    index: Some(index),
                })
                .unwrap();
            tx.insert_address(AddressInsert {
                key_derivation_id: node.key_derivation_id,
                hash: format!("{:02x}", index),
                digest: index as u64,
            })
            .unwrap();
        }
        tx.commit().await.unwrap();
        (root.key_derivation_id, chain.key_derivation_id)
    }

    #[tokio::test]
    async fn test_commit_is_visible() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        tx.insert_conceptual_wallet(ConceptualWalletInsert {
            coin_type: 1815,
            name: "main".to_string(),
        })
        .unwrap();
        assert!(db.counts().is_empty());
        tx.commit().await.unwrap();
        assert_eq!(db.conceptual_wallets().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = Database::in_memory();
        {
            let mut tx = db.begin().await;
            tx.insert_conceptual_wallet(ConceptualWalletInsert {
                coin_type: 1815,
                name: "main".to_string(),
            })
            .unwrap();
        }
        assert!(db.counts().is_empty());

        // The writer lock was released by the drop.
        let tx = db.begin().await;
        tx.rollback();
    }

    #[tokio::test]
    async fn test_persistence_across_open() {
        let dir = TempDir::new().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            seed_chain(&db).await;
        }

        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.counts().addresses, 3);
        assert_eq!(db.counts().chain_meta, 1);

        // Id counters survive the reopen.
        let mut tx = db.begin().await;
        let row = tx
            .insert_key(KeyInsert {
                hash: "00".to_string(),
                is_encrypted: false,
                password_last_update: None,
            })
            .unwrap();
        assert_eq!(row.key_id, 1);
        let node = tx
            .insert_key_derivation(KeyDerivationInsert {
                private_key_id: None,
                public_key_id: Some(row.key_id),
                parent: None,
                index: None,
            })
            .unwrap();
        assert_eq!(node.key_derivation_id, 6);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DB_FILE), "{ not json").unwrap();
        assert!(matches!(
            Database::open(dir.path()),
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_tree_queries() {
        let db = Database::in_memory();
        let (root, chain) = seed_chain(&db).await;

        let children = db.children_of(chain);
        let indices: Vec<_> = children.iter().map(|row| row.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);

        let path = db.path_to(children[1].key_derivation_id).unwrap();
        let ids: Vec<_> = path.iter().map(|row| row.key_derivation_id).collect();
        assert_eq!(ids, vec![root, chain, children[1].key_derivation_id]);

        let addresses = db.addresses_for_chain(chain);
        let hashes: Vec<_> = addresses.iter().map(|(_, row)| row.hash.as_str()).collect();
        assert_eq!(hashes, vec!["00", "01", "02"]);
    }

    #[tokio::test]
    async fn test_set_display_cutoff() {
        let db = Database::in_memory();
        let (root, chain) = seed_chain(&db).await;

        let row = db.set_display_cutoff(chain, Some(5)).await.unwrap();
        assert_eq!(row.display_cutoff, Some(5));
        assert_eq!(db.chain_meta(chain).unwrap().display_cutoff, Some(5));

        assert!(matches!(
            db.set_display_cutoff(root, Some(1)).await,
            Err(StorageError::NotFound { table: "chain_meta", .. })
        ));
    }
}
