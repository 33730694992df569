//! Single-writer unit of work.
//!
//! A [`Transaction`] owns a private copy of every table. Inserts assign ids on
//! that copy; nothing is visible to readers until [`Transaction::commit`] has
//! written the new state to disk and swapped it in. Dropping an uncommitted
//! transaction discards the copy.

use crate::error::StorageError;
use crate::tables::Tables;
use hdforge_types::rows::*;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

pub struct Transaction {
    _writer: OwnedMutexGuard<()>,
    working: Tables,
    committed: Arc<RwLock<Tables>>,
    file: Option<PathBuf>,
    inserts: usize,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("file", &self.file)
            .field("inserts", &self.inserts)
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(
        writer: OwnedMutexGuard<()>,
        committed: Arc<RwLock<Tables>>,
        file: Option<PathBuf>,
    ) -> Self {
        let working = committed.read().clone();
        Self {
            _writer: writer,
            working,
            committed,
            file,
            inserts: 0,
        }
    }

    /// State as seen from inside the transaction, including uncommitted rows.
    pub fn tables(&self) -> &Tables {
        &self.working
    }

    /// Number of rows inserted so far.
    pub fn inserts(&self) -> usize {
        self.inserts
    }

    pub fn insert_conceptual_wallet(
        &mut self,
        insert: ConceptualWalletInsert,
    ) -> Result<ConceptualWalletRow, StorageError> {
        self.inserts += 1;
        Ok(self
            .working
            .conceptual_wallets
            .insert_with(|id| ConceptualWalletRow {
                conceptual_wallet_id: id,
                coin_type: insert.coin_type,
                name: insert.name,
            }))
    }

    pub fn insert_key(&mut self, insert: KeyInsert) -> Result<KeyRow, StorageError> {
        self.inserts += 1;
        Ok(self.working.keys.insert_with(|id| KeyRow {
            key_id: id,
            hash: insert.hash,
            is_encrypted: insert.is_encrypted,
            password_last_update: insert.password_last_update,
        }))
    }

    pub fn insert_key_derivation(
        &mut self,
        insert: KeyDerivationInsert,
    ) -> Result<KeyDerivationRow, StorageError> {
        if insert.parent.is_some() != insert.index.is_some() {
            return Err(StorageError::ConstraintViolation(
                "key derivation parent and index must both be set or both be unset".to_string(),
            ));
        }
        if let Some(parent) = insert.parent {
            self.require_key_derivation(parent)?;
            let taken = self.working.key_derivations.iter().any(|row| {
                row.parent == Some(parent) && row.index == insert.index
            });
            if taken {
                return Err(StorageError::ConstraintViolation(format!(
                    "node {} already has a child at index {:?}",
                    parent, insert.index
                )));
            }
        }
        for key_id in [insert.private_key_id, insert.public_key_id].into_iter().flatten() {
            if !self.working.keys.contains(key_id) {
                return Err(StorageError::NotFound {
                    table: "keys",
                    id: key_id,
                });
            }
        }

        self.inserts += 1;
        Ok(self.working.key_derivations.insert_with(|id| KeyDerivationRow {
            key_derivation_id: id,
            private_key_id: insert.private_key_id,
            public_key_id: insert.public_key_id,
            parent: insert.parent,
            index: insert.index,
        }))
    }

    pub fn insert_wrapper(&mut self, insert: WrapperInsert) -> Result<WrapperRow, StorageError> {
        self.require_conceptual_wallet(insert.conceptual_wallet_id)?;
        if let Some((key_derivation_id, _)) = insert.private_deriver()? {
            self.require_key_derivation(key_derivation_id)?;
        }
        let exists = self
            .working
            .wrappers
            .iter()
            .any(|row| row.conceptual_wallet_id == insert.conceptual_wallet_id);
        if exists {
            return Err(StorageError::ConstraintViolation(format!(
                "conceptual wallet {} already has a wrapper",
                insert.conceptual_wallet_id
            )));
        }

        self.inserts += 1;
        Ok(self.working.wrappers.insert_with(|id| WrapperRow {
            wrapper_id: id,
            conceptual_wallet_id: insert.conceptual_wallet_id,
            signer_level: insert.signer_level,
            public_deriver_level: insert.public_deriver_level,
            private_deriver_level: insert.private_deriver_level,
            private_deriver_key_derivation_id: insert.private_deriver_key_derivation_id,
        }))
    }

    pub fn insert_public_deriver(
        &mut self,
        insert: PublicDeriverInsert,
    ) -> Result<PublicDeriverRow, StorageError> {
        self.require_conceptual_wallet(insert.conceptual_wallet_id)?;
        self.require_key_derivation(insert.key_derivation_id)?;

        self.inserts += 1;
        Ok(self.working.public_derivers.insert_with(|id| PublicDeriverRow {
            public_deriver_id: id,
            conceptual_wallet_id: insert.conceptual_wallet_id,
            key_derivation_id: insert.key_derivation_id,
            name: insert.name,
        }))
    }

    pub fn insert_chain_meta(
        &mut self,
        insert: ChainMetaInsert,
    ) -> Result<ChainMetaRow, StorageError> {
        self.require_key_derivation(insert.key_derivation_id)?;
        let exists = self
            .working
            .chain_meta
            .iter()
            .any(|row| row.key_derivation_id == insert.key_derivation_id);
        if exists {
            return Err(StorageError::ConstraintViolation(format!(
                "node {} already has chain metadata",
                insert.key_derivation_id
            )));
        }

        self.inserts += 1;
        Ok(self.working.chain_meta.insert_with(|id| ChainMetaRow {
            chain_meta_id: id,
            key_derivation_id: insert.key_derivation_id,
            display_cutoff: insert.display_cutoff,
        }))
    }

    pub fn insert_address(&mut self, insert: AddressInsert) -> Result<AddressRow, StorageError> {
        self.require_key_derivation(insert.key_derivation_id)?;

        self.inserts += 1;
        Ok(self.working.addresses.insert_with(|id| AddressRow {
            address_id: id,
            key_derivation_id: insert.key_derivation_id,
            hash: insert.hash,
            digest: insert.digest,
        }))
    }

    /// Move the display cutoff of a chain node.
    pub fn update_display_cutoff(
        &mut self,
        chain_key_derivation_id: RowId,
        display_cutoff: Option<u32>,
    ) -> Result<ChainMetaRow, StorageError> {
        let meta_id = self
            .working
            .chain_meta
            .iter()
            .find(|row| row.key_derivation_id == chain_key_derivation_id)
            .map(|row| row.chain_meta_id);
        let row = meta_id
            .and_then(|id| self.working.chain_meta.get_mut(id))
            .ok_or(StorageError::NotFound {
                table: "chain_meta",
                id: chain_key_derivation_id,
            })?;
        row.display_cutoff = display_cutoff;
        Ok(row.clone())
    }

    pub fn get_key(&self, id: RowId) -> Result<&KeyRow, StorageError> {
        self.working
            .keys
            .get(id)
            .ok_or(StorageError::NotFound { table: "keys", id })
    }

    pub fn get_key_derivation(&self, id: RowId) -> Result<&KeyDerivationRow, StorageError> {
        self.working
            .key_derivations
            .get(id)
            .ok_or(StorageError::NotFound {
                table: "key_derivations",
                id,
            })
    }

    fn require_key_derivation(&self, id: RowId) -> Result<(), StorageError> {
        self.get_key_derivation(id).map(|_| ())
    }

    fn require_conceptual_wallet(&self, id: RowId) -> Result<(), StorageError> {
        if self.working.conceptual_wallets.contains(id) {
            Ok(())
        } else {
            Err(StorageError::NotFound {
                table: "conceptual_wallets",
                id,
            })
        }
    }

    /// Persist and publish every insert of this transaction.
    ///
    /// The file is replaced with write-to-temp + rename, and readers only see
    /// the new state once that has succeeded.
    pub async fn commit(self) -> Result<(), StorageError> {
        if let Some(file) = &self.file {
            let json = serde_json::to_vec_pretty(&self.working)?;
            let tmp = file.with_extension("json.tmp");
            tokio::fs::write(&tmp, json).await?;
            tokio::fs::rename(&tmp, file).await?;
        }

        let inserts = self.inserts;
        *self.committed.write() = self.working;
        tracing::debug!("Committed transaction with {} inserts", inserts);
        Ok(())
    }

    /// Discard every insert. Equivalent to dropping the transaction.
    pub fn rollback(self) {
        tracing::debug!("Rolled back transaction with {} inserts", self.inserts);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, StorageError};
    use hdforge_types::rows::*;

    fn root_node() -> KeyDerivationInsert {
        KeyDerivationInsert {
            private_key_id: None,
            public_key_id: None,
            parent: None,
            index: None,
        }
    }

    #[tokio::test]
    async fn test_key_derivation_requires_existing_parent_and_keys() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;

        let orphan = KeyDerivationInsert {
            parent: Some(42),
            index: Some(0),
            ..root_node()
        };
        assert!(matches!(
            tx.insert_key_derivation(orphan),
            Err(StorageError::NotFound { table: "key_derivations", id: 42 })
        ));

        let missing_key = KeyDerivationInsert {
            public_key_id: Some(7),
            ..root_node()
        };
        assert!(matches!(
            tx.insert_key_derivation(missing_key),
            Err(StorageError::NotFound { table: "keys", id: 7 })
        ));

        let half_linked = KeyDerivationInsert {
            index: Some(3),
            ..root_node()
        };
        assert!(matches!(
            tx.insert_key_derivation(half_linked),
            Err(StorageError::ConstraintViolation(_))
        ));
        assert_eq!(tx.inserts(), 0);
    }

    #[tokio::test]
    async fn test_sibling_index_is_unique() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let root = tx.insert_key_derivation(root_node()).unwrap();
        let child = KeyDerivationInsert {
            parent: Some(root.key_derivation_id),
            index: Some(0),
            ..root_node()
        };
        tx.insert_key_derivation(child.clone()).unwrap();
        assert!(matches!(
            tx.insert_key_derivation(child),
            Err(StorageError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_one_wrapper_per_wallet() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let wallet = tx
            .insert_conceptual_wallet(ConceptualWalletInsert {
                coin_type: 1815,
                name: "w".to_string(),
            })
            .unwrap();
        let root = tx.insert_key_derivation(root_node()).unwrap();
        let wrapper = WrapperInsert {
            conceptual_wallet_id: wallet.conceptual_wallet_id,
            signer_level: 0,
            public_deriver_level: 3,
            private_deriver_level: Some(0),
            private_deriver_key_derivation_id: Some(root.key_derivation_id),
        };
        tx.insert_wrapper(wrapper.clone()).unwrap();
        assert!(matches!(
            tx.insert_wrapper(wrapper),
            Err(StorageError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_wrapper_rejects_partial_private_deriver() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let wallet = tx
            .insert_conceptual_wallet(ConceptualWalletInsert {
                coin_type: 1815,
                name: "w".to_string(),
            })
            .unwrap();
        let wrapper = WrapperInsert {
            conceptual_wallet_id: wallet.conceptual_wallet_id,
            signer_level: 0,
            public_deriver_level: 3,
            private_deriver_level: Some(0),
            private_deriver_key_derivation_id: None,
        };
        assert!(matches!(
            tx.insert_wrapper(wrapper),
            Err(StorageError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_chain_meta_unique_per_node() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let node = tx.insert_key_derivation(root_node()).unwrap();
        let meta = ChainMetaInsert {
            key_derivation_id: node.key_derivation_id,
            display_cutoff: None,
        };
        tx.insert_chain_meta(meta.clone()).unwrap();
        assert!(tx.insert_chain_meta(meta).is_err());
    }

    #[tokio::test]
    async fn test_update_display_cutoff_in_transaction() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let node = tx.insert_key_derivation(root_node()).unwrap();
        tx.insert_chain_meta(ChainMetaInsert {
            key_derivation_id: node.key_derivation_id,
            display_cutoff: Some(0),
        })
        .unwrap();

        let row = tx
            .update_display_cutoff(node.key_derivation_id, Some(3))
            .unwrap();
        assert_eq!(row.display_cutoff, Some(3));
        let stored = tx
            .tables()
            .chain_meta
            .iter()
            .find(|meta| meta.key_derivation_id == node.key_derivation_id)
            .unwrap();
        assert_eq!(stored.display_cutoff, Some(3));

        let missing = tx.update_display_cutoff(node.key_derivation_id + 1, None);
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_rolled_back_ids_are_reassigned() {
        let db = Database::in_memory();
        let rolled_back = {
            let mut tx = db.begin().await;
            tx.insert_key_derivation(root_node()).unwrap()
        };
        let mut tx = db.begin().await;
        let kept = tx.insert_key_derivation(root_node()).unwrap();
        // The rolled-back insert never reached the committed counter.
        assert_eq!(rolled_back.key_derivation_id, kept.key_derivation_id);
        tx.commit().await.unwrap();
        assert_eq!(db.counts().key_derivations, 1);
    }
}
