//! Association of address hashes with derivation nodes.

use crate::error::WalletError;
use hdforge_storage::Transaction;
use hdforge_types::{AddressInsert, AddressRow, RowId};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Records an address hash for a freshly persisted address node.
pub trait AddressAssociator: Send + Sync {
    fn associate(
        &self,
        tx: &mut Transaction,
        key_derivation_id: RowId,
        hash: &str,
    ) -> Result<AddressRow, WalletError>;
}

/// Stable 64-bit digest of an address hash, used for lookups.
pub fn address_digest(hash: &str) -> u64 {
    let digest = blake3::hash(hash.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Associator that computes the digest of each distinct hash once per build.
///
/// Every node still gets its own row. A repeated hash is linked to the new
/// node with the digest of its first occurrence.
#[derive(Debug, Default)]
pub struct HashMapper {
    seen: Mutex<HashMap<String, AddressRow>>,
}

impl HashMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}

impl AddressAssociator for HashMapper {
    fn associate(
        &self,
        tx: &mut Transaction,
        key_derivation_id: RowId,
        hash: &str,
    ) -> Result<AddressRow, WalletError> {
        let mut seen = self.seen.lock();
        if let Some(first) = seen.get(hash) {
            tracing::debug!(
                "Address {} already mapped to row {}, linking node {}",
                hash,
                first.address_id,
                key_derivation_id
            );
            return Ok(tx.insert_address(AddressInsert {
                key_derivation_id,
                hash: first.hash.clone(),
                digest: first.digest,
            })?);
        }

        let row = tx.insert_address(AddressInsert {
            key_derivation_id,
            hash: hash.to_string(),
            digest: address_digest(hash),
        })?;
        seen.insert(hash.to_string(), row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdforge_storage::Database;
    use hdforge_types::KeyDerivationInsert;

    fn node(tx: &mut Transaction) -> RowId {
        tx.insert_key_derivation(KeyDerivationInsert {
            private_key_id: None,
            public_key_id: None,
            parent: None,
            index: None,
        })
        .unwrap()
        .key_derivation_id
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(address_digest("61aa"), address_digest("61aa"));
        assert_ne!(address_digest("61aa"), address_digest("61ab"));
    }

    #[tokio::test]
    async fn test_duplicate_hash_links_every_node() {
        let db = Database::in_memory();
        let mut tx = db.begin().await;
        let first = node(&mut tx);
        let second = node(&mut tx);

        let mapper = HashMapper::new();
        let a = mapper.associate(&mut tx, first, "61aa").unwrap();
        let b = mapper.associate(&mut tx, second, "61aa").unwrap();
        let c = mapper.associate(&mut tx, second, "61bb").unwrap();

        assert_eq!(a.key_derivation_id, first);
        assert_eq!(b.key_derivation_id, second);
        assert_ne!(a.address_id, b.address_id);
        assert_eq!((a.hash.as_str(), a.digest), (b.hash.as_str(), b.digest));
        assert_ne!(a.digest, c.digest);
        assert_eq!(mapper.len(), 2);
        assert_eq!(tx.tables().addresses.len(), 3);
    }
}
