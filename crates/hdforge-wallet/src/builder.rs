//! Staged, transactional wallet builder.
//!
//! Each `add_*` call records a configuration function and moves the builder to
//! the next stage type. Nothing is touched until [`WalletBuilder::commit`],
//! which opens one transaction, runs the stages in order (each configuration
//! function sees the rows written by the stages before it) and commits. Any
//! error drops the transaction, leaving the database untouched.

use crate::error::WalletError;
use crate::plan::{InsertPlan, LevelRow};
use hdforge_crypto::{decrypt_root_key, Crypto, CryptoError, ExtendedKey};
use hdforge_storage::{Database, Transaction};
use hdforge_types::constants::is_hardened;
use hdforge_types::{
    ConceptualWalletInsert, ConceptualWalletRow, KeyDerivationInsert, KeyDerivationRow, KeyInsert,
    KeyRow, PublicDeriverInsert, PublicDeriverRow, RowId, WrapperInsert, WrapperRow,
};
use std::collections::HashMap;
use std::future::Future;
use zeroize::Zeroizing;

/// A key-derivation node written from a plan, with its payload row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedNode {
    pub key_derivation: KeyDerivationRow,
    pub row: LevelRow,
}

/// Root key material and the shape of the tree below the root.
#[derive(Debug)]
pub struct RootRequest {
    pub private_key: Option<KeyInsert>,
    pub public_key: Option<KeyInsert>,
    /// Nodes to create directly under the root. Empty for a standard wallet.
    pub tree: InsertPlan,
}

/// Everything needed to derive and persist a public deriver.
pub struct DeriverRequest {
    /// Password of the private deriver's encrypted key.
    pub password: Zeroizing<String>,
    /// Display name of the account.
    pub name: String,
    /// Indices from the private deriver down to the public deriver.
    pub path: Vec<u32>,
    /// Nodes to create under the public deriver.
    pub initial_derivations: InsertPlan,
}

impl std::fmt::Debug for DeriverRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeriverRequest")
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("initial_derivations", &self.initial_derivations)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootHandle {
    pub key_derivation: KeyDerivationRow,
    pub private_key: Option<KeyRow>,
    pub public_key: Option<KeyRow>,
    pub tree: Vec<DerivedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicDeriverHandle {
    pub public_deriver: PublicDeriverRow,
    /// Nodes written for each path segment, ending at the public deriver.
    pub path: Vec<KeyDerivationRow>,
    pub public_key: KeyRow,
    pub derivations: Vec<DerivedNode>,
}

impl PublicDeriverHandle {
    pub fn key_derivation_id(&self) -> RowId {
        self.public_deriver.key_derivation_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasConceptualWallet {
    pub conceptual_wallet: ConceptualWalletRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasRoot {
    pub conceptual_wallet: ConceptualWalletRow,
    pub root: RootHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasWrapper {
    pub conceptual_wallet: ConceptualWalletRow,
    pub root: RootHandle,
    pub wrapper: WrapperRow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasPublicDeriver {
    pub conceptual_wallet: ConceptualWalletRow,
    pub root: RootHandle,
    pub wrapper: WrapperRow,
    pub public_deriver: PublicDeriverHandle,
}

/// A builder stage: runs every stage before it, then its own.
pub trait Stage: Send {
    type State: Send;

    fn run(
        self,
        tx: &mut Transaction,
        crypto: &Crypto,
    ) -> impl Future<Output = Result<Self::State, WalletError>> + Send;
}

type Config<In, Out> = Box<dyn FnOnce(&In) -> Result<Out, WalletError> + Send>;

pub struct Start;

pub struct ConceptualWalletStage {
    config: Config<(), ConceptualWalletInsert>,
}

pub struct RootStage {
    prev: ConceptualWalletStage,
    config: Config<HasConceptualWallet, RootRequest>,
}

pub struct WrapperStage {
    prev: RootStage,
    config: Config<HasRoot, WrapperInsert>,
}

pub struct PublicDeriverStage {
    prev: WrapperStage,
    config: Config<HasWrapper, DeriverRequest>,
}

impl Stage for Start {
    type State = ();

    async fn run(self, _tx: &mut Transaction, _crypto: &Crypto) -> Result<(), WalletError> {
        Ok(())
    }
}

impl Stage for ConceptualWalletStage {
    type State = HasConceptualWallet;

    async fn run(
        self,
        tx: &mut Transaction,
        _crypto: &Crypto,
    ) -> Result<HasConceptualWallet, WalletError> {
        let insert = (self.config)(&())?;
        let conceptual_wallet = tx.insert_conceptual_wallet(insert)?;
        tracing::debug!(
            "Added conceptual wallet {}",
            conceptual_wallet.conceptual_wallet_id
        );
        Ok(HasConceptualWallet { conceptual_wallet })
    }
}

impl Stage for RootStage {
    type State = HasRoot;

    async fn run(self, tx: &mut Transaction, crypto: &Crypto) -> Result<HasRoot, WalletError> {
        let prev = self.prev.run(tx, crypto).await?;
        let request = (self.config)(&prev)?;

        let private_key = request
            .private_key
            .map(|key| tx.insert_key(key))
            .transpose()?;
        let public_key = request
            .public_key
            .map(|key| tx.insert_key(key))
            .transpose()?;
        let key_derivation = tx.insert_key_derivation(KeyDerivationInsert {
            private_key_id: private_key.as_ref().map(|key| key.key_id),
            public_key_id: public_key.as_ref().map(|key| key.key_id),
            parent: None,
            index: None,
        })?;
        let tree = persist_plan(tx, key_derivation.key_derivation_id, request.tree)?;
        tracing::debug!(
            "Added root node {} with {} children",
            key_derivation.key_derivation_id,
            tree.len()
        );

        Ok(HasRoot {
            conceptual_wallet: prev.conceptual_wallet,
            root: RootHandle {
                key_derivation,
                private_key,
                public_key,
                tree,
            },
        })
    }
}

impl Stage for WrapperStage {
    type State = HasWrapper;

    async fn run(self, tx: &mut Transaction, crypto: &Crypto) -> Result<HasWrapper, WalletError> {
        let prev = self.prev.run(tx, crypto).await?;
        let insert = (self.config)(&prev)?;
        let wrapper = tx.insert_wrapper(insert)?;
        tracing::debug!(
            "Added wrapper {} (signer level {}, public deriver level {})",
            wrapper.wrapper_id,
            wrapper.signer_level,
            wrapper.public_deriver_level
        );

        Ok(HasWrapper {
            conceptual_wallet: prev.conceptual_wallet,
            root: prev.root,
            wrapper,
        })
    }
}

impl Stage for PublicDeriverStage {
    type State = HasPublicDeriver;

    async fn run(
        self,
        tx: &mut Transaction,
        crypto: &Crypto,
    ) -> Result<HasPublicDeriver, WalletError> {
        let prev = self.prev.run(tx, crypto).await?;
        let request = (self.config)(&prev)?;

        let (deriver_id, deriver_level) = prev
            .wrapper
            .private_deriver()?
            .ok_or(WalletError::MissingPrivateDeriver)?;
        let expected_len = prev
            .wrapper
            .public_deriver_level
            .checked_sub(deriver_level)
            .ok_or_else(|| {
                WalletError::Precondition(format!(
                    "public deriver level {} is above private deriver level {}",
                    prev.wrapper.public_deriver_level, deriver_level
                ))
            })?;
        if request.path.len() != expected_len as usize {
            return Err(WalletError::Precondition(format!(
                "derivation path has {} segments, expected {}",
                request.path.len(),
                expected_len
            )));
        }
        if let Some(index) = request.path.iter().find(|&&index| !is_hardened(index)) {
            return Err(WalletError::Precondition(format!(
                "derivation path segment {} is not hardened",
                index
            )));
        }

        let private_key_id = tx
            .get_key_derivation(deriver_id)?
            .private_key_id
            .ok_or(WalletError::MissingPrivateDeriver)?;
        let stored = tx.get_key(private_key_id)?.clone();
        let mut key = unlock_private_deriver(crypto, &stored, request.password).await?;

        let deriver = crypto.deriver();
        let mut parent = deriver_id;
        let mut path = Vec::with_capacity(request.path.len());
        let (&last_index, intermediate) = request
            .path
            .split_last()
            .ok_or_else(|| WalletError::Precondition("empty derivation path".to_string()))?;
        for &index in intermediate {
            key = deriver.derive(&key, index)?;
            let node = tx.insert_key_derivation(KeyDerivationInsert {
                private_key_id: None,
                public_key_id: None,
                parent: Some(parent),
                index: Some(index),
            })?;
            parent = node.key_derivation_id;
            path.push(node);
        }

        let public = deriver.to_public(&deriver.derive(&key, last_index)?);
        let public_key = tx.insert_key(KeyInsert {
            hash: hex::encode(public.encode()),
            is_encrypted: false,
            password_last_update: None,
        })?;
        let node = tx.insert_key_derivation(KeyDerivationInsert {
            private_key_id: None,
            public_key_id: Some(public_key.key_id),
            parent: Some(parent),
            index: Some(last_index),
        })?;
        parent = node.key_derivation_id;
        path.push(node);

        let public_deriver = tx.insert_public_deriver(PublicDeriverInsert {
            conceptual_wallet_id: prev.conceptual_wallet.conceptual_wallet_id,
            key_derivation_id: parent,
            name: request.name,
        })?;
        let derivations = persist_plan(tx, parent, request.initial_derivations)?;
        tracing::debug!(
            "Derived public deriver {} at node {} with {} initial nodes",
            public_deriver.public_deriver_id,
            parent,
            derivations.len()
        );

        Ok(HasPublicDeriver {
            conceptual_wallet: prev.conceptual_wallet,
            root: prev.root,
            wrapper: prev.wrapper,
            public_deriver: PublicDeriverHandle {
                public_deriver,
                path,
                public_key,
                derivations,
            },
        })
    }
}

/// Recover the private deriver's key. Encrypted keys are decrypted on the
/// blocking pool.
async fn unlock_private_deriver(
    crypto: &Crypto,
    stored: &KeyRow,
    password: Zeroizing<String>,
) -> Result<ExtendedKey, WalletError> {
    if !stored.is_encrypted {
        let raw = Zeroizing::new(hex::decode(&stored.hash).map_err(CryptoError::from)?);
        return Ok(ExtendedKey::decode_private(&raw)?);
    }

    let cipher = crypto.cipher_handle();
    let hash = stored.hash.clone();
    let key = tokio::task::spawn_blocking(move || {
        decrypt_root_key(cipher.as_ref(), password.as_str(), &hash)
    })
    .await??;
    Ok(key)
}

/// Write every node of `plan` below `anchor`, depth-first.
fn persist_plan(
    tx: &mut Transaction,
    anchor: RowId,
    plan: InsertPlan,
) -> Result<Vec<DerivedNode>, WalletError> {
    let mut assigned: HashMap<usize, RowId> = HashMap::new();
    let mut written = Vec::with_capacity(plan.len());

    for planned in plan.into_depth_first() {
        let parent = match planned.parent {
            None => anchor,
            Some(position) => *assigned.get(&position).ok_or_else(|| {
                WalletError::Precondition(format!("plan parent {} was not written", position))
            })?,
        };
        let key_derivation = tx.insert_key_derivation(KeyDerivationInsert {
            private_key_id: None,
            public_key_id: None,
            parent: Some(parent),
            index: Some(planned.index),
        })?;
        assigned.insert(planned.position, key_derivation.key_derivation_id);
        let row = (planned.insert)(tx, key_derivation.key_derivation_id)?;
        written.push(DerivedNode {
            key_derivation,
            row,
        });
    }

    Ok(written)
}

/// Builder whose type records which stages have been configured.
pub struct WalletBuilder<S> {
    db: Database,
    crypto: Crypto,
    stage: S,
}

impl WalletBuilder<Start> {
    pub fn start(db: &Database, crypto: &Crypto) -> Self {
        Self {
            db: db.clone(),
            crypto: crypto.clone(),
            stage: Start,
        }
    }

    pub fn add_conceptual_wallet<F>(self, config: F) -> WalletBuilder<ConceptualWalletStage>
    where
        F: FnOnce(&()) -> Result<ConceptualWalletInsert, WalletError> + Send + 'static,
    {
        WalletBuilder {
            db: self.db,
            crypto: self.crypto,
            stage: ConceptualWalletStage {
                config: Box::new(config),
            },
        }
    }
}

impl WalletBuilder<ConceptualWalletStage> {
    pub fn add_root<F>(self, config: F) -> WalletBuilder<RootStage>
    where
        F: FnOnce(&HasConceptualWallet) -> Result<RootRequest, WalletError> + Send + 'static,
    {
        WalletBuilder {
            db: self.db,
            crypto: self.crypto,
            stage: RootStage {
                prev: self.stage,
                config: Box::new(config),
            },
        }
    }
}

impl WalletBuilder<RootStage> {
    pub fn add_wrapper<F>(self, config: F) -> WalletBuilder<WrapperStage>
    where
        F: FnOnce(&HasRoot) -> Result<WrapperInsert, WalletError> + Send + 'static,
    {
        WalletBuilder {
            db: self.db,
            crypto: self.crypto,
            stage: WrapperStage {
                prev: self.stage,
                config: Box::new(config),
            },
        }
    }
}

impl WalletBuilder<WrapperStage> {
    pub fn derive_public_deriver<F>(self, config: F) -> WalletBuilder<PublicDeriverStage>
    where
        F: FnOnce(&HasWrapper) -> Result<DeriverRequest, WalletError> + Send + 'static,
    {
        WalletBuilder {
            db: self.db,
            crypto: self.crypto,
            stage: PublicDeriverStage {
                prev: self.stage,
                config: Box::new(config),
            },
        }
    }
}

impl<S: Stage> WalletBuilder<S> {
    /// Run every configured stage in one transaction.
    pub async fn commit(self) -> Result<S::State, WalletError> {
        let mut tx = self.db.begin().await;
        match self.stage.run(&mut tx, &self.crypto).await {
            Ok(state) => {
                let inserts = tx.inserts();
                tx.commit().await?;
                tracing::info!("Committed wallet build ({} rows)", inserts);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!("Rolling back wallet build: {}", e);
                tx.rollback();
                Err(e)
            }
        }
    }
}
