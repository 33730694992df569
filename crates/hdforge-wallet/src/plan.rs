//! Insert plans: trees of pending rows below a derivation node.
//!
//! A plan is built without touching storage. Every node carries its child
//! index and a closure that, once the node has been persisted and given a
//! key-derivation id, writes the node's payload row. Nodes live in an arena and
//! refer to each other by position.

use crate::error::WalletError;
use crate::gap::GapAddresses;
use crate::hash_mapper::AddressAssociator;
use hdforge_storage::Transaction;
use hdforge_types::constants::{EXTERNAL, INTERNAL};
use hdforge_types::{AddressRow, ChainMetaInsert, ChainMetaRow, RowId};
use std::sync::Arc;

/// Payload row written for a planned node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelRow {
    Chain(ChainMetaRow),
    Address(AddressRow),
    /// Node with no payload of its own.
    Bare,
}

/// Closure invoked with the transaction and the node's assigned id.
pub type InsertFn =
    Box<dyn FnOnce(&mut Transaction, RowId) -> Result<LevelRow, WalletError> + Send>;

struct PlanNode {
    index: u32,
    insert: InsertFn,
    children: Vec<usize>,
}

/// A planned node ready to be persisted, in depth-first order.
pub struct PlannedInsert {
    /// Arena position of this node.
    pub position: usize,
    /// Arena position of the parent, `None` for a top-level node.
    pub parent: Option<usize>,
    pub index: u32,
    pub insert: InsertFn,
}

/// Ordered tree of pending inserts.
#[derive(Default)]
pub struct InsertPlan {
    nodes: Vec<PlanNode>,
    roots: Vec<usize>,
}

impl std::fmt::Debug for InsertPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertPlan")
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .finish()
    }
}

impl InsertPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child indices of the top-level nodes, in insertion order.
    pub fn root_indices(&self) -> Vec<u32> {
        self.roots.iter().map(|&pos| self.nodes[pos].index).collect()
    }

    /// Child indices below the node at `position`.
    pub fn child_indices(&self, position: usize) -> Option<Vec<u32>> {
        self.nodes
            .get(position)
            .map(|node| node.children.iter().map(|&pos| self.nodes[pos].index).collect())
    }

    /// Add a node directly below the plan's anchor. Returns its position.
    pub fn add_root(&mut self, index: u32, insert: InsertFn) -> usize {
        let position = self.push(index, insert);
        self.roots.push(position);
        position
    }

    /// Add a node below the node at `parent`. Returns its position.
    pub fn add_child(
        &mut self,
        parent: usize,
        index: u32,
        insert: InsertFn,
    ) -> Result<usize, WalletError> {
        if parent >= self.nodes.len() {
            return Err(WalletError::Precondition(format!(
                "plan has no node at position {}",
                parent
            )));
        }
        let position = self.push(index, insert);
        self.nodes[parent].children.push(position);
        Ok(position)
    }

    fn push(&mut self, index: u32, insert: InsertFn) -> usize {
        self.nodes.push(PlanNode {
            index,
            insert,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Consume the plan into depth-first order. A node always precedes its
    /// children, and siblings keep insertion order.
    pub fn into_depth_first(self) -> Vec<PlannedInsert> {
        let mut slots: Vec<Option<PlanNode>> = self.nodes.into_iter().map(Some).collect();
        let mut order = Vec::with_capacity(slots.len());
        let mut stack: Vec<(usize, Option<usize>)> =
            self.roots.iter().rev().map(|&pos| (pos, None)).collect();

        while let Some((position, parent)) = stack.pop() {
            let Some(node) = slots.get_mut(position).and_then(Option::take) else {
                continue;
            };
            stack.extend(node.children.iter().rev().map(|&child| (child, Some(position))));
            order.push(PlannedInsert {
                position,
                parent,
                index: node.index,
                insert: node.insert,
            });
        }
        order
    }
}

/// Plan for a fresh account: the external chain with its display cutoff at 0
/// and the internal chain with none, each holding the gap addresses in index
/// order.
pub fn account_default_derivations(
    gap: GapAddresses,
    associator: Arc<dyn AddressAssociator>,
) -> Result<InsertPlan, WalletError> {
    let mut plan = InsertPlan::new();

    for (chain, cutoff, hashes) in [
        (EXTERNAL, Some(0), gap.external),
        (INTERNAL, None, gap.internal),
    ] {
        let chain_pos = plan.add_root(chain, chain_insert(cutoff));
        for (index, hash) in hashes.into_iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| WalletError::Precondition("too many gap addresses".to_string()))?;
            plan.add_child(chain_pos, index, address_insert(Arc::clone(&associator), hash))?;
        }
    }

    Ok(plan)
}

fn chain_insert(display_cutoff: Option<u32>) -> InsertFn {
    Box::new(move |tx, key_derivation_id| {
        let row = tx.insert_chain_meta(ChainMetaInsert {
            key_derivation_id,
            display_cutoff,
        })?;
        Ok(LevelRow::Chain(row))
    })
}

fn address_insert(associator: Arc<dyn AddressAssociator>, hash: String) -> InsertFn {
    Box::new(move |tx, key_derivation_id| {
        associator
            .associate(tx, key_derivation_id, &hash)
            .map(LevelRow::Address)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_mapper::HashMapper;

    fn bare() -> InsertFn {
        Box::new(|_, _| Ok(LevelRow::Bare))
    }

    fn gap(n: usize) -> GapAddresses {
        GapAddresses {
            external: (0..n).map(|i| format!("e{}", i)).collect(),
            internal: (0..n).map(|i| format!("i{}", i)).collect(),
        }
    }

    #[test]
    fn test_depth_first_order() {
        let mut plan = InsertPlan::new();
        let a = plan.add_root(0, bare());
        let b = plan.add_root(1, bare());
        plan.add_child(a, 10, bare()).unwrap();
        let a1 = plan.add_child(a, 11, bare()).unwrap();
        plan.add_child(a1, 20, bare()).unwrap();
        plan.add_child(b, 12, bare()).unwrap();

        let order: Vec<_> = plan
            .into_depth_first()
            .into_iter()
            .map(|p| (p.index, p.parent))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, None),
                (10, Some(a)),
                (11, Some(a)),
                (20, Some(a1)),
                (1, None),
                (12, Some(b)),
            ]
        );
    }

    #[test]
    fn test_add_child_needs_parent() {
        let mut plan = InsertPlan::new();
        assert!(matches!(
            plan.add_child(0, 0, bare()),
            Err(WalletError::Precondition(_))
        ));
    }

    #[test]
    fn test_account_default_shape() {
        let plan = account_default_derivations(gap(20), Arc::new(HashMapper::new())).unwrap();
        assert_eq!(plan.len(), 42);
        assert_eq!(plan.root_indices(), vec![EXTERNAL, INTERNAL]);

        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(plan.child_indices(0), Some(expected.clone()));
        assert_eq!(plan.child_indices(21), Some(expected));
    }

    #[test]
    fn test_external_before_internal() {
        let plan = account_default_derivations(gap(2), Arc::new(HashMapper::new())).unwrap();
        let order: Vec<_> = plan
            .into_depth_first()
            .into_iter()
            .map(|p| (p.parent.is_none(), p.index))
            .collect();
        assert_eq!(
            order,
            vec![(true, 0), (false, 0), (false, 1), (true, 1), (false, 0), (false, 1)]
        );
    }
}
