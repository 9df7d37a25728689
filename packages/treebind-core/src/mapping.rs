use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::{DomId, ItemId};

/// Two-way association between external nodes and shared items.
///
/// Keys are handles, so the mapping never owns either side. Both maps are kept exact inverses of
/// each other after every call.
#[derive(Clone, Debug, Default)]
pub struct Mapping {
    dom_to_shared: HashMap<DomId, ItemId>,
    shared_to_dom: HashMap<ItemId, DomId>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self, node: DomId) -> Option<ItemId> {
        self.dom_to_shared.get(&node).copied()
    }

    pub fn dom(&self, item: ItemId) -> Option<DomId> {
        self.shared_to_dom.get(&item).copied()
    }

    pub fn len(&self) -> usize {
        self.dom_to_shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dom_to_shared.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DomId, ItemId)> + '_ {
        self.dom_to_shared.iter().map(|(d, s)| (*d, *s))
    }

    pub fn clear(&mut self) {
        self.dom_to_shared.clear();
        self.shared_to_dom.clear();
    }

    /// Records `node <-> item`. Last write wins: earlier partners of either side are dropped.
    pub fn associate(&mut self, node: DomId, item: ItemId) {
        if let Some(previous) = self.dom_to_shared.insert(node, item) {
            if previous != item {
                self.shared_to_dom.remove(&previous);
            }
        }
        if let Some(previous) = self.shared_to_dom.insert(item, node) {
            if previous != node {
                self.dom_to_shared.remove(&previous);
            }
        }
    }

    /// Removes `node <-> item` when exactly that pair is associated; otherwise does nothing.
    pub fn disassociate(&mut self, node: DomId, item: ItemId) -> bool {
        if self.shared(node) != Some(item) || self.dom(item) != Some(node) {
            return false;
        }
        self.dom_to_shared.remove(&node);
        self.shared_to_dom.remove(&item);
        true
    }

    /// Moves the shared item associated with `old` over to `new`, keeping the item itself.
    ///
    /// Returns the moved item, or `None` when `old` had no association.
    pub fn redirect(&mut self, old: DomId, new: DomId) -> Option<ItemId> {
        let item = self.shared(old)?;
        self.disassociate(old, item);
        self.associate(new, item);
        debug!(%old, %new, %item, "redirected association");
        Some(item)
    }

    /// Checks the two maps are inverses of each other. Intended for tests and debugging.
    pub fn validate_invariants(&self) -> Result<()> {
        if self.dom_to_shared.len() != self.shared_to_dom.len() {
            return Err(Error::InconsistentState(format!(
                "mapping sizes differ: {} dom entries, {} shared entries",
                self.dom_to_shared.len(),
                self.shared_to_dom.len()
            )));
        }
        for (node, item) in &self.dom_to_shared {
            if self.shared_to_dom.get(item) != Some(node) {
                return Err(Error::InconsistentState(format!(
                    "{node} maps to {item} but {item} does not map back"
                )));
            }
        }
        Ok(())
    }
}
