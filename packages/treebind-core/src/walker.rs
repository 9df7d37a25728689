use crate::doc::SharedDoc;
use crate::ids::ItemId;

/// Follows `right` links from `item` (inclusive) to the first item that is not deleted.
///
/// Returns `None` once the chain is exhausted. The walk is bounded by the arena size, so a
/// corrupted chain ends the walk instead of looping.
pub fn first_live(doc: &SharedDoc, item: Option<ItemId>) -> Option<ItemId> {
    let mut current = item;
    for _ in 0..=doc.item_count() {
        let id = current?;
        if !doc.contains(id) {
            return None;
        }
        if !doc.is_deleted(id) {
            return Some(id);
        }
        current = doc.right(id);
    }
    None
}

/// Iterator over the live items of a linked chain.
pub struct LiveItems<'a> {
    doc: &'a SharedDoc,
    next: Option<ItemId>,
    remaining: usize,
}

impl<'a> LiveItems<'a> {
    pub fn new(doc: &'a SharedDoc, start: Option<ItemId>) -> Self {
        Self {
            doc,
            next: start,
            remaining: doc.item_count(),
        }
    }
}

impl Iterator for LiveItems<'_> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let found = first_live(self.doc, self.next)?;
        self.next = self.doc.right(found);
        Some(found)
    }
}
