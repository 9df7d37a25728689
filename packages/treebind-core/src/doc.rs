use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::filter::Attributes;
use crate::ids::ItemId;
use crate::walker::LiveItems;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Variant of a shared node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SharedKind {
    Fragment,
    Element,
    Text,
    Hook,
}

#[derive(Clone, Debug)]
enum Content {
    Fragment,
    Element { tag: String, attributes: Attributes },
    Text(String),
    Hook {
        name: String,
        payload: BTreeMap<String, String>,
    },
}

#[derive(Clone, Debug)]
struct Item {
    content: Content,
    parent: Option<ItemId>,
    /// Next sibling in the parent's sequence, deleted or not.
    right: Option<ItemId>,
    /// First item of this container's child sequence.
    start: Option<ItemId>,
    deleted: bool,
}

impl Item {
    fn new(content: Content) -> Self {
        Self {
            content,
            parent: None,
            right: None,
            start: None,
            deleted: false,
        }
    }
}

/// Arena of shared items forming an XML-shaped tree.
///
/// Child sequences are singly linked through `right`. Deleting marks an item as a tombstone and
/// leaves it linked in place, so every traversal goes through [`crate::walker::first_live`].
#[derive(Clone, Debug)]
pub struct SharedDoc {
    items: Vec<Item>,
}

impl Default for SharedDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedDoc {
    pub fn new() -> Self {
        Self {
            items: vec![Item::new(Content::Fragment)],
        }
    }

    pub fn root(&self) -> ItemId {
        ItemId::ROOT
    }

    pub fn create_fragment(&mut self) -> ItemId {
        self.alloc(Content::Fragment)
    }

    pub fn create_element(&mut self, tag: &str) -> ItemId {
        self.alloc(Content::Element {
            tag: tag.to_string(),
            attributes: Attributes::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> ItemId {
        self.alloc(Content::Text(text.to_string()))
    }

    /// Creates an empty hook node; the hook's `fill_type` populates its payload.
    pub fn create_hook(&mut self, name: &str) -> ItemId {
        self.alloc(Content::Hook {
            name: name.to_string(),
            payload: BTreeMap::new(),
        })
    }

    pub fn contains(&self, item: ItemId) -> bool {
        item.index() < self.items.len()
    }

    /// Number of items in the arena, tombstones included.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn kind(&self, item: ItemId) -> Option<SharedKind> {
        self.items.get(item.index()).map(|i| match i.content {
            Content::Fragment => SharedKind::Fragment,
            Content::Element { .. } => SharedKind::Element,
            Content::Text(_) => SharedKind::Text,
            Content::Hook { .. } => SharedKind::Hook,
        })
    }

    pub fn parent(&self, item: ItemId) -> Option<ItemId> {
        self.items.get(item.index()).and_then(|i| i.parent)
    }

    /// Raw `next` link, ignoring tombstones.
    pub fn right(&self, item: ItemId) -> Option<ItemId> {
        self.items.get(item.index()).and_then(|i| i.right)
    }

    /// Raw first child link, ignoring tombstones.
    pub fn start(&self, item: ItemId) -> Option<ItemId> {
        self.items.get(item.index()).and_then(|i| i.start)
    }

    pub fn is_deleted(&self, item: ItemId) -> bool {
        self.items
            .get(item.index())
            .map(|i| i.deleted)
            .unwrap_or(false)
    }

    pub fn tag_name(&self, item: ItemId) -> Option<&str> {
        match &self.items.get(item.index())?.content {
            Content::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attributes(&self, item: ItemId) -> Option<&[(String, String)]> {
        match &self.items.get(item.index())?.content {
            Content::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn get_attribute(&self, item: ItemId, name: &str) -> Option<&str> {
        self.attributes(item)?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, keeping the position of an existing key.
    pub fn set_attribute(&mut self, item: ItemId, name: &str, value: &str) -> Result<()> {
        match &mut self.item_mut(item)?.content {
            Content::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(k, _)| k == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!(
                "{item} does not carry attributes"
            ))),
        }
    }

    pub fn remove_attribute(&mut self, item: ItemId, name: &str) -> Result<()> {
        match &mut self.item_mut(item)?.content {
            Content::Element { attributes, .. } => {
                attributes.retain(|(k, _)| k != name);
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!(
                "{item} does not carry attributes"
            ))),
        }
    }

    pub fn text(&self, item: ItemId) -> Option<&str> {
        match &self.items.get(item.index())?.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Inserts `text` at character offset `index`.
    pub fn insert_text(&mut self, item: ItemId, index: usize, text: &str) -> Result<()> {
        match &mut self.item_mut(item)?.content {
            Content::Text(current) => {
                let byte = match current.char_indices().nth(index) {
                    Some((byte, _)) => byte,
                    None if index == current.chars().count() => current.len(),
                    None => {
                        return Err(Error::InvalidOperation(format!(
                            "offset {index} is past the end of {item}"
                        )))
                    }
                };
                current.insert_str(byte, text);
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!("{item} is not a text node"))),
        }
    }

    pub fn hook_name(&self, item: ItemId) -> Option<&str> {
        match &self.items.get(item.index())?.content {
            Content::Hook { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn hook_payload(&self, item: ItemId) -> Option<&BTreeMap<String, String>> {
        match &self.items.get(item.index())?.content {
            Content::Hook { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn hook_payload_mut(&mut self, item: ItemId) -> Result<&mut BTreeMap<String, String>> {
        match &mut self.item_mut(item)?.content {
            Content::Hook { payload, .. } => Ok(payload),
            _ => Err(Error::InvalidOperation(format!("{item} is not a hook"))),
        }
    }

    /// Live children of a container, in sequence order.
    pub fn children(&self, parent: ItemId) -> LiveItems<'_> {
        LiveItems::new(self, self.start(parent))
    }

    /// Number of live children.
    pub fn len(&self, parent: ItemId) -> usize {
        self.children(parent).count()
    }

    pub fn is_live_child(&self, parent: ItemId, child: ItemId) -> bool {
        self.items
            .get(child.index())
            .map(|i| i.parent == Some(parent) && !i.deleted)
            .unwrap_or(false)
    }

    /// Splices `items` into `parent`'s sequence directly after `reference`, or at the head when
    /// `reference` is `None`.
    ///
    /// `reference` must be a live child of `parent`. Inserted items must be detached prelim items
    /// (freshly created, never inserted, not deleted).
    pub fn insert_after(
        &mut self,
        parent: ItemId,
        reference: Option<ItemId>,
        items: &[ItemId],
    ) -> Result<()> {
        self.ensure_container(parent)?;
        if let Some(reference) = reference {
            if !self.is_live_child(parent, reference) {
                return Err(Error::InvalidReference(format!(
                    "{reference} is not a live child of {parent}"
                )));
            }
        }
        self.ensure_insertable(parent, items)?;
        let Some((&first, _)) = items.split_first() else {
            return Ok(());
        };

        let next = match reference {
            Some(r) => self.items[r.index()].right,
            None => self.items[parent.index()].start,
        };
        for pair in items.windows(2) {
            let item = &mut self.items[pair[0].index()];
            item.parent = Some(parent);
            item.right = Some(pair[1]);
        }
        if let Some(&last) = items.last() {
            let item = &mut self.items[last.index()];
            item.parent = Some(parent);
            item.right = next;
        }
        match reference {
            Some(r) => self.items[r.index()].right = Some(first),
            None => self.items[parent.index()].start = Some(first),
        }
        Ok(())
    }

    /// Inserts `items` before the live child currently at `index`.
    pub fn insert(&mut self, parent: ItemId, index: usize, items: &[ItemId]) -> Result<()> {
        let reference = if index == 0 {
            None
        } else {
            Some(self.children(parent).nth(index - 1).ok_or_else(|| {
                Error::InvalidReference(format!("index {index} is past the end of {parent}"))
            })?)
        };
        self.insert_after(parent, reference, items)
    }

    /// Appends `items` after the last live child.
    pub fn push(&mut self, parent: ItemId, items: &[ItemId]) -> Result<()> {
        let reference = self.children(parent).last();
        self.insert_after(parent, reference, items)
    }

    /// Marks an item as a tombstone. It stays linked so concurrent edits can still anchor on it.
    pub fn delete(&mut self, item: ItemId) -> Result<()> {
        if item == ItemId::ROOT {
            return Err(Error::InvalidOperation("the root fragment cannot be deleted".into()));
        }
        self.item_mut(item)?.deleted = true;
        Ok(())
    }

    /// Tombstones a prelim item that never reached the root, along with its subtree.
    ///
    /// Returns `false` (and does nothing) for unknown items or items attached under the root.
    pub fn discard(&mut self, item: ItemId) -> bool {
        if !self.contains(item) || self.top(item) == ItemId::ROOT {
            return false;
        }
        let mut stack = vec![item];
        while let Some(id) = stack.pop() {
            let state = &mut self.items[id.index()];
            state.deleted = true;
            let mut child = state.start;
            while let Some(c) = child {
                stack.push(c);
                child = self.items[c.index()].right;
            }
        }
        true
    }

    /// Index of `child` among the live children of its parent.
    pub fn position(&self, child: ItemId) -> Option<usize> {
        let parent = self.parent(child)?;
        self.children(parent).position(|c| c == child)
    }

    /// Renders the live subtree rooted at `item` as markup.
    pub fn to_xml_string(&self, item: ItemId) -> Result<String> {
        let mut out = String::new();
        self.render(item, &mut out)?;
        Ok(out)
    }

    /// Checks that every linked child points back at its container, that no item is linked twice,
    /// and that every item claiming a parent is reachable from it. Intended for tests and debugging.
    pub fn validate_invariants(&self) -> Result<()> {
        let mut linked = HashSet::new();
        for (idx, container) in self.items.iter().enumerate() {
            let parent = ItemId(idx as u64);
            let mut cursor = container.start;
            while let Some(child) = cursor {
                let state = self.items.get(child.index()).ok_or_else(|| {
                    Error::InconsistentState(format!("{parent} links unknown {child}"))
                })?;
                if state.parent != Some(parent) {
                    return Err(Error::InconsistentState(format!(
                        "{child} is linked under {parent} but points at {:?}",
                        state.parent
                    )));
                }
                if !linked.insert(child) {
                    return Err(Error::InconsistentState(format!(
                        "{child} is linked more than once"
                    )));
                }
                cursor = state.right;
            }
        }
        for (idx, item) in self.items.iter().enumerate() {
            let id = ItemId(idx as u64);
            if item.parent.is_some() && !linked.contains(&id) {
                return Err(Error::InconsistentState(format!(
                    "{id} claims a parent but is not linked"
                )));
            }
        }
        Ok(())
    }

    fn alloc(&mut self, content: Content) -> ItemId {
        let id = ItemId(self.items.len() as u64);
        self.items.push(Item::new(content));
        id
    }

    fn item_mut(&mut self, item: ItemId) -> Result<&mut Item> {
        self.items
            .get_mut(item.index())
            .ok_or_else(|| Error::UnknownNode(item.to_string()))
    }

    fn top(&self, item: ItemId) -> ItemId {
        let mut current = item;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    fn ensure_container(&self, parent: ItemId) -> Result<()> {
        match self.kind(parent) {
            Some(SharedKind::Fragment | SharedKind::Element) => Ok(()),
            Some(_) => Err(Error::InvalidOperation(format!(
                "{parent} cannot have children"
            ))),
            None => Err(Error::UnknownNode(parent.to_string())),
        }
    }

    fn ensure_insertable(&self, parent: ItemId, items: &[ItemId]) -> Result<()> {
        let mut seen = HashSet::new();
        for &item in items {
            let state = self
                .items
                .get(item.index())
                .ok_or_else(|| Error::UnknownNode(item.to_string()))?;
            if item == ItemId::ROOT || state.parent.is_some() || state.deleted {
                return Err(Error::InvalidOperation(format!(
                    "{item} is already integrated"
                )));
            }
            if !seen.insert(item) {
                return Err(Error::InvalidOperation(format!(
                    "{item} appears twice in one insertion"
                )));
            }
            if self.top(parent) == item {
                return Err(Error::InvalidOperation(format!(
                    "inserting {item} under {parent} would create a cycle"
                )));
            }
        }
        Ok(())
    }

    fn render(&self, item: ItemId, out: &mut String) -> Result<()> {
        let state = self
            .items
            .get(item.index())
            .ok_or_else(|| Error::UnknownNode(item.to_string()))?;
        if state.deleted {
            return Ok(());
        }
        match &state.content {
            Content::Fragment => {
                for child in self.children(item) {
                    self.render(child, out)?;
                }
            }
            Content::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, out);
                    out.push('"');
                }
                out.push('>');
                for child in self.children(item) {
                    self.render(child, out)?;
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Content::Text(text) => escape_into(text, out),
            Content::Hook { name, .. } => {
                out.push_str("<hook name=\"");
                escape_into(name, out);
                out.push_str("\"/>");
            }
        }
        Ok(())
    }
}

fn escape_into(raw: &str, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Serializable snapshot of a live shared subtree.
#[cfg(feature = "serde")]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SharedNodeExport {
    Fragment {
        children: Vec<SharedNodeExport>,
    },
    Element {
        tag: String,
        attributes: Attributes,
        children: Vec<SharedNodeExport>,
    },
    Text {
        text: String,
    },
    Hook {
        name: String,
        payload: BTreeMap<String, String>,
    },
}

#[cfg(feature = "serde")]
impl SharedDoc {
    /// Snapshot of the live subtree at `item`; `None` for unknown or deleted items.
    pub fn export(&self, item: ItemId) -> Option<SharedNodeExport> {
        let state = self.items.get(item.index())?;
        if state.deleted {
            return None;
        }
        let children = || -> Vec<SharedNodeExport> {
            self.children(item)
                .filter_map(|child| self.export(child))
                .collect()
        };
        Some(match &state.content {
            Content::Fragment => SharedNodeExport::Fragment {
                children: children(),
            },
            Content::Element { tag, attributes } => SharedNodeExport::Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: children(),
            },
            Content::Text(text) => SharedNodeExport::Text { text: text.clone() },
            Content::Hook { name, payload } => SharedNodeExport::Hook {
                name: name.clone(),
                payload: payload.clone(),
            },
        })
    }
}
