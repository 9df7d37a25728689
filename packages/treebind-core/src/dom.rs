use crate::error::{Error, Result};
use crate::filter::Attributes;
use crate::ids::DomId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Node variants an external tree can hand out.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DomKind {
    Element,
    Text,
    Comment,
    ProcessingInstruction,
}

/// The external, history-free tree being mirrored.
///
/// Implementations own their nodes; this crate only holds [`DomId`] handles and never assumes two
/// handles with equal contents are the same node.
pub trait DomTree {
    fn kind(&self, node: DomId) -> Option<DomKind>;
    fn tag_name(&self, node: DomId) -> Option<&str>;
    /// Attributes in insertion order. Empty for non-elements.
    fn attributes(&self, node: DomId) -> Attributes;
    fn get_attribute(&self, node: DomId, name: &str) -> Option<&str>;
    fn set_attribute(&mut self, node: DomId, name: &str, value: &str) -> Result<()>;
    fn remove_attribute(&mut self, node: DomId, name: &str) -> Result<()>;
    /// Character data of text, comment and processing-instruction nodes.
    fn text(&self, node: DomId) -> Option<&str>;
    fn parent(&self, node: DomId) -> Option<DomId>;
    fn first_child(&self, node: DomId) -> Option<DomId>;
    fn next_sibling(&self, node: DomId) -> Option<DomId>;
    fn create_element(&mut self, tag: &str) -> DomId;
    fn create_text(&mut self, text: &str) -> DomId;
    /// Appends `child` as the last child of `parent`, detaching it from its old parent first.
    fn append_child(&mut self, parent: DomId, child: DomId) -> Result<()>;
    fn remove_child(&mut self, parent: DomId, child: DomId) -> Result<()>;

    fn children(&self, node: DomId) -> Vec<DomId> {
        let mut out = Vec::new();
        let mut cursor = self.first_child(node);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.next_sibling(child);
        }
        out
    }

    /// Concatenated text of every descendant text node, in document order.
    fn text_content(&self, node: DomId) -> String {
        match self.kind(node) {
            Some(DomKind::Text) => self.text(node).unwrap_or_default().to_string(),
            Some(DomKind::Element) => self
                .children(node)
                .into_iter()
                .map(|child| self.text_content(child))
                .collect(),
            _ => String::new(),
        }
    }
}

#[derive(Clone, Debug)]
enum NodeData {
    Element { tag: String, attributes: Attributes },
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Clone, Debug)]
struct DomNode {
    data: NodeData,
    parent: Option<DomId>,
    first_child: Option<DomId>,
    last_child: Option<DomId>,
    prev_sibling: Option<DomId>,
    next_sibling: Option<DomId>,
}

impl DomNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// Arena-backed external tree for tests, benches and headless hosts.
#[derive(Clone, Debug, Default)]
pub struct MemoryDom {
    nodes: Vec<DomNode>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_comment(&mut self, text: &str) -> DomId {
        self.alloc(NodeData::Comment(text.to_string()))
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> DomId {
        self.alloc(NodeData::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })
    }

    /// Builds `<tag attrs…>` in one call, handy for fixtures.
    pub fn element_with(&mut self, tag: &str, attributes: &[(&str, &str)]) -> DomId {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.alloc(NodeData::Element {
            tag: tag.to_string(),
            attributes,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts `child` before `reference` (or at the end when `reference` is `None`).
    pub fn insert_before(
        &mut self,
        parent: DomId,
        child: DomId,
        reference: Option<DomId>,
    ) -> Result<()> {
        match self.node(parent)?.data {
            NodeData::Element { .. } => {}
            _ => {
                return Err(Error::InvalidOperation(format!(
                    "{parent} cannot have children"
                )))
            }
        }
        self.node(child)?;
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) {
                return Err(Error::InvalidReference(format!(
                    "{reference} is not a child of {parent}"
                )));
            }
            if reference == child {
                return Ok(());
            }
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(Error::InvalidOperation(format!(
                "inserting {child} under {parent} would create a cycle"
            )));
        }

        self.detach(child);
        let prev = match reference {
            Some(r) => self.nodes[r.index()].prev_sibling,
            None => self.nodes[parent.index()].last_child,
        };
        {
            let node = &mut self.nodes[child.index()];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = Some(child),
            None => self.nodes[parent.index()].first_child = Some(child),
        }
        match reference {
            Some(r) => self.nodes[r.index()].prev_sibling = Some(child),
            None => self.nodes[parent.index()].last_child = Some(child),
        }
        Ok(())
    }

    fn alloc(&mut self, data: NodeData) -> DomId {
        let id = DomId(self.nodes.len() as u64);
        self.nodes.push(DomNode::new(data));
        id
    }

    fn node(&self, id: DomId) -> Result<&DomNode> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    fn node_mut(&mut self, id: DomId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    fn is_inclusive_ancestor(&self, ancestor: DomId, node: DomId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes.get(n.index()).and_then(|state| state.parent);
        }
        false
    }

    fn detach(&mut self, child: DomId) {
        let (parent, prev, next) = {
            let node = &self.nodes[child.index()];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        let Some(parent) = parent else {
            return;
        };
        match prev {
            Some(p) => self.nodes[p.index()].next_sibling = next,
            None => self.nodes[parent.index()].first_child = next,
        }
        match next {
            Some(n) => self.nodes[n.index()].prev_sibling = prev,
            None => self.nodes[parent.index()].last_child = prev,
        }
        let node = &mut self.nodes[child.index()];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }
}

impl DomTree for MemoryDom {
    fn kind(&self, node: DomId) -> Option<DomKind> {
        self.nodes.get(node.index()).map(|n| match n.data {
            NodeData::Element { .. } => DomKind::Element,
            NodeData::Text(_) => DomKind::Text,
            NodeData::Comment(_) => DomKind::Comment,
            NodeData::ProcessingInstruction { .. } => DomKind::ProcessingInstruction,
        })
    }

    fn tag_name(&self, node: DomId) -> Option<&str> {
        match &self.nodes.get(node.index())?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::ProcessingInstruction { target, .. } => Some(target),
            _ => None,
        }
    }

    fn attributes(&self, node: DomId) -> Attributes {
        match self.nodes.get(node.index()).map(|n| &n.data) {
            Some(NodeData::Element { attributes, .. }) => attributes.clone(),
            _ => Vec::new(),
        }
    }

    fn get_attribute(&self, node: DomId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.index())?.data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, node: DomId, name: &str, value: &str) -> Result<()> {
        match &mut self.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(k, _)| k == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!(
                "{node} is not an element"
            ))),
        }
    }

    fn remove_attribute(&mut self, node: DomId, name: &str) -> Result<()> {
        match &mut self.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                attributes.retain(|(k, _)| k != name);
                Ok(())
            }
            _ => Err(Error::InvalidOperation(format!(
                "{node} is not an element"
            ))),
        }
    }

    fn text(&self, node: DomId) -> Option<&str> {
        match &self.nodes.get(node.index())?.data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            NodeData::Element { .. } => None,
        }
    }

    fn parent(&self, node: DomId) -> Option<DomId> {
        self.nodes.get(node.index()).and_then(|n| n.parent)
    }

    fn first_child(&self, node: DomId) -> Option<DomId> {
        self.nodes.get(node.index()).and_then(|n| n.first_child)
    }

    fn next_sibling(&self, node: DomId) -> Option<DomId> {
        self.nodes.get(node.index()).and_then(|n| n.next_sibling)
    }

    fn create_element(&mut self, tag: &str) -> DomId {
        self.alloc(NodeData::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> DomId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    fn append_child(&mut self, parent: DomId, child: DomId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    fn remove_child(&mut self, parent: DomId, child: DomId) -> Result<()> {
        if self.node(child)?.parent != Some(parent) {
            return Err(Error::InvalidReference(format!(
                "{child} is not a child of {parent}"
            )));
        }
        self.detach(child);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_keeps_sibling_links() {
        let mut dom = MemoryDom::new();
        let parent = dom.create_element("ul");
        let a = dom.create_element("li");
        let b = dom.create_element("li");
        let c = dom.create_element("li");
        dom.append_child(parent, a).unwrap();
        dom.append_child(parent, c).unwrap();
        dom.insert_before(parent, b, Some(c)).unwrap();

        assert_eq!(dom.children(parent), vec![a, b, c]);
        assert_eq!(dom.parent(b), Some(parent));

        dom.remove_child(parent, b).unwrap();
        assert_eq!(dom.children(parent), vec![a, c]);
        assert_eq!(dom.parent(b), None);
        assert_eq!(dom.next_sibling(b), None);
    }

    #[test]
    fn append_moves_an_attached_node() {
        let mut dom = MemoryDom::new();
        let left = dom.create_element("div");
        let right = dom.create_element("div");
        let child = dom.create_text("hi");
        dom.append_child(left, child).unwrap();
        dom.append_child(right, child).unwrap();

        assert!(dom.children(left).is_empty());
        assert_eq!(dom.children(right), vec![child]);
    }

    #[test]
    fn rejects_cycles_and_text_parents() {
        let mut dom = MemoryDom::new();
        let outer = dom.create_element("div");
        let inner = dom.create_element("span");
        let text = dom.create_text("t");
        dom.append_child(outer, inner).unwrap();

        assert!(matches!(
            dom.append_child(inner, outer),
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            dom.append_child(text, inner),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn remove_child_requires_actual_parent() {
        let mut dom = MemoryDom::new();
        let parent = dom.create_element("div");
        let stranger = dom.create_element("p");
        assert!(matches!(
            dom.remove_child(parent, stranger),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let mut dom = MemoryDom::new();
        let el = dom.element_with("a", &[("href", "/x"), ("id", "link")]);
        dom.set_attribute(el, "class", "c").unwrap();
        dom.set_attribute(el, "href", "/y").unwrap();

        assert_eq!(
            dom.attributes(el),
            vec![
                ("href".to_string(), "/y".to_string()),
                ("id".to_string(), "link".to_string()),
                ("class".to_string(), "c".to_string()),
            ]
        );
        dom.remove_attribute(el, "id").unwrap();
        assert_eq!(dom.get_attribute(el, "id"), None);
    }

    #[test]
    fn text_content_walks_descendants() {
        let mut dom = MemoryDom::new();
        let p = dom.create_element("p");
        let em = dom.create_element("em");
        let a = dom.create_text("a");
        let b = dom.create_text("b");
        let note = dom.create_comment("skip");
        dom.append_child(p, a).unwrap();
        dom.append_child(p, em).unwrap();
        dom.append_child(em, b).unwrap();
        dom.append_child(p, note).unwrap();

        assert_eq!(dom.text_content(p), "ab");
    }
}
