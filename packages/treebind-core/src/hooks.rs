use std::collections::HashMap;
use std::fmt;

use crate::doc::SharedDoc;
use crate::dom::DomTree;
use crate::error::Result;
use crate::ids::{DomId, ItemId};

/// Marker attribute naming the hook that takes over an element's conversion.
pub const DEFAULT_HOOK_ATTRIBUTE: &str = "data-hook";

/// Pluggable conversion for specially marked elements.
///
/// A hook owns the shared representation of its element entirely: the engine neither filters the
/// element's attributes nor descends into its children.
pub trait Hook {
    /// Populates the freshly created, empty hook item from the external node.
    fn fill_type(
        &self,
        dom: &dyn DomTree,
        node: DomId,
        doc: &mut SharedDoc,
        hook: ItemId,
    ) -> Result<()>;

    /// Builds an external node for a hook item when materializing the shared tree.
    ///
    /// The default creates an empty `div` carrying `marker="name"`, so converting it back routes
    /// through the same hook.
    fn create_dom(
        &self,
        dom: &mut dyn DomTree,
        doc: &SharedDoc,
        hook: ItemId,
        marker: &str,
    ) -> Result<DomId> {
        placeholder_dom(dom, doc.hook_name(hook), marker)
    }
}

pub(crate) fn placeholder_dom(
    dom: &mut dyn DomTree,
    name: Option<&str>,
    marker: &str,
) -> Result<DomId> {
    let node = dom.create_element("div");
    if let Some(name) = name {
        dom.set_attribute(node, marker, name)?;
    }
    Ok(node)
}

/// Hooks keyed by name.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Box<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` under `name`, returning any hook it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        hook: impl Hook + 'static,
    ) -> Option<Box<dyn Hook>> {
        self.hooks.insert(name.into(), Box::new(hook))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Hook> {
        self.hooks.get(name).map(|hook| &**hook)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}
