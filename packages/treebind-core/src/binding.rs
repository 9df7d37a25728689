use tracing::{debug, warn};

use crate::config::BindingConfig;
use crate::convert::Converter;
use crate::doc::{SharedDoc, SharedKind};
use crate::dom::DomTree;
use crate::error::{Error, Result};
use crate::filter::{AdmitAll, ElementFilter};
use crate::hooks::{placeholder_dom, HookRegistry};
use crate::ids::{DomId, ItemId};
use crate::mapping::Mapping;

/// State shared by every conversion and reconciliation between one external tree and one shared
/// document: the association mapping, the hooks, the filter and the settings.
///
/// Neither tree is owned here; both are passed into each call.
pub struct Binding {
    mapping: Mapping,
    hooks: HookRegistry,
    filter: Box<dyn ElementFilter>,
    config: BindingConfig,
    reports: Vec<Error>,
}

impl Default for Binding {
    fn default() -> Self {
        Self::new()
    }
}

impl Binding {
    pub fn new() -> Self {
        Self {
            mapping: Mapping::new(),
            hooks: HookRegistry::new(),
            filter: Box::new(AdmitAll),
            config: BindingConfig::default(),
            reports: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: impl ElementFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.mapping
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Non-fatal problems collected by conversions through this binding.
    pub fn reports(&self) -> &[Error] {
        &self.reports
    }

    pub fn take_reports(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.reports)
    }

    /// Converts one node and associates the result, without inserting it anywhere.
    pub fn convert<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        node: DomId,
    ) -> Result<Option<ItemId>> {
        let mut converter = Converter::new(&self.hooks, &*self.filter)
            .with_mapping(&mut self.mapping)
            .with_config(&self.config);
        let result = converter.convert(dom, doc, node);
        self.reports.extend(converter.take_reports());
        result
    }

    /// Converts `nodes` and splices the results into `parent` right after `reference` (or at the
    /// head when `reference` is `None`). Returns the inserted items in order.
    ///
    /// `reference` must be a live child of `parent`; this is checked before anything is
    /// converted.
    pub fn insert_after<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        parent: ItemId,
        reference: Option<ItemId>,
        nodes: &[DomId],
    ) -> Result<Vec<ItemId>> {
        match doc.kind(parent) {
            Some(SharedKind::Fragment | SharedKind::Element) => {}
            Some(_) => {
                return Err(Error::InvalidReference(format!(
                    "{parent} cannot have children"
                )))
            }
            None => return Err(Error::UnknownNode(parent.to_string())),
        }
        if let Some(reference) = reference {
            if !doc.is_live_child(parent, reference) {
                return Err(Error::InvalidReference(format!(
                    "{reference} is not a live child of {parent}"
                )));
            }
        }

        let (items, staged) = {
            let mut converter =
                Converter::new(&self.hooks, &*self.filter).with_config(&self.config);
            let result = converter.convert_sequence_staged(dom, doc, nodes);
            self.reports.extend(converter.take_reports());
            result?
        };
        // hooks get the document mutably, so the splice can still fail here
        if let Err(err) = doc.insert_after(parent, reference, &items) {
            staged.discard(doc);
            return Err(err);
        }
        staged.commit(&mut self.mapping);
        debug!(
            %parent,
            reference = ?reference,
            requested = nodes.len(),
            inserted = items.len(),
            "spliced converted nodes"
        );
        Ok(items)
    }

    /// Single-node form of [`Binding::insert_after`].
    ///
    /// Returns the inserted item, or `reference` unchanged when the filter excluded the node.
    pub fn insert_node_after<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        parent: ItemId,
        reference: Option<ItemId>,
        node: DomId,
    ) -> Result<Option<ItemId>> {
        let inserted = self.insert_after(dom, doc, parent, reference, &[node])?;
        Ok(inserted.first().copied().or(reference))
    }

    /// Hands the shared item of `old` over to `new`, for an external node replaced in place.
    pub fn redirect(&mut self, old: DomId, new: DomId) -> Option<ItemId> {
        self.mapping.redirect(old, new)
    }

    /// Initial sync: converts every child of `dom_parent`, appends the results to
    /// `shared_parent` and associates the two containers.
    pub fn populate<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        dom_parent: DomId,
        shared_parent: ItemId,
    ) -> Result<Vec<ItemId>> {
        let children = dom.children(dom_parent);
        let reference = doc.children(shared_parent).last();
        let items = self.insert_after(dom, doc, shared_parent, reference, &children)?;
        self.mapping.associate(dom_parent, shared_parent);
        Ok(items)
    }

    /// Tombstones `item` and drops the associations of its whole subtree.
    ///
    /// Observers call this after removing the matching external node, since external removal has
    /// no implicit effect on the shared tree.
    pub fn remove_shared(&mut self, doc: &mut SharedDoc, item: ItemId) -> Result<()> {
        doc.delete(item)?;
        let mut stack = vec![item];
        let mut dropped = 0usize;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.mapping.dom(current) {
                self.mapping.disassociate(node, current);
                dropped += 1;
            }
            let mut child = doc.start(current);
            while let Some(c) = child {
                stack.push(c);
                child = doc.right(c);
            }
        }
        debug!(%item, dropped, "removed shared subtree");
        Ok(())
    }

    /// Builds a fresh external subtree for a live shared item and associates every created node.
    ///
    /// Returns `None` for deleted items. Fragments have no external counterpart; use
    /// [`Binding::materialize_children`] for them. Associations are only recorded when the whole
    /// subtree was built.
    pub fn materialize<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &SharedDoc,
        item: ItemId,
    ) -> Result<Option<DomId>> {
        let mut staged = Vec::new();
        let node = self.materialize_item(dom, doc, item, &mut staged)?;
        self.commit_materialized(staged);
        Ok(node)
    }

    /// Materializes every live child of `item` and appends it to `dom_parent`.
    pub fn materialize_children<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &SharedDoc,
        item: ItemId,
        dom_parent: DomId,
    ) -> Result<Vec<DomId>> {
        let mut staged = Vec::new();
        let created = self.materialize_into(dom, doc, item, dom_parent, &mut staged)?;
        self.commit_materialized(staged);
        Ok(created)
    }

    fn commit_materialized(&mut self, staged: Vec<(DomId, ItemId)>) {
        for (node, item) in staged {
            self.mapping.associate(node, item);
        }
    }

    fn materialize_item<D: DomTree>(
        &self,
        dom: &mut D,
        doc: &SharedDoc,
        item: ItemId,
        staged: &mut Vec<(DomId, ItemId)>,
    ) -> Result<Option<DomId>> {
        if doc.is_deleted(item) {
            return Ok(None);
        }
        let kind = doc
            .kind(item)
            .ok_or_else(|| Error::UnknownNode(item.to_string()))?;
        let node = match kind {
            SharedKind::Element => {
                let tag = doc.tag_name(item).unwrap_or_default();
                let node = dom.create_element(tag);
                for (name, value) in doc.attributes(item).unwrap_or_default() {
                    dom.set_attribute(node, name, value)?;
                }
                self.materialize_into(dom, doc, item, node, staged)?;
                node
            }
            SharedKind::Text => dom.create_text(doc.text(item).unwrap_or_default()),
            SharedKind::Hook => {
                let name = doc.hook_name(item).unwrap_or_default();
                let marker = self.config.hook_attribute.as_str();
                match self.hooks.get(name) {
                    Some(hook) => hook.create_dom(&mut *dom, doc, item, marker)?,
                    None => {
                        warn!(%item, hook = %name, "no hook registered, materializing a placeholder");
                        placeholder_dom(&mut *dom, Some(name), marker)?
                    }
                }
            }
            SharedKind::Fragment => {
                return Err(Error::InvalidOperation(format!(
                    "{item} is a fragment and has no external counterpart"
                )))
            }
        };
        staged.push((node, item));
        Ok(Some(node))
    }

    fn materialize_into<D: DomTree>(
        &self,
        dom: &mut D,
        doc: &SharedDoc,
        item: ItemId,
        dom_parent: DomId,
        staged: &mut Vec<(DomId, ItemId)>,
    ) -> Result<Vec<DomId>> {
        let mut created = Vec::new();
        for child in doc.children(item) {
            if let Some(node) = self.materialize_item(dom, doc, child, staged)? {
                dom.append_child(dom_parent, node)?;
                created.push(node);
            }
        }
        Ok(created)
    }
}

/// Detaches the siblings of `start` (inclusive) up to `stop` (exclusive) from `parent`.
///
/// With `stop = None` everything from `start` to the last child goes. The sibling chain is
/// checked before anything is detached: if `stop` is never reached the call fails with
/// [`Error::InvalidReference`] and the tree is left as it was. Only the external tree changes;
/// shared items and associations are the caller's business.
pub fn remove_range_until<D>(
    dom: &mut D,
    parent: DomId,
    start: DomId,
    stop: Option<DomId>,
) -> Result<Vec<DomId>>
where
    D: DomTree + ?Sized,
{
    if stop == Some(start) {
        return Ok(Vec::new());
    }
    if dom.parent(start) != Some(parent) {
        return Err(Error::InvalidReference(format!(
            "{start} is not a child of {parent}"
        )));
    }

    let mut doomed = Vec::new();
    let mut cursor = Some(start);
    while cursor != stop {
        let Some(node) = cursor else {
            return Err(Error::InvalidReference(format!(
                "stop node {} is not a later sibling of {start}",
                stop.map(|s| s.to_string()).unwrap_or_default()
            )));
        };
        doomed.push(node);
        cursor = dom.next_sibling(node);
    }

    for &node in &doomed {
        dom.remove_child(parent, node)?;
    }
    debug!(%parent, %start, removed = doomed.len(), "removed external range");
    Ok(doomed)
}
