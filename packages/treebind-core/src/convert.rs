use tracing::{trace, warn};

use crate::config::{BindingConfig, UnknownHookPolicy};
use crate::doc::SharedDoc;
use crate::dom::{DomKind, DomTree};
use crate::error::{Error, Result};
use crate::filter::ElementFilter;
use crate::hooks::{HookRegistry, DEFAULT_HOOK_ATTRIBUTE};
use crate::ids::{DomId, ItemId};
use crate::mapping::Mapping;

/// Work done by one top-level call, applied or rolled back as a unit.
#[derive(Default)]
pub(crate) struct Staged {
    created: Vec<ItemId>,
    associations: Vec<(DomId, ItemId)>,
}

impl Staged {
    pub(crate) fn commit(self, mapping: &mut Mapping) {
        for (node, item) in self.associations {
            mapping.associate(node, item);
        }
    }

    /// Tombstones every item created by the call that is still prelim.
    pub(crate) fn discard(self, doc: &mut SharedDoc) {
        for item in self.created {
            doc.discard(item);
        }
    }
}

/// Converts external nodes into detached shared items.
///
/// Results are prelim: they live in the document's arena but are not linked under any container
/// until the caller inserts them. When a mapping is attached, every converted node is associated
/// with its item once the whole call succeeds; a failing call discards what it created and
/// associates nothing.
pub struct Converter<'a> {
    hooks: &'a HookRegistry,
    filter: &'a dyn ElementFilter,
    mapping: Option<&'a mut Mapping>,
    hook_attribute: &'a str,
    unknown_hook: UnknownHookPolicy,
    reports: Vec<Error>,
}

impl<'a> Converter<'a> {
    pub fn new(hooks: &'a HookRegistry, filter: &'a dyn ElementFilter) -> Self {
        Self {
            hooks,
            filter,
            mapping: None,
            hook_attribute: DEFAULT_HOOK_ATTRIBUTE,
            unknown_hook: UnknownHookPolicy::default(),
            reports: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: &'a mut Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_config(mut self, config: &'a BindingConfig) -> Self {
        self.hook_attribute = &config.hook_attribute;
        self.unknown_hook = config.unknown_hook;
        self
    }

    /// Non-fatal problems seen so far (currently only [`Error::UnknownHook`]).
    pub fn reports(&self) -> &[Error] {
        &self.reports
    }

    pub fn take_reports(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.reports)
    }

    /// Converts one external node. `Ok(None)` means the filter excluded it.
    pub fn convert<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        node: DomId,
    ) -> Result<Option<ItemId>> {
        let mut staged = Staged::default();
        let result = self.convert_node(dom, doc, node, &mut staged);
        self.finish(doc, staged, result)
    }

    /// Converts a sibling run in order, leaving out excluded nodes.
    pub fn convert_sequence<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        nodes: &[DomId],
    ) -> Result<Vec<ItemId>> {
        let mut staged = Staged::default();
        let result = self.convert_nodes(dom, doc, nodes, &mut staged);
        self.finish(doc, staged, result)
    }

    /// Like [`Converter::convert_sequence`] but hands the staged work back instead of applying
    /// it, for callers with more fallible steps to run before associating.
    pub(crate) fn convert_sequence_staged<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        nodes: &[DomId],
    ) -> Result<(Vec<ItemId>, Staged)> {
        let mut staged = Staged::default();
        match self.convert_nodes(dom, doc, nodes, &mut staged) {
            Ok(items) => Ok((items, staged)),
            Err(err) => {
                staged.discard(doc);
                Err(err)
            }
        }
    }

    fn finish<T>(&mut self, doc: &mut SharedDoc, staged: Staged, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if let Some(mapping) = self.mapping.as_deref_mut() {
                    staged.commit(mapping);
                }
                Ok(value)
            }
            Err(err) => {
                staged.discard(doc);
                Err(err)
            }
        }
    }

    fn convert_nodes<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        nodes: &[DomId],
        staged: &mut Staged,
    ) -> Result<Vec<ItemId>> {
        let mut items = Vec::with_capacity(nodes.len());
        for &node in nodes {
            if let Some(item) = self.convert_node(dom, doc, node, staged)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn convert_node<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        node: DomId,
        staged: &mut Staged,
    ) -> Result<Option<ItemId>> {
        let kind = dom
            .kind(node)
            .ok_or_else(|| Error::UnknownNode(node.to_string()))?;
        let item = match kind {
            DomKind::Element => match self.convert_element(dom, doc, node, staged)? {
                Some(item) => item,
                None => return Ok(None),
            },
            DomKind::Text => {
                let item = doc.create_text("");
                staged.created.push(item);
                let text = dom.text(node).unwrap_or_default();
                doc.insert_text(item, 0, text)?;
                item
            }
            other => return Err(Error::UnsupportedNodeType { node, kind: other }),
        };
        trace!(%node, %item, ?kind, "converted");
        staged.associations.push((node, item));
        Ok(Some(item))
    }

    fn convert_element<D: DomTree>(
        &mut self,
        dom: &mut D,
        doc: &mut SharedDoc,
        node: DomId,
        staged: &mut Staged,
    ) -> Result<Option<ItemId>> {
        let marker = self.hook_attribute;
        let mut hide_marker = false;
        if let Some(name) = dom.get_attribute(node, marker).map(str::to_string) {
            if let Some(hook) = self.hooks.get(&name) {
                let item = doc.create_hook(&name);
                staged.created.push(item);
                hook.fill_type(&*dom, node, doc, item)?;
                return Ok(Some(item));
            }
            warn!(%node, hook = %name, "unknown hook, converting as a plain element");
            self.reports.push(Error::UnknownHook { node, name });
            match self.unknown_hook {
                UnknownHookPolicy::StripMarker => dom.remove_attribute(node, marker)?,
                UnknownHookPolicy::Report => hide_marker = true,
            }
        }

        let tag = dom
            .tag_name(node)
            .ok_or_else(|| Error::InconsistentState(format!("{node} is an element without a tag")))?
            .to_string();
        let mut attributes = dom.attributes(node);
        if hide_marker {
            attributes.retain(|(name, _)| name != marker);
        }
        let Some(attributes) = self.filter.filter(&tag, attributes) else {
            trace!(%node, %tag, "excluded by filter");
            return Ok(None);
        };

        let item = doc.create_element(&tag);
        staged.created.push(item);
        for (name, value) in &attributes {
            doc.set_attribute(item, name, value)?;
        }
        let children = dom.children(node);
        let converted = self.convert_nodes(dom, doc, &children, staged)?;
        doc.insert_after(item, None, &converted)?;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::doc::SharedKind;
    use crate::dom::MemoryDom;
    use crate::filter::{AdmitAll, Attributes};
    use crate::hooks::Hook;

    struct SourceHook;

    impl Hook for SourceHook {
        fn fill_type(
            &self,
            dom: &dyn DomTree,
            node: DomId,
            doc: &mut SharedDoc,
            hook: ItemId,
        ) -> Result<()> {
            doc.hook_payload_mut(hook)?
                .insert("source".into(), dom.text_content(node));
            Ok(())
        }
    }

    #[test]
    fn converts_nested_elements_in_order() {
        let mut dom = MemoryDom::new();
        let ul = dom.element_with("ul", &[("class", "list")]);
        for label in ["a", "b", "c"] {
            let li = dom.create_element("li");
            let text = dom.create_text(label);
            dom.append_child(li, text).unwrap();
            dom.append_child(ul, li).unwrap();
        }

        let hooks = HookRegistry::new();
        let mut doc = SharedDoc::new();
        let mut mapping = Mapping::new();
        let mut converter = Converter::new(&hooks, &AdmitAll).with_mapping(&mut mapping);
        let item = converter.convert(&mut dom, &mut doc, ul).unwrap().unwrap();

        assert_eq!(doc.kind(item), Some(SharedKind::Element));
        assert_eq!(
            doc.to_xml_string(item).unwrap(),
            "<ul class=\"list\"><li>a</li><li>b</li><li>c</li></ul>"
        );
        // ul + 3 li + 3 text
        assert_eq!(mapping.len(), 7);
        assert_eq!(mapping.shared(ul), Some(item));
        mapping.validate_invariants().unwrap();
    }

    #[test]
    fn conversion_without_mapping_is_allowed() {
        let mut dom = MemoryDom::new();
        let text = dom.create_text("preview");
        let hooks = HookRegistry::new();
        let mut doc = SharedDoc::new();

        let item = Converter::new(&hooks, &AdmitAll)
            .convert(&mut dom, &mut doc, text)
            .unwrap()
            .unwrap();
        assert_eq!(doc.text(item), Some("preview"));
        assert_eq!(doc.parent(item), None);
    }

    #[test]
    fn exclusion_skips_descendants() {
        let mut dom = MemoryDom::new();
        let section = dom.create_element("section");
        let private = dom.create_element("private");
        let inner = dom.create_element("span");
        dom.append_child(section, private).unwrap();
        dom.append_child(private, inner).unwrap();

        let seen = RefCell::new(Vec::new());
        let filter = |tag: &str, attrs: Attributes| {
            seen.borrow_mut().push(tag.to_string());
            (tag != "private").then_some(attrs)
        };
        let hooks = HookRegistry::new();
        let mut doc = SharedDoc::new();
        let mut mapping = Mapping::new();
        let item = Converter::new(&hooks, &filter)
            .with_mapping(&mut mapping)
            .convert(&mut dom, &mut doc, section)
            .unwrap()
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["section".to_string(), "private".to_string()]);
        assert_eq!(doc.len(item), 0);
        assert_eq!(mapping.shared(private), None);
        assert_eq!(mapping.shared(inner), None);
    }

    #[test]
    fn registered_hook_takes_over_the_element() {
        let mut dom = MemoryDom::new();
        let code = dom.element_with("pre", &[("data-hook", "code"), ("class", "x")]);
        let body = dom.create_text("fn main() {}");
        dom.append_child(code, body).unwrap();

        let mut hooks = HookRegistry::new();
        hooks.register("code", SourceHook);
        let calls = RefCell::new(0);
        let filter = |_: &str, attrs: Attributes| {
            *calls.borrow_mut() += 1;
            Some(attrs)
        };
        let mut doc = SharedDoc::new();
        let mut mapping = Mapping::new();
        let item = Converter::new(&hooks, &filter)
            .with_mapping(&mut mapping)
            .convert(&mut dom, &mut doc, code)
            .unwrap()
            .unwrap();

        assert_eq!(doc.kind(item), Some(SharedKind::Hook));
        assert_eq!(doc.hook_name(item), Some("code"));
        assert_eq!(
            doc.hook_payload(item).unwrap().get("source").map(String::as_str),
            Some("fn main() {}")
        );
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(mapping.shared(code), Some(item));
        assert_eq!(mapping.shared(body), None);
    }

    #[test]
    fn unknown_hook_strips_marker_and_converts_plainly() {
        let mut dom = MemoryDom::new();
        let el = dom.element_with("div", &[("data-hook", "missing"), ("id", "a")]);
        let hooks = HookRegistry::new();
        let mut doc = SharedDoc::new();
        let mut converter = Converter::new(&hooks, &AdmitAll);
        let item = converter.convert(&mut dom, &mut doc, el).unwrap().unwrap();

        assert_eq!(doc.kind(item), Some(SharedKind::Element));
        assert_eq!(
            doc.attributes(item).unwrap(),
            &[("id".to_string(), "a".to_string())]
        );
        assert_eq!(dom.get_attribute(el, "data-hook"), None);
        assert_eq!(
            converter.reports(),
            &[Error::UnknownHook {
                node: el,
                name: "missing".into()
            }]
        );
    }

    #[test]
    fn report_policy_leaves_the_external_node_alone() {
        let mut dom = MemoryDom::new();
        let el = dom.element_with("div", &[("data-hook", "missing"), ("id", "a")]);
        let hooks = HookRegistry::new();
        let config = BindingConfig::default().with_unknown_hook(UnknownHookPolicy::Report);
        let mut doc = SharedDoc::new();
        let mut converter = Converter::new(&hooks, &AdmitAll).with_config(&config);
        let item = converter.convert(&mut dom, &mut doc, el).unwrap().unwrap();

        assert_eq!(doc.get_attribute(item, "data-hook"), None);
        assert_eq!(doc.get_attribute(item, "id"), Some("a"));
        assert_eq!(dom.get_attribute(el, "data-hook"), Some("missing"));
        assert_eq!(converter.take_reports().len(), 1);
        assert!(converter.reports().is_empty());
    }

    #[test]
    fn unsupported_node_rolls_back_the_whole_call() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div");
        let ok = dom.create_text("fine");
        let comment = dom.create_comment("nope");
        dom.append_child(div, ok).unwrap();
        dom.append_child(div, comment).unwrap();

        let hooks = HookRegistry::new();
        let mut doc = SharedDoc::new();
        let mut mapping = Mapping::new();
        let before = doc.item_count();
        let err = Converter::new(&hooks, &AdmitAll)
            .with_mapping(&mut mapping)
            .convert(&mut dom, &mut doc, div)
            .unwrap_err();

        assert_eq!(
            err,
            Error::UnsupportedNodeType {
                node: comment,
                kind: DomKind::Comment
            }
        );
        assert!(mapping.is_empty());
        for idx in before..doc.item_count() {
            assert!(doc.is_deleted(ItemId(idx as u64)));
        }
        assert_eq!(doc.len(doc.root()), 0);
    }

    #[test]
    fn custom_marker_attribute() {
        let mut dom = MemoryDom::new();
        let el = dom.element_with("figure", &[("x-widget", "chart")]);
        let mut hooks = HookRegistry::new();
        hooks.register("chart", SourceHook);
        let config = BindingConfig::default().with_hook_attribute("x-widget");
        let mut doc = SharedDoc::new();
        let item = Converter::new(&hooks, &AdmitAll)
            .with_config(&config)
            .convert(&mut dom, &mut doc, el)
            .unwrap()
            .unwrap();
        assert_eq!(doc.hook_name(item), Some("chart"));
    }
}
