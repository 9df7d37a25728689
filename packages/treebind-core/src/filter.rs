use crate::dom::DomTree;
use crate::ids::DomId;

/// Attribute name/value pairs in insertion order.
pub type Attributes = Vec<(String, String)>;

/// Decides which elements cross into the shared tree and which of their attributes survive.
///
/// Returning `None` excludes the element together with its whole subtree. Returned attributes are
/// applied verbatim, in order, to the shared element.
pub trait ElementFilter {
    fn filter(&self, tag: &str, attributes: Attributes) -> Option<Attributes>;
}

impl<F> ElementFilter for F
where
    F: Fn(&str, Attributes) -> Option<Attributes>,
{
    fn filter(&self, tag: &str, attributes: Attributes) -> Option<Attributes> {
        self(tag, attributes)
    }
}

/// Admits every element with its attributes unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdmitAll;

impl ElementFilter for AdmitAll {
    fn filter(&self, _tag: &str, attributes: Attributes) -> Option<Attributes> {
        Some(attributes)
    }
}

/// Reads the attributes of an external element and runs them through `filter`.
///
/// Non-elements have no tag and are admitted with no attributes.
pub fn filter_dom_attributes<D>(
    dom: &D,
    node: DomId,
    filter: &dyn ElementFilter,
) -> Option<Attributes>
where
    D: DomTree + ?Sized,
{
    match dom.tag_name(node) {
        Some(tag) => filter.filter(tag, dom.attributes(node)),
        None => Some(Attributes::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    #[test]
    fn admit_all_is_identity() {
        let attrs = vec![("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())];
        assert_eq!(AdmitAll.filter("div", attrs.clone()), Some(attrs));
    }

    #[test]
    fn closures_drop_attributes_and_exclude_tags() {
        let filter = |tag: &str, mut attrs: Attributes| {
            if tag == "script" {
                return None;
            }
            attrs.retain(|(name, _)| !name.starts_with("data-"));
            Some(attrs)
        };

        let mut dom = MemoryDom::new();
        let div = dom.element_with("div", &[("id", "x"), ("data-secret", "y")]);
        let script = dom.create_element("script");

        assert_eq!(
            filter_dom_attributes(&dom, div, &filter),
            Some(vec![("id".to_string(), "x".to_string())])
        );
        assert_eq!(filter_dom_attributes(&dom, script, &filter), None);
    }
}
