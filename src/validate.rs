//! Structural validation of canonical documents.

use tracing::debug;

use crate::bbx::attrs::AttrKind;
use crate::bbx::{
    self, allows_text, is_foreign, is_valid_child, SubType, BBX_NS, BB_NS, CURRENT_VERSION, FIX_NS,
    HEAD_ELEMENT,
};
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::styles::StyleDefs;
use crate::util::is_xml_whitespace;

/// Asserts that a document obeys the canonical format.
///
/// Checks, in order: the document element and its version marker, the fixed
/// `head` + book root layout, and then every canonical element under the
/// book root (type, attributes, style references, parent/child legality and
/// text placement). UTD and MathML subtrees are skipped. The first
/// violation is returned as a [`Error::StructuralViolation`] naming the node.
///
/// Validation is a development safety net; a disabled validator accepts
/// everything.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    styles: &'a StyleDefs,
    enabled: bool,
}

impl<'a> Validator<'a> {
    pub fn new(styles: &'a StyleDefs) -> Self {
        Self {
            styles,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn validate(&self, dom: &Dom) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let doc = check_document(dom)?;
        let root = check_layout(dom, doc)?;
        let checked = self.check_tree(dom, root)?;
        debug!(elements = checked, "document is valid");
        Ok(())
    }

    /// Walk the book root with an explicit stack, returning how many
    /// canonical elements were checked.
    fn check_tree(&self, dom: &Dom, root: NodeId) -> Result<usize> {
        let mut checked = 0;
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            let Some(name) = dom.element_name(node) else {
                continue;
            };
            if is_foreign(name) {
                continue;
            }
            if name.ns.as_deref() != Some(BBX_NS) {
                return Err(Error::structural(
                    dom.describe(node),
                    format!("element <{}> is outside the canonical namespace", name.qualified()),
                ));
            }
            let Some(ty) = bbx::type_of(dom, node) else {
                return Err(Error::structural(
                    dom.describe(node),
                    format!("element <{}> has no resolvable type", name.qualified()),
                ));
            };

            self.check_attributes(dom, node, ty)?;

            if node != root
                && let Some(parent_ty) = dom.parent(node).and_then(|p| bbx::type_of(dom, p))
                && !is_valid_child(parent_ty, ty)
            {
                return Err(Error::structural(
                    dom.describe(node),
                    format!("{ty} is not allowed inside {parent_ty}"),
                ));
            }

            let children: Vec<_> = dom.children(node).collect();
            for &child in &children {
                if let Some(text) = dom.text(child)
                    && !allows_text(ty)
                    && !is_xml_whitespace(text)
                {
                    return Err(Error::structural(
                        dom.describe(child),
                        format!("text is not allowed directly inside {ty}"),
                    ));
                }
            }
            stack.extend(children.into_iter().rev().filter(|&c| dom.is_element(c)));
            checked += 1;
        }
        Ok(checked)
    }

    fn check_attributes(&self, dom: &Dom, node: NodeId, ty: SubType) -> Result<()> {
        let Some(elem) = dom.element(node) else {
            return Ok(());
        };
        for attr in &elem.attrs {
            let ns = attr.name.ns.as_deref();
            if ns == Some(FIX_NS) {
                return Err(Error::structural(
                    dom.describe(node),
                    format!("fixer bookkeeping attribute {} left behind", attr.name.qualified()),
                ));
            }
            match AttrKind::from_name(ns, &attr.name.local) {
                Some(kind) => {
                    if !kind.is_legal_for(ty) {
                        return Err(Error::structural(
                            dom.describe(node),
                            format!("{kind} is not legal on {ty}"),
                        ));
                    }
                    kind.check_value(&attr.value).map_err(|message| {
                        Error::structural(dom.describe(node), format!("{kind}: {message}"))
                    })?;
                    if kind == AttrKind::OverrideStyle && !self.styles.contains(&attr.value) {
                        return Err(Error::structural(
                            dom.describe(node),
                            format!("unknown style '{}'", attr.value),
                        ));
                    }
                }
                None if ns == Some(BB_NS) && attr.name.local != "type" => {
                    return Err(Error::structural(
                        dom.describe(node),
                        format!("unknown attribute {}", attr.name.qualified()),
                    ));
                }
                None => {}
            }
        }

        for &kind in AttrKind::ALL {
            if kind.is_required_for(ty) && elem.attr(Some(kind.namespace()), kind.local_name()).is_none() {
                return Err(Error::structural(
                    dom.describe(node),
                    format!("{ty} requires {kind}"),
                ));
            }
        }
        Ok(())
    }
}

/// The document element must be `bbdoc` at the current, structurally
/// consistent format version.
fn check_document(dom: &Dom) -> Result<NodeId> {
    let Some(doc) = bbx::document_element(dom) else {
        let at = dom.document_element().unwrap_or(dom.document());
        return Err(Error::structural(dom.describe(at), "document element is not bbdoc"));
    };

    let declared = bbx::format_version(dom)?;
    let actual = bbx::structural_version(dom);
    if declared != actual {
        return Err(Error::structural(
            dom.describe(doc),
            format!("declared format version {declared} but the structure is version {actual}"),
        ));
    }
    if declared != CURRENT_VERSION {
        return Err(Error::structural(
            dom.describe(doc),
            format!("format version {declared} must be upgraded to {CURRENT_VERSION}"),
        ));
    }
    Ok(doc)
}

/// `bbdoc` holds exactly `head` then the book root. Returns the book root.
fn check_layout(dom: &Dom, doc: NodeId) -> Result<NodeId> {
    let mut elements = Vec::new();
    for child in dom.children(doc) {
        if dom.text(child).is_some_and(|t| !is_xml_whitespace(t)) {
            return Err(Error::structural(
                dom.describe(child),
                "text is not allowed directly inside bbdoc",
            ));
        }
        if dom.is_element(child) {
            elements.push(child);
        }
    }

    let is_head = |n: NodeId| {
        dom.element_name(n)
            .is_some_and(|name| name.is(Some(BBX_NS), HEAD_ELEMENT))
    };
    match elements.as_slice() {
        [head, root] if is_head(*head) && bbx::is_a(dom, *root, SubType::ROOT) => Ok(*root),
        _ => Err(Error::structural(
            dom.describe(doc),
            format!(
                "bbdoc must hold exactly head and SECTION.ROOT, found {} element(s)",
                elements.len()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbx::{create, new_document, root_section, set_format_version, UTD_NS};
    use crate::dom::{parse_str, QName};

    fn styles() -> StyleDefs {
        StyleDefs::builtin().unwrap()
    }

    fn expect_violation(dom: &Dom, needle: &str) {
        let styles = styles();
        match Validator::new(&styles).validate(dom) {
            Err(Error::StructuralViolation { message, .. }) => {
                assert!(message.contains(needle), "{message}");
            }
            other => panic!("expected a violation mentioning '{needle}', got {other:?}"),
        }
    }

    #[test]
    fn test_fresh_document_is_valid() {
        let styles = styles();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, block);
        let text = dom.create_text("hello");
        dom.append(block, text);
        Validator::new(&styles).validate(&dom).unwrap();
    }

    #[test]
    fn test_illegal_nesting() {
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, block);
        let list = create(&mut dom, SubType::LIST);
        dom.append(block, list);
        expect_violation(&dom, "not allowed inside BLOCK.DEFAULT");
    }

    #[test]
    fn test_text_placement() {
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let ws = dom.create_text("\n  ");
        dom.append(root, ws);
        let styles = styles();
        Validator::new(&styles).validate(&dom).unwrap();

        let text = dom.create_text("loose");
        dom.append(root, text);
        expect_violation(&dom, "text is not allowed");
    }

    #[test]
    fn test_attribute_checks() {
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, block);

        dom.set_attr(block, QName::prefixed(UTD_NS, "utd", "overrideStyle"), "No Such Style");
        expect_violation(&dom, "unknown style");

        dom.set_attr(block, QName::prefixed(UTD_NS, "utd", "overrideStyle"), "Heading 1");
        dom.set_attr(block, QName::prefixed(BB_NS, "bb", "listLevel"), "1");
        expect_violation(&dom, "not legal on BLOCK.DEFAULT");

        dom.remove_attr(block, Some(BB_NS), "listLevel");
        dom.set_attr(block, QName::prefixed(FIX_NS, "fix", "seen"), "1");
        expect_violation(&dom, "bookkeeping");

        dom.remove_attr(block, Some(FIX_NS), "seen");
        let list = create(&mut dom, SubType::LIST);
        dom.append(root, list);
        dom.remove_attr(list, Some(BB_NS), "listLevel");
        expect_violation(&dom, "requires bb:listLevel");
    }

    #[test]
    fn test_foreign_subtrees_skipped() {
        let styles = styles();
        let dom = parse_str(
            r#"<bbdoc xmlns="http://brailleblaster.org/ns/bbx" xmlns:bb="http://brailleblaster.org/ns/bb" bb:version="3">
  <head/>
  <SECTION bb:type="ROOT">
    <BLOCK bb:type="DEFAULT"><INLINE bb:type="MATHML"><m:math xmlns:m="http://www.w3.org/1998/Math/MathML"><m:mi>x</m:mi></m:math></INLINE></BLOCK>
  </SECTION>
</bbdoc>"#,
        )
        .unwrap();
        Validator::new(&styles).validate(&dom).unwrap();
    }

    #[test]
    fn test_version_mismatch_names_document() {
        let mut dom = new_document();
        set_format_version(&mut dom, 2);
        let styles = styles();
        match Validator::new(&styles).validate(&dom) {
            Err(Error::StructuralViolation { node, .. }) => assert_eq!(node, "/bbdoc[1]"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_layout() {
        let mut dom = new_document();
        let doc = bbx::document_element(&dom).unwrap();
        let extra = create(&mut dom, "SECTION.OTHER".parse().unwrap());
        dom.append(doc, extra);
        expect_violation(&dom, "exactly head and SECTION.ROOT");
    }

    #[test]
    fn test_disabled_accepts_anything() {
        let styles = styles();
        let dom = parse_str("<anything/>").unwrap();
        Validator::new(&styles).enabled(false).validate(&dom).unwrap();
        assert!(Validator::new(&styles).validate(&dom).is_err());
    }
}
