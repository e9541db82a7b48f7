//! Single-node rewrites: unwrap, detach, retype and attribute edits.

use crate::bbx::{self, SubType};
use crate::dom::{Dom, NodeId, QName};
use crate::error::Result;
use crate::fix::registry::{Fix, FixContext, FixOutcome};
use crate::util::is_xml_whitespace;

/// Replace the node with its children.
///
/// With a `separator`, an element of that type is placed between the
/// unwrapped children and any content on either side, so sibling blocks
/// collapsed into one do not run their words together.
pub struct Unwrap {
    pub separator: Option<SubType>,
}

impl Fix for Unwrap {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        if dom.parent(node).is_none() || bbx::is_a(dom, node, SubType::ROOT) {
            return ctx.unhandled(dom, node, "cannot unwrap the book root");
        }
        if let Some(separator) = self.separator {
            if needs_separator(dom, dom.prev_sibling(node), separator, Dom::prev_sibling) {
                let sep = bbx::create(dom, separator);
                dom.insert_before(node, sep);
            }
            if needs_separator(dom, dom.next_sibling(node), separator, Dom::next_sibling) {
                let sep = bbx::create(dom, separator);
                dom.insert_after(node, sep);
            }
        }
        dom.unwrap(node);
        Ok(FixOutcome::Applied)
    }
}

/// Whether the nearest meaningful sibling in one direction is content that
/// is not already a separator.
fn needs_separator(
    dom: &Dom,
    mut sibling: Option<NodeId>,
    separator: SubType,
    step: fn(&Dom, NodeId) -> Option<NodeId>,
) -> bool {
    while let Some(id) = sibling {
        if dom.is_element(id) {
            return !bbx::is_a(dom, id, separator);
        }
        if dom.text(id).is_some_and(|t| !is_xml_whitespace(t)) {
            return true;
        }
        sibling = step(dom, id);
    }
    false
}

/// Remove the node and everything under it.
pub struct Detach;

impl Fix for Detach {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        if bbx::is_a(dom, node, SubType::ROOT) {
            return ctx.unhandled(dom, node, "cannot detach the book root");
        }
        dom.detach(node);
        Ok(FixOutcome::Applied)
    }
}

/// Re-tag the node in place.
pub struct Retype {
    pub to: SubType,
}

impl Fix for Retype {
    fn apply(&self, dom: &mut Dom, node: NodeId, _ctx: &FixContext<'_>) -> Result<FixOutcome> {
        bbx::transform(dom, node, self.to)?;
        Ok(FixOutcome::Applied)
    }
}

/// Drop whitespace-only text children.
///
/// Lists, tables and rows carry no text of their own; indentation from the
/// source markup only gets in the way of the formatter there.
pub struct StripWhitespace;

impl Fix for StripWhitespace {
    fn apply(&self, dom: &mut Dom, node: NodeId, _ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let blank: Vec<_> = dom
            .children(node)
            .filter(|&c| dom.text(c).is_some_and(is_xml_whitespace))
            .collect();
        for child in blank {
            dom.detach(child);
        }
        Ok(FixOutcome::Applied)
    }
}

/// Move an attribute's value to a new name.
pub struct RenameAttr {
    pub from: QName,
    pub to: QName,
}

impl Fix for RenameAttr {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let Some(value) = dom.remove_attr(node, self.from.ns.as_deref(), &self.from.local) else {
            let message = format!("no {} attribute to rename", self.from.qualified());
            return ctx.unhandled(dom, node, &message);
        };
        dom.set_attr(node, self.to.clone(), value);
        Ok(FixOutcome::Applied)
    }
}

/// Set an attribute to a fixed value.
pub struct SetAttr {
    pub attr: QName,
    pub value: String,
}

impl Fix for SetAttr {
    fn apply(&self, dom: &mut Dom, node: NodeId, _ctx: &FixContext<'_>) -> Result<FixOutcome> {
        dom.set_attr(node, self.attr.clone(), self.value.as_str());
        Ok(FixOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbx::{create, new_document, root_section, InlineType, BB_NS, UTD_NS};
    use crate::styles::StyleDefs;

    fn ctx(styles: &StyleDefs) -> FixContext<'_> {
        FixContext {
            styles,
            strict: true,
        }
    }

    #[test]
    fn test_retype() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let list = create(&mut dom, SubType::LIST);
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, list);
        dom.append(list, block);

        let fix = Retype { to: SubType::LIST_ITEM };
        assert_eq!(fix.apply(&mut dom, block, &ctx(&styles)).unwrap(), FixOutcome::Applied);
        assert!(bbx::is_a(&dom, block, SubType::LIST_ITEM));

        // Cross-core retype is rejected
        let bad = Retype { to: SubType::LIST };
        assert!(bad.apply(&mut dom, block, &ctx(&styles)).is_err());
    }

    #[test]
    fn test_unwrap_with_separator() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let item = create(&mut dom, SubType::LIST_ITEM);
        dom.append(root, item);
        let lead = dom.create_text("a");
        dom.append(item, lead);
        let mut paras = Vec::new();
        for text in ["b", "c"] {
            let para = create(&mut dom, SubType::BLOCK_DEFAULT);
            dom.append(item, para);
            dom.append_text(para, text);
            paras.push(para);
        }

        let fix = Unwrap {
            separator: Some(SubType::Inline(InlineType::LineBreak)),
        };
        for para in paras {
            fix.apply(&mut dom, para, &ctx(&styles)).unwrap();
        }

        let breaks: Vec<_> = dom
            .children(item)
            .filter(|&c| bbx::type_of(&dom, c) == Some(SubType::Inline(InlineType::LineBreak)))
            .collect();
        assert_eq!(breaks.len(), 2);
        assert_eq!(dom.text_content(item), "abc");
        // Text and breaks alternate: a, br, b, br, c
        assert_eq!(dom.child_count(item), 5);
    }

    #[test]
    fn test_unwrap_without_neighbours_adds_nothing() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let item = create(&mut dom, SubType::LIST_ITEM);
        dom.append(root, item);
        let para = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(item, para);
        dom.append_text(para, "only");

        let fix = Unwrap {
            separator: Some(SubType::Inline(InlineType::LineBreak)),
        };
        fix.apply(&mut dom, para, &ctx(&styles)).unwrap();
        assert_eq!(dom.child_count(item), 1);
        assert_eq!(dom.text_content(item), "only");
    }

    #[test]
    fn test_strip_whitespace() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let list = create(&mut dom, SubType::LIST);
        dom.append(root, list);
        for text in ["\n  ", "\n"] {
            let t = dom.create_text(text);
            dom.append(list, t);
            let item = create(&mut dom, SubType::LIST_ITEM);
            dom.append(list, item);
        }

        StripWhitespace.apply(&mut dom, list, &ctx(&styles)).unwrap();
        assert_eq!(dom.child_count(list), 2);
        assert!(dom.children(list).all(|c| dom.is_element(c)));
    }

    #[test]
    fn test_rename_attr() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, block);
        dom.set_attr(block, QName::prefixed(BB_NS, "bb", "style"), "Heading 1");

        let fix = RenameAttr {
            from: QName::new(Some(BB_NS), "style"),
            to: QName::prefixed(UTD_NS, "utd", "overrideStyle"),
        };
        fix.apply(&mut dom, block, &ctx(&styles)).unwrap();

        assert_eq!(dom.attr(block, Some(BB_NS), "style"), None);
        assert_eq!(dom.attr(block, Some(UTD_NS), "overrideStyle"), Some("Heading 1"));

        // Nothing left to rename
        assert!(fix.apply(&mut dom, block, &ctx(&styles)).is_err());
    }

    #[test]
    fn test_unwrap_and_detach_refuse_root() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        assert!(Unwrap { separator: None }.apply(&mut dom, root, &ctx(&styles)).is_err());
        assert!(Detach.apply(&mut dom, root, &ctx(&styles)).is_err());
        assert!(dom.is_attached(root));
    }
}
