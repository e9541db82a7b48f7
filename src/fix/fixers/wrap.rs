//! Wrap loose content in a new canonical element.

use crate::bbx::{self, allows_text, is_valid_child, SubType};
use crate::dom::{Dom, NodeId};
use crate::error::Result;
use crate::fix::registry::{Fix, FixContext, FixOutcome};
use crate::util::is_xml_whitespace;

/// Wrap the matched node, together with the run of following siblings the
/// parent does not admit, in a fresh element of type `wrapper`.
///
/// Sections and containers cannot hold text or inline markup directly. A
/// source paragraph that was unwrapped during parsing leaves a run like
///
/// ```text
/// SECTION > ["Some ", INLINE.EMPHASIS "bold", " text", BLOCK.DEFAULT]
/// ```
///
/// which becomes
///
/// ```text
/// SECTION > [BLOCK.DEFAULT > ["Some ", INLINE.EMPHASIS "bold", " text"], BLOCK.DEFAULT]
/// ```
///
/// The whole run is wrapped in one application, so the matched node never
/// matches the same rule twice. Whitespace and comments between run
/// members are carried along; trailing ones stay outside.
pub struct WrapRun {
    pub wrapper: SubType,
}

enum Member {
    Joins,
    Filler,
    Ends,
}

impl WrapRun {
    fn classify(&self, dom: &Dom, parent: Option<SubType>, node: NodeId) -> Member {
        if dom.is_comment(node) {
            return Member::Filler;
        }
        if let Some(text) = dom.text(node) {
            if is_xml_whitespace(text) {
                return Member::Filler;
            }
            let parent_takes_text = parent.is_some_and(allows_text);
            return if !parent_takes_text && allows_text(self.wrapper) {
                Member::Joins
            } else {
                Member::Ends
            };
        }
        match bbx::type_of(dom, node) {
            Some(ty) => {
                let parent_admits = parent.is_some_and(|p| is_valid_child(p, ty));
                if !parent_admits && is_valid_child(self.wrapper, ty) {
                    Member::Joins
                } else {
                    Member::Ends
                }
            }
            None => Member::Ends,
        }
    }
}

impl Fix for WrapRun {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let Some(parent) = dom.parent(node) else {
            return ctx.unhandled(dom, node, "cannot wrap a detached node");
        };
        let parent_ty = bbx::type_of(dom, parent);

        let mut run = vec![node];
        let mut pending = Vec::new();
        let mut current = dom.next_sibling(node);
        while let Some(sibling) = current {
            match self.classify(dom, parent_ty, sibling) {
                Member::Joins => {
                    run.append(&mut pending);
                    run.push(sibling);
                }
                Member::Filler => pending.push(sibling),
                Member::Ends => break,
            }
            current = dom.next_sibling(sibling);
        }

        let wrapper = bbx::create(dom, self.wrapper);
        dom.insert_before(node, wrapper);
        for member in run {
            dom.append(wrapper, member);
        }
        Ok(FixOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbx::{create, new_document, root_section};
    use crate::styles::StyleDefs;

    #[test]
    fn test_wraps_whole_run() {
        let styles = StyleDefs::default();
        let ctx = FixContext {
            styles: &styles,
            strict: true,
        };
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();

        let first = dom.create_text("Some ");
        let emph = create(&mut dom, SubType::EMPHASIS);
        let bold = dom.create_text("bold");
        let tail = dom.create_text(" text");
        let gap = dom.create_text("\n");
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, first);
        dom.append(root, emph);
        dom.append(emph, bold);
        dom.append(root, tail);
        dom.append(root, gap);
        dom.append(root, block);

        let fix = WrapRun {
            wrapper: SubType::BLOCK_DEFAULT,
        };
        fix.apply(&mut dom, first, &ctx).unwrap();

        let children: Vec<_> = dom.children(root).collect();
        assert_eq!(children.len(), 3);
        let wrapper = children[0];
        assert!(bbx::is_a(&dom, wrapper, SubType::BLOCK_DEFAULT));
        assert_eq!(dom.text_content(wrapper), "Some bold text");
        // Trailing whitespace stays outside the wrapper
        assert_eq!(children[1], gap);
        assert_eq!(children[2], block);
    }

    #[test]
    fn test_wraps_cells_in_row() {
        let styles = StyleDefs::default();
        let ctx = FixContext {
            styles: &styles,
            strict: true,
        };
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let table = create(&mut dom, "CONTAINER.TABLE".parse().unwrap());
        dom.append(root, table);
        let cell: SubType = "BLOCK.TABLE_CELL".parse().unwrap();
        let cells: Vec<_> = (0..3).map(|_| create(&mut dom, cell)).collect();
        for &c in &cells {
            dom.append(table, c);
        }

        let fix = WrapRun {
            wrapper: "CONTAINER.TABLE_ROW".parse().unwrap(),
        };
        fix.apply(&mut dom, cells[0], &ctx).unwrap();

        assert_eq!(dom.child_count(table), 1);
        let row = dom.first_child(table).unwrap();
        assert_eq!(dom.children(row).collect::<Vec<_>>(), cells);
    }
}
