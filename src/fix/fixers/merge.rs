//! Sibling merging.

use crate::dom::{Dom, NodeId, QName};
use crate::error::Result;
use crate::fix::matcher::{next_significant, Matcher};
use crate::fix::registry::{Fix, FixContext, FixOutcome};

/// Merge the node with every following sibling of the same kind.
///
/// Two elements are the same kind when they share name, type and the value
/// of `attr`, which is how `<em>a</em> <em>b</em>` collapses into a single
/// emphasis run. Whitespace and comments between them move inside. All
/// consecutive siblings are absorbed at once so the rule does not fire on
/// the same node again.
pub struct MergeSiblings {
    pub attr: QName,
}

impl Fix for MergeSiblings {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let same = Matcher::SameAsNext(self.attr.clone());
        let mut merged = 0;

        while same.matches(dom, node) {
            let Some(next) = next_significant(dom, node) else {
                break;
            };
            while let Some(between) = dom.next_sibling(node) {
                if between == next {
                    break;
                }
                absorb(dom, node, between);
            }
            while let Some(child) = dom.first_child(next) {
                absorb(dom, node, child);
            }
            dom.detach(next);
            merged += 1;
        }

        if merged == 0 {
            let message = format!("no following sibling shares {}", self.attr.qualified());
            return ctx.unhandled(dom, node, &message);
        }
        Ok(FixOutcome::Applied)
    }
}

/// Append `child` to `node`, folding text into a trailing text node.
fn absorb(dom: &mut Dom, node: NodeId, child: NodeId) {
    if let Some(text) = dom.text(child).map(str::to_owned) {
        dom.detach(child);
        dom.append_text(node, &text);
    } else {
        dom.append(node, child);
    }
}
