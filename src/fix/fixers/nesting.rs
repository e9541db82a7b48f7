//! Hoist illegally nested elements out of their ancestors.

use crate::bbx::{self, is_valid_child};
use crate::dom::{self, Dom, NodeId};
use crate::error::Result;
use crate::fix::registry::{Fix, FixContext, FixOutcome};

/// Move the matched node up to the nearest level that admits it.
///
/// Climbs from the parent to the first ancestor whose own parent admits the
/// node's type and splits that ancestor around the node. A paragraph with a
/// list inside it becomes paragraph, list, paragraph; the inline wrappers
/// between them are duplicated on both sides by the splitter.
pub struct SplitNesting;

impl Fix for SplitNesting {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let Some(ty) = bbx::type_of(dom, node) else {
            return ctx.unhandled(dom, node, "only canonical elements can be hoisted");
        };
        let Some(mut ancestor) = dom.parent(node) else {
            return ctx.unhandled(dom, node, "cannot hoist a detached node");
        };

        loop {
            let Some(above) = dom.parent(ancestor) else {
                break;
            };
            match bbx::type_of(dom, above) {
                Some(above_ty) if is_valid_child(above_ty, ty) => {
                    dom::split(dom, ancestor, node)?;
                    return Ok(FixOutcome::Applied);
                }
                Some(_) => ancestor = above,
                None => break,
            }
        }

        let message = format!("no enclosing element admits {ty}");
        ctx.unhandled(dom, node, &message)
    }
}
