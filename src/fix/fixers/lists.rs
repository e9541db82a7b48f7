//! List normalization: fusing, flattening and level derivation.
//!
//! Source lists nest by placing a list inside a list item. After the
//! nesting fixers hoist inner lists out of their items, the canonical form
//! is a single flat `CONTAINER.LIST` per run of items, where each item's
//! `bb:itemLevel` records its depth and the list's `bb:listLevel` is the
//! deepest item level it holds.

use crate::bbx::attrs::{self, ItemLevel, ListLevel};
use crate::bbx::{self, SubType, FIX_NS, FIX_PREFIX};
use crate::dom::{Dom, NodeId, QName};
use crate::error::Result;
use crate::fix::matcher::next_significant;
use crate::fix::registry::{Fix, FixContext, FixOutcome};

/// Bookkeeping attribute set once a list's level has been derived.
pub const LEVELS_MARKER: &str = "listLevels";

/// Fuse every directly following list into this one.
pub struct FuseLists;

impl Fix for FuseLists {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let mut level = attrs::get::<ListLevel>(dom, node)?.unwrap_or(0);
        let mut fused = 0;

        while let Some(next) = next_significant(dom, node)
            && bbx::is_a(dom, next, SubType::LIST)
        {
            while let Some(between) = dom.next_sibling(node) {
                if between == next {
                    break;
                }
                dom.append(node, between);
            }
            level = level.max(attrs::get::<ListLevel>(dom, next)?.unwrap_or(0));
            dom.move_children(next, node);
            dom.detach(next);
            fused += 1;
        }

        if fused == 0 {
            return ctx.unhandled(dom, node, "no adjacent list to fuse");
        }
        attrs::set::<ListLevel>(dom, node, &level)?;
        Ok(FixOutcome::Applied)
    }
}

/// Fold a list nested directly in another list into its parent, pushing
/// its items one level deeper.
pub struct FlattenList;

impl Fix for FlattenList {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let nested = dom
            .parent(node)
            .is_some_and(|p| bbx::is_a(dom, p, SubType::LIST));
        if !nested {
            return ctx.unhandled(dom, node, "list is not nested in a list");
        }

        let items: Vec<_> = dom
            .descendants(node)
            .filter(|&d| bbx::is_a(dom, d, SubType::LIST_ITEM))
            .collect();
        for item in items {
            let level = attrs::get::<ItemLevel>(dom, item)?.unwrap_or(0);
            attrs::set::<ItemLevel>(dom, item, &(level + 1))?;
        }
        dom.unwrap(node);
        Ok(FixOutcome::Applied)
    }
}

/// Set `bb:listLevel` to the deepest level among the list's own items.
pub struct ListLevels;

impl Fix for ListLevels {
    fn apply(&self, dom: &mut Dom, node: NodeId, _ctx: &FixContext<'_>) -> Result<FixOutcome> {
        let mut level = 0;
        for item in dom.descendants(node) {
            if !bbx::is_a(dom, item, SubType::LIST_ITEM) {
                continue;
            }
            let owner = dom.ancestors(item).find(|&a| bbx::is_a(dom, a, SubType::LIST));
            if owner == Some(node) {
                level = level.max(attrs::get::<ItemLevel>(dom, item)?.unwrap_or(0));
            }
        }
        attrs::set::<ListLevel>(dom, node, &level)?;
        dom.set_attr(node, QName::prefixed(FIX_NS, FIX_PREFIX, LEVELS_MARKER), "done");
        Ok(FixOutcome::Applied)
    }
}
