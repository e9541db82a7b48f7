//! Wrapper-preserving tree split.
//!
//! Splitting `<p>a<em>b<br/>c</em>d</p>` at `<br/>` with the `<p>` as root
//! produces three siblings: `<p>a<em>b</em></p>`, the `<br/>`, and
//! `<p><em>c</em>d</p>`. Every wrapper on the path from the root down to
//! the split point is duplicated on the "after" side so inline context
//! (emphasis, links, list items) survives on both halves.

use super::arena::{Dom, NodeId};
use crate::error::{Error, Result};

/// Split `root` around its strict descendant `split_at`.
///
/// Afterwards `split_at` is a sibling immediately following the "before"
/// half, and the returned node (if any) is the "after" half immediately
/// following `split_at`. Content is only ever moved, never dropped.
///
/// Empty halves are removed: wrappers left empty on the before side are
/// pruned, and an empty after side is discarded (returns `None`). When
/// nothing precedes `split_at`, the after content is folded back into
/// `root` itself, which is then placed after `split_at` and returned, so
/// handles to `root` stay meaningful.
pub fn split(dom: &mut Dom, root: NodeId, split_at: NodeId) -> Result<Option<NodeId>> {
    if root == split_at {
        return Err(Error::InvalidSplit {
            node: dom.describe(root),
            message: "cannot split a node at itself".to_string(),
        });
    }
    if !dom.is_ancestor_of(root, split_at) {
        return Err(Error::NotDescendant {
            root: dom.describe(root),
            node: dom.describe(split_at),
        });
    }
    if dom.parent(root).is_none() {
        return Err(Error::InvalidSplit {
            node: dom.describe(root),
            message: "split root has no parent".to_string(),
        });
    }

    // Bottom-up: copy each ancestor and move the suffix after the split path into it
    let mut after: Option<NodeId> = None;
    let mut current = split_at;
    while current != root {
        let Some(parent) = dom.parent(current) else {
            break;
        };
        let Some(copy) = dom.shallow_clone(parent) else {
            break;
        };
        if let Some(lower) = after
            && dom.has_children(lower)
        {
            dom.append(copy, lower);
        }
        while let Some(next) = dom.next_sibling(current) {
            dom.append(copy, next);
        }
        after = Some(copy);
        current = parent;
    }

    let old_parent = dom.parent(split_at);
    dom.insert_after(root, split_at);

    // Wrappers that only held the split path are now empty
    let mut prune = old_parent;
    while let Some(node) = prune {
        if node == root || dom.has_children(node) {
            break;
        }
        prune = dom.parent(node);
        dom.detach(node);
    }

    let after = after.filter(|&a| dom.has_children(a));

    if dom.has_children(root) {
        if let Some(after) = after {
            dom.insert_after(split_at, after);
        }
        return Ok(after);
    }

    match after {
        Some(after) => {
            dom.move_children(after, root);
            dom.insert_after(split_at, root);
            Ok(Some(root))
        }
        None => {
            dom.detach(root);
            Ok(None)
        }
    }
}
