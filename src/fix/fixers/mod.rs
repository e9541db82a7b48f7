//! Built-in fixers.
//!
//! Each fixer is a small rewrite applied to one matched node. Rule files
//! refer to them by name:
//!
//! | Name | Parameters | Effect |
//! | --- | --- | --- |
//! | `unwrap` | `separator`? | replace the node with its children, fencing them off from neighbouring content with a `separator` element |
//! | `detach` | | remove the node and its subtree |
//! | `retype` | `to` | re-tag the node as another subtype |
//! | `wrap` | `in` | wrap the node and the run of siblings its parent does not admit |
//! | `strip-whitespace` | | drop whitespace-only text children |
//! | `split-nesting` | | hoist an illegally nested node out by splitting its ancestors |
//! | `merge-siblings` | `attr` | merge the node with following siblings of the same kind |
//! | `fuse-lists` | | fuse adjacent lists into one |
//! | `flatten-list` | | fold a nested list into its parent list |
//! | `list-levels` | | derive a list's level from its items |
//! | `rename-attr` | `from`, `to` | move an attribute value to a new name |
//! | `set-attr` | `attr`, `value` | set an attribute |

mod lists;
mod merge;
mod nesting;
mod structure;
mod wrap;

pub use lists::LEVELS_MARKER;

use super::registry::{Fix, FixerRegistry};

pub(crate) fn register_builtins(registry: &mut FixerRegistry) {
    registry.register("unwrap", |params, _| {
        Ok(Box::new(structure::Unwrap {
            separator: params.optional_subtype("separator")?,
        }) as Box<dyn Fix>)
    });
    registry.register("detach", |_, _| Ok(Box::new(structure::Detach) as Box<dyn Fix>));
    registry.register("retype", |params, _| {
        Ok(Box::new(structure::Retype {
            to: params.subtype("to")?,
        }) as Box<dyn Fix>)
    });
    registry.register("strip-whitespace", |_, _| {
        Ok(Box::new(structure::StripWhitespace) as Box<dyn Fix>)
    });
    registry.register("rename-attr", |params, namespaces| {
        Ok(Box::new(structure::RenameAttr {
            from: params.attribute("from", namespaces)?,
            to: params.attribute("to", namespaces)?,
        }) as Box<dyn Fix>)
    });
    registry.register("set-attr", |params, namespaces| {
        Ok(Box::new(structure::SetAttr {
            attr: params.attribute("attr", namespaces)?,
            value: params.require("value")?.to_string(),
        }) as Box<dyn Fix>)
    });
    registry.register("wrap", |params, _| {
        Ok(Box::new(wrap::WrapRun {
            wrapper: params.subtype("in")?,
        }) as Box<dyn Fix>)
    });
    registry.register("split-nesting", |_, _| {
        Ok(Box::new(nesting::SplitNesting) as Box<dyn Fix>)
    });
    registry.register("merge-siblings", |params, namespaces| {
        Ok(Box::new(merge::MergeSiblings {
            attr: params.attribute("attr", namespaces)?,
        }) as Box<dyn Fix>)
    });
    registry.register("fuse-lists", |_, _| Ok(Box::new(lists::FuseLists) as Box<dyn Fix>));
    registry.register("flatten-list", |_, _| {
        Ok(Box::new(lists::FlattenList) as Box<dyn Fix>)
    });
    registry.register("list-levels", |_, _| Ok(Box::new(lists::ListLevels) as Box<dyn Fix>));
}
