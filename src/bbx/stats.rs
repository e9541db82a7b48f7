//! Summary statistics for a canonical document.

use std::collections::BTreeMap;

use serde::Serialize;

use super::element::{is_foreign, type_of};
use super::{
    document_element, format_version, structural_version, BBX_NS, DOCUMENT_ELEMENT, HEAD_ELEMENT,
};
use crate::dom::Dom;

/// Counts reported by `bbx info`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentStats {
    pub declared_version: Option<u32>,
    pub structural_version: u32,
    pub elements: usize,
    /// Element count per `CORE.SUB` type.
    pub by_type: BTreeMap<String, usize>,
    /// BBX-namespace elements without a resolvable type.
    pub untyped: usize,
    /// Elements in opaque namespaces (braille, MathML), including their descendants.
    pub foreign: usize,
    pub text_chars: usize,
    pub max_depth: usize,
}

impl DocumentStats {
    pub fn collect(dom: &Dom) -> Self {
        let mut stats = DocumentStats {
            declared_version: format_version(dom).ok(),
            structural_version: structural_version(dom),
            ..Default::default()
        };

        let Some(doc) = document_element(dom).or_else(|| dom.document_element()) else {
            return stats;
        };

        let mut stack = vec![(doc, 1usize, false)];
        while let Some((node, depth, in_foreign)) = stack.pop() {
            if let Some(text) = dom.text(node) {
                stats.text_chars += text.chars().count();
                continue;
            }
            let Some(elem) = dom.element(node) else {
                continue;
            };

            stats.elements += 1;
            stats.max_depth = stats.max_depth.max(depth);
            let foreign = in_foreign || is_foreign(&elem.name);
            if foreign {
                stats.foreign += 1;
            } else if let Some(ty) = type_of(dom, node) {
                *stats.by_type.entry(ty.to_string()).or_default() += 1;
            } else if elem.name.ns.as_deref() == Some(BBX_NS)
                && !matches!(elem.name.local.as_str(), DOCUMENT_ELEMENT | HEAD_ELEMENT)
            {
                stats.untyped += 1;
            }

            for child in dom.children(node) {
                stack.push((child, depth + 1, foreign));
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbx::{create, new_document, root_section, SubType, CURRENT_VERSION};

    #[test]
    fn test_collect() {
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        let text = dom.create_text("hello");
        dom.append(root, block);
        dom.append(block, text);

        let stats = DocumentStats::collect(&dom);
        assert_eq!(stats.declared_version, Some(CURRENT_VERSION));
        assert_eq!(stats.by_type.get("BLOCK.DEFAULT"), Some(&1));
        assert_eq!(stats.by_type.get("SECTION.ROOT"), Some(&1));
        // bbdoc, head, root, block
        assert_eq!(stats.elements, 4);
        assert_eq!(stats.untyped, 0);
        assert_eq!(stats.text_chars, 5);
        assert_eq!(stats.max_depth, 3);
    }
}
