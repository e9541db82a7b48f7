//! Parser stage: one pass from a source tree to a raw canonical tree.
//!
//! Each source element is looked up in a [`ParserMap`] and either becomes a
//! canonical element, is copied verbatim inside one, is unwrapped, or is
//! dropped. The result usually breaks nesting rules (a DTBook `<p>` may hold
//! a `<list>`); the fixer engine cleans that up afterwards.

mod map;

pub use map::{CopySource, MapAction, Mapping, ParserMap, SourceFormat, DTBOOK_NS, XHTML_NS};

use tracing::{debug, warn};

use crate::bbx;
use crate::dom::{Dom, NodeId, QName};
use crate::error::{Error, Result};

/// Translates source trees with one mapping table.
#[derive(Debug, Clone, Copy)]
pub struct Parser<'a> {
    map: &'a ParserMap,
    strict: bool,
}

impl<'a> Parser<'a> {
    pub fn new(map: &'a ParserMap) -> Self {
        Self { map, strict: false }
    }

    /// Fail on unmapped source elements instead of unwrapping them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Build a fresh current-version canonical document from `src`.
    ///
    /// The source head (if the map names one) is copied verbatim into the
    /// canonical head; the body's content becomes the book root's content.
    pub fn translate(&self, src: &Dom) -> Result<Dom> {
        let Some(src_root) = src.document_element() else {
            return Err(Error::structural("/", "source document is empty"));
        };
        let body = find_element(src, src_root, self.map.body_element()).ok_or_else(|| {
            Error::structural(
                src.describe(src_root),
                format!("no <{}> element", self.map.body_element().qualified()),
            )
        })?;

        let mut out = bbx::new_document();
        let book = bbx::require_root_section(&out)?;

        if let Some(head_name) = self.map.head_element()
            && let Some(src_head) = find_element(src, src_root, head_name)
            && let Some(out_head) = bbx::head(&out)
        {
            for child in src.children(src_head) {
                if let Some(copy) = out.import(src, child) {
                    out.append(out_head, copy);
                }
            }
        }

        let mut unmapped = 0usize;
        let mut stack: Vec<(NodeId, NodeId)> = src
            .children(body)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|c| (c, book))
            .collect();

        while let Some((node, parent)) = stack.pop() {
            if let Some(text) = src.text(node) {
                out.append_text(parent, text);
                continue;
            }
            let Some(name) = src.element_name(node) else {
                if let Some(copy) = out.import(src, node) {
                    out.append(parent, copy);
                }
                continue;
            };

            let (action, target) = match self.map.lookup(name) {
                Some(mapping) => (mapping.action, Some(mapping)),
                None => {
                    let path = src.describe(node);
                    if self.strict {
                        return Err(Error::Parse {
                            node: path.clone(),
                            source: Box::new(Error::UnresolvedMapping {
                                element: name.qualified(),
                                node: path,
                            }),
                        });
                    }
                    warn!(element = %name.qualified(), node = %path, "no mapping; unwrapping");
                    unmapped += 1;
                    (MapAction::Unwrap, None)
                }
            };

            let children_parent = match (action, target) {
                (MapAction::Skip, _) => continue,
                (MapAction::Unwrap, _) => parent,
                (MapAction::Element | MapAction::Copy, Some(mapping)) => {
                    let created = self.create(&mut out, src, node, mapping)?;
                    out.append(parent, created);
                    if action == MapAction::Copy {
                        if let Some(copy) = out.import(src, node) {
                            out.append(created, copy);
                        }
                        continue;
                    }
                    created
                }
                (MapAction::Element | MapAction::Copy, None) => parent,
            };

            let children: Vec<_> = src.children(node).collect();
            for child in children.into_iter().rev() {
                stack.push((child, children_parent));
            }
        }

        debug!(
            format = %self.map.format,
            nodes = out.node_count(),
            unmapped,
            "translated source document"
        );
        Ok(out)
    }

    fn create(&self, out: &mut Dom, src: &Dom, node: NodeId, mapping: &Mapping) -> Result<NodeId> {
        let Some(to) = mapping.to else {
            return Err(Error::Config(format!(
                "mapping for {} creates no element",
                src.describe(node)
            )));
        };
        let created = bbx::create(out, to);

        if let Some(id) = src.attr(node, None, "id") {
            out.set_attr(created, QName::new(None, "id"), id);
        }
        for (attr, value) in &mapping.set {
            out.set_attr(created, attr.clone(), value.as_str());
        }
        for (attr, source) in &mapping.copy {
            let value = match source {
                CopySource::Attr(from) => src
                    .attr(node, from.ns.as_deref(), &from.local)
                    .map(str::to_string),
                CopySource::Text => Some(src.text_content(node).trim().to_string()),
            };
            if let Some(value) = value {
                out.set_attr(created, attr.clone(), value);
            }
        }
        Ok(created)
    }
}

/// `root` itself or its first descendant with this name.
fn find_element(dom: &Dom, root: NodeId, name: &QName) -> Option<NodeId> {
    let matches = |n: NodeId| {
        dom.element_name(n)
            .is_some_and(|e| e.is(name.ns.as_deref(), &name.local))
    };
    if matches(root) {
        return Some(root);
    }
    dom.descendants(root).find(|&n| matches(n))
}
