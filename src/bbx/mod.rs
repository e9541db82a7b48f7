//! The canonical BBX document format.
//!
//! A canonical document is a `bbdoc` element with exactly two children: a
//! `head` holding metadata copied from the source, and the book root
//! (`SECTION` with `bb:type="ROOT"`). The declared format version lives in
//! `bb:version` on the document element.

pub mod attrs;
mod element;
mod stats;
mod types;

use std::collections::BTreeMap;

pub use element::{
    assert_is_a, core_of, create, is_a, is_core, is_foreign, nearest_section, transform, type_of,
};
pub use stats::DocumentStats;
pub use types::{
    allows_text, can_transform, is_valid_child, BlockType, ContainerType, CoreType, InlineType,
    SectionType, SpanType, SubType,
};

use crate::dom::{Dom, NodeId, QName};
use crate::error::{Error, Result};

/// Namespace of canonical elements.
pub const BBX_NS: &str = "http://brailleblaster.org/ns/bbx";
/// Namespace of canonical attributes.
pub const BB_NS: &str = "http://brailleblaster.org/ns/bb";
/// Braille rendering namespace (opaque to this crate, except `utd:overrideStyle`).
pub const UTD_NS: &str = "http://brailleblaster.org/ns/utd";
/// Fixer bookkeeping namespace; never survives a fixer run.
pub const FIX_NS: &str = "http://brailleblaster.org/ns/fixer";
pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

pub const BB_PREFIX: &str = "bb";
pub const UTD_PREFIX: &str = "utd";
pub const FIX_PREFIX: &str = "fix";

/// Format version written by this crate.
pub const CURRENT_VERSION: u32 = 3;

pub const DOCUMENT_ELEMENT: &str = "bbdoc";
pub const HEAD_ELEMENT: &str = "head";

/// Prefix → namespace bindings for rule files.
///
/// `bb`, `utd`, `fix` and `m` (MathML) are always bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTable {
    bindings: BTreeMap<String, String>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        let mut bindings = BTreeMap::new();
        bindings.insert(BB_PREFIX.to_string(), BB_NS.to_string());
        bindings.insert(UTD_PREFIX.to_string(), UTD_NS.to_string());
        bindings.insert(FIX_PREFIX.to_string(), FIX_NS.to_string());
        bindings.insert("m".to_string(), MATHML_NS.to_string());
        Self { bindings }
    }
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, prefix: &str, uri: &str) {
        self.bindings.insert(prefix.to_string(), uri.to_string());
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Resolve `prefix:local`. Unprefixed names get `default_ns`.
    pub fn resolve(&self, qualified: &str, default_ns: Option<&str>) -> Result<QName> {
        match qualified.split_once(':') {
            Some((prefix, local)) => {
                let uri = self
                    .uri(prefix)
                    .ok_or_else(|| Error::Config(format!("unknown namespace prefix '{prefix}'")))?;
                Ok(QName::prefixed(uri, prefix, local))
            }
            None => Ok(QName::new(default_ns, qualified)),
        }
    }
}

/// A fresh current-version document: `bbdoc`, an empty head, and an empty book root.
pub fn new_document() -> Dom {
    let mut dom = Dom::new();
    let doc = dom.create_element(QName::new(Some(BBX_NS), DOCUMENT_ELEMENT));
    dom.append(dom.document(), doc);
    let head = dom.create_element(QName::new(Some(BBX_NS), HEAD_ELEMENT));
    dom.append(doc, head);
    let root = create(&mut dom, SubType::ROOT);
    dom.append(doc, root);
    set_format_version(&mut dom, CURRENT_VERSION);
    dom
}

/// The `bbdoc` element, if the document has one.
pub fn document_element(dom: &Dom) -> Option<NodeId> {
    dom.document_element()
        .filter(|&d| dom.element_name(d).is_some_and(|n| n.is(Some(BBX_NS), DOCUMENT_ELEMENT)))
}

/// The head element.
pub fn head(dom: &Dom) -> Option<NodeId> {
    let doc = document_element(dom)?;
    dom.children(doc)
        .find(|&c| dom.element_name(c).is_some_and(|n| n.is(Some(BBX_NS), HEAD_ELEMENT)))
}

/// The book root (`SECTION.ROOT`).
pub fn root_section(dom: &Dom) -> Option<NodeId> {
    let doc = document_element(dom)?;
    dom.children(doc).find(|&c| is_a(dom, c, SubType::ROOT))
}

/// The book root, or a structural error naming the document.
pub fn require_root_section(dom: &Dom) -> Result<NodeId> {
    root_section(dom).ok_or_else(|| {
        let at = dom.document_element().unwrap_or(dom.document());
        Error::structural(dom.describe(at), "document has no SECTION.ROOT book root")
    })
}

/// Declared format version. Documents without a version marker are version 1.
pub fn format_version(dom: &Dom) -> Result<u32> {
    let Some(doc) = dom.document_element() else {
        return Err(Error::structural("/", "document is empty"));
    };
    match dom.attr(doc, Some(BB_NS), "version") {
        None => Ok(1),
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::structural(dom.describe(doc), format!("invalid format version '{raw}'"))
        }),
    }
}

pub fn set_format_version(dom: &mut Dom, version: u32) {
    if let Some(doc) = dom.document_element() {
        dom.set_attr(
            doc,
            QName::prefixed(BB_NS, BB_PREFIX, "version"),
            version.to_string(),
        );
    }
}

/// Infer which format version a tree's structure corresponds to.
///
/// Version 1 documents have no head and mark list nesting with `bb:level`;
/// version 2 documents name styles with `bb:style` and separate emphasis
/// values with commas.
pub fn structural_version(dom: &Dom) -> u32 {
    if head(dom).is_none() {
        return 1;
    }
    let Some(doc) = document_element(dom) else {
        return 1;
    };

    let mut version = CURRENT_VERSION;
    for node in dom.descendants(doc) {
        let Some(elem) = dom.element(node) else {
            continue;
        };
        if elem.attr(Some(BB_NS), "level").is_some() {
            return 1;
        }
        if elem.attr(Some(BB_NS), "style").is_some()
            || elem
                .attr(Some(BB_NS), "emphasis")
                .is_some_and(|e| e.contains(','))
        {
            version = version.min(2);
        }
    }
    version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_str;

    #[test]
    fn test_new_document_shape() {
        let dom = new_document();
        let doc = document_element(&dom).unwrap();
        let children: Vec<_> = dom.children(doc).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(head(&dom), Some(children[0]));
        assert_eq!(root_section(&dom), Some(children[1]));
        assert_eq!(format_version(&dom).unwrap(), CURRENT_VERSION);
        assert_eq!(structural_version(&dom), CURRENT_VERSION);
    }

    #[test]
    fn test_structural_version() {
        let v1 = parse_str(&format!(
            r#"<bbdoc xmlns="{BBX_NS}" xmlns:bb="{BB_NS}"><SECTION bb:type="ROOT"/></bbdoc>"#
        ))
        .unwrap();
        assert_eq!(structural_version(&v1), 1);
        assert_eq!(format_version(&v1).unwrap(), 1);

        let v2 = parse_str(&format!(
            r#"<bbdoc xmlns="{BBX_NS}" xmlns:bb="{BB_NS}" bb:version="2"><head/><SECTION bb:type="ROOT"><BLOCK bb:type="DEFAULT"><INLINE bb:type="EMPHASIS" bb:emphasis="BOLD,ITALIC">x</INLINE></BLOCK></SECTION></bbdoc>"#
        ))
        .unwrap();
        assert_eq!(structural_version(&v2), 2);
        assert_eq!(format_version(&v2).unwrap(), 2);

        let legacy_level = parse_str(&format!(
            r#"<bbdoc xmlns="{BBX_NS}" xmlns:bb="{BB_NS}"><head/><SECTION bb:type="ROOT"><CONTAINER bb:type="LIST" bb:level="1"/></SECTION></bbdoc>"#
        ))
        .unwrap();
        assert_eq!(structural_version(&legacy_level), 1);
    }

    #[test]
    fn test_namespace_table() {
        let mut table = NamespaceTable::new();
        table.declare("dtb", "urn:dtb");

        let name = table.resolve("dtb:p", None).unwrap();
        assert!(name.is(Some("urn:dtb"), "p"));
        assert!(table.resolve("bb:listLevel", None).unwrap().is(Some(BB_NS), "listLevel"));
        assert!(table.resolve("plain", Some(BBX_NS)).unwrap().is(Some(BBX_NS), "plain"));
        assert!(matches!(table.resolve("zz:x", None), Err(Error::Config(_))));
    }
}
