//! Source-format mapping tables.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bbx::attrs::AttrKind;
use crate::bbx::{NamespaceTable, SubType};
use crate::dom::{parse_str, Dom, NodeId, QName};
use crate::error::{Error, Result};

const NIMAS_MAP: &str = include_str!("../../rules/nimas.xml");
const EPUB_MAP: &str = include_str!("../../rules/epub.xml");

/// DTBook namespace used by NIMAS source files.
pub const DTBOOK_NS: &str = "http://www.daisy.org/z3986/2005/dtbook/";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Source document formats with a built-in mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Nimas,
    Epub,
}

impl SourceFormat {
    pub fn name(self) -> &'static str {
        match self {
            SourceFormat::Nimas => "nimas",
            SourceFormat::Epub => "epub",
        }
    }

    /// Guess the format from the source tree's document element namespace.
    pub fn detect(dom: &Dom) -> Option<Self> {
        let root = dom.document_element()?;
        match dom.element_name(root)?.ns.as_deref() {
            Some(DTBOOK_NS) => Some(SourceFormat::Nimas),
            Some(XHTML_NS) => Some(SourceFormat::Epub),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nimas" => Ok(SourceFormat::Nimas),
            "epub" => Ok(SourceFormat::Epub),
            other => Err(Error::Config(format!("unknown source format '{other}'"))),
        }
    }
}

/// What the parser does with a source element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAction {
    /// Create the canonical element and translate the children into it.
    Element,
    /// Create the canonical element and place the source subtree inside it verbatim.
    Copy,
    /// Translate the children in place of the element.
    Unwrap,
    /// Drop the element and its subtree.
    Skip,
}

/// Where a copied attribute value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    Attr(QName),
    /// The element's trimmed text content.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub action: MapAction,
    pub to: Option<SubType>,
    pub set: Vec<(QName, String)>,
    pub copy: Vec<(QName, CopySource)>,
}

type NameKey = (Option<String>, String);

fn key(name: &QName) -> NameKey {
    (name.ns.clone(), name.local.clone())
}

/// Mapping from source element names to canonical constructors.
#[derive(Debug, Clone)]
pub struct ParserMap {
    pub format: SourceFormat,
    namespaces: NamespaceTable,
    head: Option<QName>,
    body: QName,
    mappings: HashMap<NameKey, Mapping>,
}

impl ParserMap {
    /// The table shipped with the crate for a format.
    pub fn builtin(format: SourceFormat) -> Result<Self> {
        match format {
            SourceFormat::Nimas => Self::from_xml(NIMAS_MAP),
            SourceFormat::Epub => Self::from_xml(EPUB_MAP),
        }
    }

    /// Load a `<parserMap>` document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let dom = parse_str(xml)?;
        let Some(root) = dom.document_element() else {
            return Err(Error::Config("empty parser map".into()));
        };
        if !dom.element_name(root).is_some_and(|n| n.is(None, "parserMap")) {
            return Err(Error::Config("parser map must have a <parserMap> root".into()));
        }
        let format: SourceFormat = required(&dom, root, "format")?.parse()?;

        let mut namespaces = NamespaceTable::new();
        let mut head = None;
        let mut body = None;
        let mut mappings = HashMap::new();

        for node in dom.children(root).filter(|&c| dom.is_element(c)) {
            let local = dom.element_name(node).map(|n| n.local.clone()).unwrap_or_default();
            match local.as_str() {
                "namespace" => {
                    namespaces.declare(required(&dom, node, "prefix")?, required(&dom, node, "uri")?);
                }
                "head" => head = Some(namespaces.resolve(required(&dom, node, "element")?, None)?),
                "body" => body = Some(namespaces.resolve(required(&dom, node, "element")?, None)?),
                "map" => {
                    let name = namespaces.resolve(required(&dom, node, "element")?, None)?;
                    let mapping = parse_mapping(&dom, node, &namespaces)?;
                    if mappings.insert(key(&name), mapping).is_some() {
                        return Err(Error::Config(format!(
                            "duplicate mapping for <{}>",
                            name.qualified()
                        )));
                    }
                }
                other => {
                    return Err(Error::Config(format!("unexpected <{other}> in parser map")));
                }
            }
        }

        let Some(body) = body else {
            return Err(Error::Config("parser map has no <body> element".into()));
        };
        debug!(%format, mappings = mappings.len(), "loaded parser map");
        Ok(ParserMap {
            format,
            namespaces,
            head,
            body,
            mappings,
        })
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn head_element(&self) -> Option<&QName> {
        self.head.as_ref()
    }

    pub fn body_element(&self) -> &QName {
        &self.body
    }

    pub fn lookup(&self, name: &QName) -> Option<&Mapping> {
        self.mappings.get(&key(name))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn parse_mapping(dom: &Dom, node: NodeId, namespaces: &NamespaceTable) -> Result<Mapping> {
    let action = match dom.attr(node, None, "action") {
        None | Some("element") => MapAction::Element,
        Some("copy") => MapAction::Copy,
        Some("unwrap") => MapAction::Unwrap,
        Some("skip") => MapAction::Skip,
        Some(other) => {
            return Err(Error::Config(format!(
                "unknown action '{other}' at {}",
                dom.describe(node)
            )));
        }
    };

    let to = match dom.attr(node, None, "to") {
        Some(raw) => Some(
            raw.parse::<SubType>()
                .map_err(|e| Error::Config(format!("{e} at {}", dom.describe(node))))?,
        ),
        None => None,
    };
    let creates = matches!(action, MapAction::Element | MapAction::Copy);
    if creates != to.is_some() {
        return Err(Error::Config(format!(
            "'to' is required for element and copy mappings and meaningless otherwise, at {}",
            dom.describe(node)
        )));
    }

    let mut set = Vec::new();
    let mut copy = Vec::new();
    for child in dom.children(node).filter(|&c| dom.is_element(c)) {
        let attr = namespaces.resolve(required(dom, child, "attr")?, None)?;
        if let (Some(ty), Some(kind)) = (to, AttrKind::from_name(attr.ns.as_deref(), &attr.local))
            && !kind.is_legal_for(ty)
        {
            return Err(Error::Config(format!(
                "{} is not legal on {ty}, at {}",
                attr.qualified(),
                dom.describe(child)
            )));
        }

        match dom.element_name(child).map(|n| n.local.as_str()) {
            Some("set") => set.push((attr, required(dom, child, "value")?.to_string())),
            Some("copy") => {
                let source = match required(dom, child, "from")? {
                    "#text" => CopySource::Text,
                    from => CopySource::Attr(namespaces.resolve(from, None)?),
                };
                copy.push((attr, source));
            }
            _ => {
                return Err(Error::Config(format!(
                    "expected <set> or <copy> at {}",
                    dom.describe(child)
                )));
            }
        }
    }

    Ok(Mapping {
        action,
        to,
        set,
        copy,
    })
}

fn required<'a>(dom: &'a Dom, node: NodeId, key: &str) -> Result<&'a str> {
    dom.attr(node, None, key).ok_or_else(|| {
        Error::Config(format!("missing '{key}' attribute at {}", dom.describe(node)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_maps_load() {
        let nimas = ParserMap::builtin(SourceFormat::Nimas).unwrap();
        assert_eq!(nimas.format, SourceFormat::Nimas);
        let p = nimas.lookup(&QName::new(Some(DTBOOK_NS), "p")).unwrap();
        assert_eq!(p.to, Some(SubType::BLOCK_DEFAULT));

        let epub = ParserMap::builtin(SourceFormat::Epub).unwrap();
        assert_eq!(epub.body_element(), &QName::new(Some(XHTML_NS), "body"));
        assert!(epub.lookup(&QName::new(Some(XHTML_NS), "ul")).is_some());
    }

    #[test]
    fn test_rejects_bad_maps() {
        let bad = [
            r#"<parserMap format="rtf"><body element="b"/></parserMap>"#,
            r#"<parserMap format="nimas"/>"#,
            r#"<parserMap format="nimas"><body element="b"/><map element="p"/></parserMap>"#,
            r#"<parserMap format="nimas"><body element="b"/><map element="p" action="skip" to="BLOCK.DEFAULT"/></parserMap>"#,
            r#"<parserMap format="nimas"><body element="b"/>
                <map element="p" to="BLOCK.DEFAULT"/><map element="p" to="BLOCK.STYLE"/></parserMap>"#,
            r#"<parserMap format="nimas"><body element="b"/>
                <map element="p" to="BLOCK.DEFAULT"><set attr="bb:listLevel" value="1"/></map></parserMap>"#,
        ];
        for xml in bad {
            assert!(ParserMap::from_xml(xml).is_err(), "{xml}");
        }
    }

    #[test]
    fn test_detect_format() {
        let dom = parse_str(r#"<dtbook xmlns="http://www.daisy.org/z3986/2005/dtbook/"/>"#).unwrap();
        assert_eq!(SourceFormat::detect(&dom), Some(SourceFormat::Nimas));
        let dom = parse_str(r#"<html xmlns="http://www.w3.org/1999/xhtml"/>"#).unwrap();
        assert_eq!(SourceFormat::detect(&dom), Some(SourceFormat::Epub));
        let dom = parse_str("<doc/>").unwrap();
        assert_eq!(SourceFormat::detect(&dom), None);
    }
}
