//! Namespace-aware XML to arena tree parsing.

use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use tracing::warn;

use super::arena::{Attribute, Dom, NodeId, QName};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, named_entity, resolve_entity, strip_bom};

/// Parse raw document bytes, detecting the encoding from the BOM or XML
/// declaration.
pub fn parse_bytes(bytes: &[u8]) -> Result<Dom> {
    let bytes = strip_bom(bytes);
    let text = decode_text(bytes, extract_xml_encoding(bytes));
    parse_str(&text)
}

/// Parse an XML string into a [`Dom`].
///
/// Element and attribute names are resolved against in-scope namespace
/// declarations; the declarations themselves are not kept as attributes.
/// Adjacent character data (text, entity references, CDATA) is merged into
/// one text node. Processing instructions and the DOCTYPE are dropped.
pub fn parse_str(xml: &str) -> Result<Dom> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut dom = Dom::new();
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        let parent = stack.last().copied().unwrap_or(dom.document());
        match reader.read_event()? {
            Event::Start(e) => {
                let node = create_element(&mut dom, &reader, &e)?;
                dom.append(parent, node);
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = create_element(&mut dom, &reader, &e)?;
                dom.append(parent, node);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(e) => {
                if stack.is_empty() {
                    continue;
                }
                let text = String::from_utf8_lossy(e.as_ref());
                dom.append_text(parent, &text);
            }
            Event::CData(e) => {
                if stack.is_empty() {
                    continue;
                }
                let text = String::from_utf8_lossy(e.as_ref());
                dom.append_text(parent, &text);
            }
            Event::GeneralRef(e) => {
                if stack.is_empty() {
                    continue;
                }
                let entity = String::from_utf8_lossy(e.as_ref());
                match resolve_entity(&entity) {
                    Some(resolved) => dom.append_text(parent, &resolved),
                    None => {
                        // Kept as literal text; it is written back escaped.
                        warn!(entity = %entity, "unknown entity reference kept as text");
                        dom.append_text(parent, &format!("&{entity};"));
                    }
                }
            }
            Event::Comment(e) => {
                let comment = dom.create_comment(String::from_utf8_lossy(e.as_ref()));
                dom.append(parent, comment);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(&open) = stack.last() {
        return Err(Error::InvalidXml(format!(
            "unexpected end of input inside {}",
            dom.describe(open)
        )));
    }
    if dom.document_element().is_none() {
        return Err(Error::InvalidXml("no document element".to_string()));
    }

    Ok(dom)
}

fn create_element(dom: &mut Dom, reader: &NsReader<&[u8]>, e: &BytesStart) -> Result<NodeId> {
    let (resolved, local) = reader.resolve_element(e.name());
    let name = QName {
        ns: namespace_of(resolved),
        prefix: e
            .name()
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
        local: String::from_utf8_lossy(local.as_ref()).into_owned(),
    };

    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let raw = String::from_utf8_lossy(&attr.value);
        attrs.push(Attribute {
            name: QName {
                ns: namespace_of(resolved),
                prefix: attr
                    .key
                    .prefix()
                    .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
                local: String::from_utf8_lossy(local.as_ref()).into_owned(),
            },
            value: unescape_attr(&raw),
        });
    }

    Ok(dom.create_element_with(name, attrs))
}

/// Unescape an attribute value. Values with references we cannot resolve
/// (entities from DTDs that are never loaded) are kept as written.
fn unescape_attr(raw: &str) -> String {
    match unescape_with(raw, named_entity) {
        Ok(value) => value.into_owned(),
        Err(e) => {
            warn!(value = raw, error = %e, "attribute value kept unescaped");
            raw.to_string()
        }
    }
}

fn namespace_of(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_namespaces() {
        let dom = parse_str(
            r#"<doc xmlns="urn:a" xmlns:b="urn:b"><b:item b:kind="x" plain="y"/></doc>"#,
        )
        .unwrap();
        let root = dom.document_element().unwrap();
        assert!(dom.element_name(root).unwrap().is(Some("urn:a"), "doc"));

        let item = dom.first_child(root).unwrap();
        let elem = dom.element(item).unwrap();
        assert!(elem.name.is(Some("urn:b"), "item"));
        assert_eq!(elem.name.prefix.as_deref(), Some("b"));
        // Namespace declarations are not attributes
        assert_eq!(elem.attrs.len(), 2);
        assert_eq!(elem.attr(Some("urn:b"), "kind"), Some("x"));
        // Unprefixed attributes are in no namespace
        assert_eq!(elem.attr(None, "plain"), Some("y"));
    }

    #[test]
    fn test_text_and_entities_merge() {
        let dom = parse_str("<p>a &amp; b&#x21;<![CDATA[<c>]]></p>").unwrap();
        let p = dom.document_element().unwrap();
        assert_eq!(dom.child_count(p), 1);
        assert_eq!(dom.text(dom.first_child(p).unwrap()), Some("a & b!<c>"));
    }

    #[test]
    fn test_unknown_entity_kept() {
        let dom = parse_str("<p>x&mdash;y</p>").unwrap();
        let p = dom.document_element().unwrap();
        assert_eq!(dom.text_content(p), "x&mdash;y");
    }

    #[test]
    fn test_attribute_unescape() {
        let dom = parse_str(r#"<a href="x?a=1&amp;b=2"/>"#).unwrap();
        let a = dom.document_element().unwrap();
        assert_eq!(dom.attr(a, None, "href"), Some("x?a=1&b=2"));

        let dom = parse_str(r#"<a title="&#x41;&#66;&nbsp;" alt="&mdash; kept"/>"#).unwrap();
        let a = dom.document_element().unwrap();
        assert_eq!(dom.attr(a, None, "title"), Some("AB\u{a0}"));
        assert_eq!(dom.attr(a, None, "alt"), Some("&mdash; kept"));
    }

    #[test]
    fn test_comments_kept() {
        let dom = parse_str("<p><!-- note -->text</p>").unwrap();
        let p = dom.document_element().unwrap();
        let first = dom.first_child(p).unwrap();
        assert!(dom.is_comment(first));
    }

    #[test]
    fn test_rejects_unclosed() {
        assert!(parse_str("<p><b>text</b>").is_err());
        assert!(parse_str("").is_err());
    }

    #[test]
    fn test_parse_bytes_latin1() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><p>caf\xE9</p>";
        let dom = parse_bytes(bytes).unwrap();
        let p = dom.document_element().unwrap();
        assert_eq!(dom.text_content(p), "caf\u{e9}");
    }
}
