//! Arena tree to XML serialization.
//!
//! Namespace declarations are not stored in the tree, so the writer
//! regenerates them: each element declares whatever bindings its own name
//! and attributes need that are not already in scope, preferring the prefix
//! hint carried on the [`QName`].

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::arena::{Dom, NodeData, NodeId, QName};
use crate::error::Result;

/// Serialize the whole document (with XML declaration) to a string.
pub fn to_string(dom: &Dom) -> Result<String> {
    let mut out = Vec::new();
    write_to(dom, &mut out)?;
    Ok(String::from_utf8(out)?)
}

/// Serialize the whole document (with XML declaration) to a writer.
pub fn write_to<W: Write>(dom: &Dom, out: W) -> Result<()> {
    let mut writer = Writer::new(out);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.get_mut().write_all(b"\n")?;
    for child in dom.children(dom.document()) {
        write_node(dom, child, &mut writer)?;
    }
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

/// Serialize a single subtree to a string, without an XML declaration.
pub fn subtree_to_string(dom: &Dom, id: NodeId) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(dom, id, &mut writer)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

/// In-scope namespace bindings; `None` prefix is the default namespace.
#[derive(Default)]
struct Scopes {
    frames: Vec<Vec<(Option<String>, Option<String>)>>,
    generated: usize,
}

impl Scopes {
    fn lookup(&self, prefix: Option<&str>) -> Option<Option<&str>> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_deref())
    }

    /// Namespace of the default binding (`None` when undeclared or reset).
    fn default_ns(&self) -> Option<&str> {
        self.lookup(None).flatten()
    }

    fn prefix_for(&self, ns: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .filter_map(|(p, uri)| match (p, uri) {
                (Some(p), Some(uri)) if uri == ns => Some(p.as_str()),
                _ => None,
            })
            .find(|p| self.lookup(Some(*p)) == Some(Some(ns)))
    }

    fn fresh_prefix(&mut self) -> String {
        loop {
            self.generated += 1;
            let candidate = format!("ns{}", self.generated);
            if self.lookup(Some(candidate.as_str())).is_none() {
                return candidate;
            }
        }
    }
}

enum Step {
    Open(NodeId),
    Close(String),
}

fn write_node<W: Write>(dom: &Dom, id: NodeId, writer: &mut Writer<W>) -> Result<()> {
    let mut scopes = Scopes::default();
    let mut stack = vec![Step::Open(id)];

    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Close(name) => {
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                scopes.frames.pop();
                continue;
            }
            Step::Open(node) => node,
        };

        match dom.data(node) {
            Some(NodeData::Element(elem)) => {
                let mut frame: Vec<(Option<String>, Option<String>)> = Vec::new();
                let tag = element_tag(&elem.name, &scopes, &mut frame);

                let mut attrs: Vec<(String, &str)> = Vec::new();
                for attr in &elem.attrs {
                    let key = attribute_key(&attr.name, &mut scopes, &mut frame);
                    attrs.push((key, attr.value.as_str()));
                }

                let mut start = BytesStart::new(tag.clone());
                for (prefix, uri) in &frame {
                    let key = match prefix {
                        Some(p) => format!("xmlns:{p}"),
                        None => "xmlns".to_string(),
                    };
                    start.push_attribute((key.as_str(), uri.as_deref().unwrap_or("")));
                }
                for (key, value) in &attrs {
                    start.push_attribute((key.as_str(), *value));
                }

                if dom.has_children(node) {
                    writer.write_event(Event::Start(start))?;
                    scopes.frames.push(frame);
                    stack.push(Step::Close(tag));
                    let children: Vec<_> = dom.children(node).collect();
                    stack.extend(children.into_iter().rev().map(Step::Open));
                } else {
                    writer.write_event(Event::Empty(start))?;
                }
            }
            Some(NodeData::Text(text)) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            Some(NodeData::Comment(text)) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
            }
            Some(NodeData::Document) => {
                let children: Vec<_> = dom.children(node).collect();
                stack.extend(children.into_iter().rev().map(Step::Open));
            }
            None => {}
        }
    }

    Ok(())
}

/// Qualified tag for an element, recording any declaration it needs in `frame`.
fn element_tag(
    name: &QName,
    scopes: &Scopes,
    frame: &mut Vec<(Option<String>, Option<String>)>,
) -> String {
    match (&name.ns, &name.prefix) {
        (Some(ns), Some(prefix)) => match scopes.lookup(Some(prefix.as_str())) {
            Some(Some(uri)) if uri == ns.as_str() => format!("{prefix}:{}", name.local),
            None => {
                frame.push((Some(prefix.clone()), Some(ns.clone())));
                format!("{prefix}:{}", name.local)
            }
            // Hint is bound to another namespace here; use the default namespace
            Some(_) => {
                if scopes.default_ns() != Some(ns.as_str()) {
                    frame.push((None, Some(ns.clone())));
                }
                name.local.clone()
            }
        },
        (Some(ns), None) => {
            if scopes.default_ns() != Some(ns.as_str()) {
                frame.push((None, Some(ns.clone())));
            }
            name.local.clone()
        }
        (None, _) => {
            if scopes.default_ns().is_some() {
                frame.push((None, None));
            }
            name.local.clone()
        }
    }
}

/// Qualified key for an attribute, recording any declaration it needs in `frame`.
fn attribute_key(
    name: &QName,
    scopes: &mut Scopes,
    frame: &mut Vec<(Option<String>, Option<String>)>,
) -> String {
    let Some(ns) = &name.ns else {
        return name.local.clone();
    };

    // Already declared on this element
    if let Some((Some(p), _)) = frame
        .iter()
        .find(|(p, uri)| p.is_some() && uri.as_deref() == Some(ns.as_str()))
    {
        return format!("{p}:{}", name.local);
    }

    let frame_binds = |frame: &Vec<(Option<String>, Option<String>)>, prefix: &str| {
        frame.iter().any(|(p, _)| p.as_deref() == Some(prefix))
    };

    if let Some(hint) = &name.prefix
        && !frame_binds(frame, hint)
    {
        match scopes.lookup(Some(hint.as_str())) {
            Some(Some(uri)) if uri == ns.as_str() => return format!("{hint}:{}", name.local),
            None => {
                frame.push((Some(hint.clone()), Some(ns.clone())));
                return format!("{hint}:{}", name.local);
            }
            _ => {}
        }
    }

    if let Some(existing) = scopes.prefix_for(ns)
        && !frame_binds(frame, existing)
    {
        return format!("{existing}:{}", name.local);
    }

    let fresh = loop {
        let candidate = scopes.fresh_prefix();
        if !frame_binds(frame, &candidate) {
            break candidate;
        }
    };
    frame.push((Some(fresh.clone()), Some(ns.clone())));
    format!("{fresh}:{}", name.local)
}
