//! Node predicates for fixer rules.
//!
//! A [`Matcher`] is a pure function of a node and its surroundings. Rule
//! files spell matchers as nested XML elements:
//!
//! ```xml
//! <all>
//!   <type core="CONTAINER" subtype="LIST"/>
//!   <not><descendant><type core="CONTAINER" subtype="LIST"/></descendant></not>
//! </all>
//! ```

use crate::bbx::{self, CoreType, NamespaceTable, SubType, BBX_NS};
use crate::dom::{Dom, NodeId, QName};
use crate::error::{Error, Result};
use crate::util::is_xml_whitespace;

/// A predicate over a node.
///
/// Equality is structural, which is what the duplicate-rule check in
/// [`FixerMap`](super::FixerMap) compares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// Element of the given core type.
    Core(CoreType),
    /// Element of exactly this subtype.
    Type(SubType),
    /// Element with this namespaced name.
    Name(QName),
    /// Element carrying an attribute, optionally with a specific value.
    Attr { name: QName, value: Option<String> },
    /// Text node; `Some(true)` only whitespace, `Some(false)` only with content.
    Text { whitespace: Option<bool> },
    /// Element with no children.
    Empty,
    /// Element with a direct text child holding non-whitespace content.
    TextChild,
    /// Canonical element whose canonical parent does not admit it.
    IllegalNesting,
    /// Element whose next sibling (ignoring whitespace) has the same name,
    /// type and value for this attribute.
    SameAsNext(QName),
    Parent(Box<Matcher>),
    Ancestor(Box<Matcher>),
    Child(Box<Matcher>),
    Descendant(Box<Matcher>),
    /// Next sibling, skipping whitespace-only text and comments.
    Next(Box<Matcher>),
    Not(Box<Matcher>),
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
}

impl Matcher {
    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        match self {
            Matcher::Core(core) => bbx::is_core(dom, node, *core),
            Matcher::Type(ty) => bbx::is_a(dom, node, *ty),
            Matcher::Name(name) => dom
                .element_name(node)
                .is_some_and(|n| n.is(name.ns.as_deref(), &name.local)),
            Matcher::Attr { name, value } => dom
                .attr(node, name.ns.as_deref(), &name.local)
                .is_some_and(|v| value.as_deref().is_none_or(|expected| v == expected)),
            Matcher::Text { whitespace } => match dom.text(node) {
                Some(text) => whitespace.is_none_or(|ws| is_xml_whitespace(text) == ws),
                None => false,
            },
            Matcher::Empty => dom.is_element(node) && !dom.has_children(node),
            Matcher::TextChild => dom
                .children(node)
                .any(|c| dom.text(c).is_some_and(|t| !is_xml_whitespace(t))),
            Matcher::IllegalNesting => {
                let Some(ty) = bbx::type_of(dom, node) else {
                    return false;
                };
                dom.parent(node)
                    .and_then(|p| bbx::type_of(dom, p))
                    .is_some_and(|parent| !bbx::is_valid_child(parent, ty))
            }
            Matcher::SameAsNext(attr) => {
                let (Some(elem), Some(next)) = (dom.element(node), next_significant(dom, node))
                else {
                    return false;
                };
                let Some(next_elem) = dom.element(next) else {
                    return false;
                };
                let ns = attr.ns.as_deref();
                elem.name.is(next_elem.name.ns.as_deref(), &next_elem.name.local)
                    && bbx::type_of(dom, node) == bbx::type_of(dom, next)
                    && elem.attr(ns, &attr.local).is_some()
                    && elem.attr(ns, &attr.local) == next_elem.attr(ns, &attr.local)
            }
            Matcher::Parent(inner) => dom.parent(node).is_some_and(|p| inner.matches(dom, p)),
            Matcher::Ancestor(inner) => dom.ancestors(node).any(|a| inner.matches(dom, a)),
            Matcher::Child(inner) => dom.children(node).any(|c| inner.matches(dom, c)),
            Matcher::Descendant(inner) => dom.descendants(node).any(|d| inner.matches(dom, d)),
            Matcher::Next(inner) => {
                next_significant(dom, node).is_some_and(|n| inner.matches(dom, n))
            }
            Matcher::Not(inner) => !inner.matches(dom, node),
            Matcher::All(all) => all.iter().all(|m| m.matches(dom, node)),
            Matcher::Any(any) => any.iter().any(|m| m.matches(dom, node)),
        }
    }

    /// Build a matcher from its rule-file element.
    pub fn from_element(dom: &Dom, node: NodeId, namespaces: &NamespaceTable) -> Result<Self> {
        let Some(name) = dom.element_name(node) else {
            return Err(load_error(dom, node, "expected a matcher element"));
        };
        let attr = |key: &str| dom.attr(node, None, key);
        let require = |key: &str| {
            attr(key).ok_or_else(|| {
                load_error(dom, node, &format!("<{}> needs a '{key}' attribute", name.local))
            })
        };

        let matcher = match name.local.as_str() {
            "type" => {
                let core: CoreType = require("core")?
                    .parse()
                    .map_err(|e: String| load_error(dom, node, &e))?;
                match attr("subtype") {
                    Some(sub) => Matcher::Type(SubType::from_parts(core, sub).ok_or_else(
                        || load_error(dom, node, &format!("unknown subtype {core}.{sub}")),
                    )?),
                    None => Matcher::Core(core),
                }
            }
            "name" => {
                let local = require("local")?;
                let ns = match attr("ns") {
                    Some(prefix) => Some(namespaces.uri(prefix).ok_or_else(|| {
                        load_error(dom, node, &format!("unknown namespace prefix '{prefix}'"))
                    })?),
                    None => Some(BBX_NS),
                };
                Matcher::Name(QName::new(ns, local))
            }
            "attr" => Matcher::Attr {
                name: attribute_name(namespaces, require("name")?)?,
                value: attr("value").map(str::to_string),
            },
            "text" => Matcher::Text {
                whitespace: match attr("whitespace") {
                    None => None,
                    Some("true") => Some(true),
                    Some("false") => Some(false),
                    Some(other) => {
                        return Err(load_error(
                            dom,
                            node,
                            &format!("whitespace must be true or false, found '{other}'"),
                        ));
                    }
                },
            },
            "empty" => Matcher::Empty,
            "textChild" => Matcher::TextChild,
            "illegalNesting" => Matcher::IllegalNesting,
            "sameAsNext" => Matcher::SameAsNext(attribute_name(namespaces, require("attr")?)?),
            "parent" | "ancestor" | "child" | "descendant" | "next" | "not" => {
                let inner = Box::new(single_child(dom, node, namespaces)?);
                match name.local.as_str() {
                    "parent" => Matcher::Parent(inner),
                    "ancestor" => Matcher::Ancestor(inner),
                    "child" => Matcher::Child(inner),
                    "descendant" => Matcher::Descendant(inner),
                    "next" => Matcher::Next(inner),
                    _ => Matcher::Not(inner),
                }
            }
            "all" | "any" => {
                let parts = dom
                    .children(node)
                    .filter(|&c| dom.is_element(c))
                    .map(|c| Matcher::from_element(dom, c, namespaces))
                    .collect::<Result<Vec<_>>>()?;
                if parts.is_empty() {
                    return Err(load_error(dom, node, "needs at least one matcher"));
                }
                if name.local == "all" {
                    Matcher::All(parts)
                } else {
                    Matcher::Any(parts)
                }
            }
            other => return Err(load_error(dom, node, &format!("unknown matcher <{other}>"))),
        };
        Ok(matcher)
    }
}

/// Attribute names are namespace-less unless prefixed.
fn attribute_name(namespaces: &NamespaceTable, qualified: &str) -> Result<QName> {
    let name = namespaces.resolve(qualified, None)?;
    // Prefix hints do not take part in matcher equality
    Ok(QName::new(name.ns.as_deref(), &name.local))
}

fn single_child(dom: &Dom, node: NodeId, namespaces: &NamespaceTable) -> Result<Matcher> {
    let mut children = dom.children(node).filter(|&c| dom.is_element(c));
    match (children.next(), children.next()) {
        (Some(child), None) => Matcher::from_element(dom, child, namespaces),
        _ => Err(load_error(dom, node, "needs exactly one matcher")),
    }
}

fn load_error(dom: &Dom, node: NodeId, message: &str) -> Error {
    Error::Config(format!("{message} at {}", dom.describe(node)))
}

/// Next sibling that is not whitespace-only text or a comment.
pub(crate) fn next_significant(dom: &Dom, node: NodeId) -> Option<NodeId> {
    let mut current = dom.next_sibling(node);
    while let Some(sibling) = current {
        let skip = dom.is_comment(sibling) || dom.text(sibling).is_some_and(is_xml_whitespace);
        if !skip {
            return Some(sibling);
        }
        current = dom.next_sibling(sibling);
    }
    None
}
