//! Ordered fixer rule catalogues loaded from XML.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use super::matcher::Matcher;
use super::registry::{Fix, FixerRegistry, Params};
use crate::bbx::NamespaceTable;
use crate::dom::{parse_str, Dom, NodeId};
use crate::error::{Error, Result};

const BUILTIN_FIXERS: &str = include_str!("../../rules/fixer.xml");

/// One rule: a matcher and the fix applied to every node it selects.
pub struct FixerEntry {
    pub name: String,
    /// Registry name of the fixer, for reports.
    pub fixer: String,
    pub matcher: Matcher,
    pub fix: Box<dyn Fix>,
}

impl fmt::Debug for FixerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixerEntry")
            .field("name", &self.name)
            .field("fixer", &self.fixer)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// An ordered list of rules plus the namespace table their matchers were
/// resolved against.
///
/// No two rules may carry structurally equal matchers.
#[derive(Debug, Default)]
pub struct FixerMap {
    namespaces: NamespaceTable,
    entries: Vec<FixerEntry>,
    seen: HashSet<Matcher>,
}

impl FixerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The general-purpose rules shipped with the crate.
    pub fn builtin(registry: &FixerRegistry) -> Result<Self> {
        Self::from_xml(BUILTIN_FIXERS, registry)
    }

    /// Load a `<fixerMap>` document.
    ///
    /// ```xml
    /// <fixerMap>
    ///   <namespace prefix="m" uri="http://www.w3.org/1998/Math/MathML"/>
    ///   <rule name="items-in-lists" fixer="retype" to="BLOCK.LIST_ITEM">
    ///     <all>
    ///       <type core="BLOCK" subtype="DEFAULT"/>
    ///       <parent><type core="CONTAINER" subtype="LIST"/></parent>
    ///     </all>
    ///   </rule>
    /// </fixerMap>
    /// ```
    ///
    /// Every attribute of `<rule>` other than `name` and `fixer` is passed
    /// to the fixer's constructor as a parameter.
    pub fn from_xml(xml: &str, registry: &FixerRegistry) -> Result<Self> {
        let dom = parse_str(xml)?;
        let Some(root) = dom.document_element() else {
            return Err(Error::Config("empty fixer map".into()));
        };
        if !dom.element_name(root).is_some_and(|n| n.is(None, "fixerMap")) {
            return Err(Error::Config("fixer map must have a <fixerMap> root".into()));
        }

        let mut map = FixerMap::new();
        for node in dom.children(root).filter(|&c| dom.is_element(c)) {
            let local = dom.element_name(node).map(|n| n.local.as_str());
            match local {
                Some("namespace") => {
                    let prefix = required(&dom, node, "prefix")?;
                    let uri = required(&dom, node, "uri")?;
                    map.namespaces.declare(prefix, uri);
                }
                Some("rule") => {
                    let entry = parse_rule(&dom, node, &map.namespaces, registry)?;
                    map.push(entry)?;
                }
                _ => {
                    return Err(Error::Config(format!(
                        "unexpected element at {}",
                        dom.describe(node)
                    )));
                }
            }
        }

        debug!(rules = map.entries.len(), "loaded fixer map");
        Ok(map)
    }

    /// Append a rule, rejecting a matcher already present.
    pub fn push(&mut self, entry: FixerEntry) -> Result<()> {
        if !self.seen.insert(entry.matcher.clone()) {
            return Err(Error::Config(format!(
                "rule '{}' duplicates the matcher of an earlier rule",
                entry.name
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Convenience for building maps in code.
    pub fn with_rule(mut self, name: &str, matcher: Matcher, fix: impl Fix + 'static) -> Result<Self> {
        self.push(FixerEntry {
            name: name.to_string(),
            fixer: name.to_string(),
            matcher,
            fix: Box::new(fix),
        })?;
        Ok(self)
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn entries(&self) -> &[FixerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_rule(
    dom: &Dom,
    node: NodeId,
    namespaces: &NamespaceTable,
    registry: &FixerRegistry,
) -> Result<FixerEntry> {
    let name = required(dom, node, "name")?;
    let fixer = required(dom, node, "fixer")?;

    let mut params = Params::new(name);
    if let Some(elem) = dom.element(node) {
        for attr in &elem.attrs {
            if attr.name.ns.is_none() && attr.name.local != "name" && attr.name.local != "fixer" {
                params.insert(&attr.name.local, &attr.value);
            }
        }
    }

    let mut matchers = dom.children(node).filter(|&c| dom.is_element(c));
    let matcher = match (matchers.next(), matchers.next()) {
        (Some(m), None) => Matcher::from_element(dom, m, namespaces)?,
        _ => {
            return Err(Error::Config(format!(
                "rule '{name}' needs exactly one matcher"
            )));
        }
    };

    let fix = registry
        .build(fixer, &params, namespaces)
        .map_err(|e| Error::Config(format!("rule '{name}': {e}")))?;

    Ok(FixerEntry {
        name: name.to_string(),
        fixer: fixer.to_string(),
        matcher,
        fix,
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
    use crate::bbx::SubType;
    use crate::fix::FixOutcome;

    #[test]
    fn test_builtin_loads() {
        let registry = FixerRegistry::with_builtins();
        let map = FixerMap::builtin(&registry).unwrap();
        assert!(!map.is_empty());
        assert!(map.entries().iter().all(|e| registry.contains(&e.fixer)));
    }

    #[test]
    fn test_rejects_duplicate_matchers() {
        let registry = FixerRegistry::with_builtins();
        let xml = r#"<fixerMap>
            <rule name="a" fixer="unwrap"><type core="SPAN" subtype="OTHER"/></rule>
            <rule name="b" fixer="detach"><type core="SPAN" subtype="OTHER"/></rule>
        </fixerMap>"#;
        let err = FixerMap::from_xml(xml, &registry).unwrap_err();
        assert!(err.to_string().contains("'b'"), "{err}");
    }

    #[test]
    fn test_rejects_bad_rules() {
        let registry = FixerRegistry::with_builtins();
        let bad = [
            r#"<rules/>"#,
            r#"<fixerMap><rule name="a" fixer="nope"><empty/></rule></fixerMap>"#,
            r#"<fixerMap><rule name="a" fixer="unwrap"/></fixerMap>"#,
            r#"<fixerMap><rule fixer="unwrap"><empty/></rule></fixerMap>"#,
            r#"<fixerMap><rule name="a" fixer="retype"><empty/></rule></fixerMap>"#,
            r#"<fixerMap><rule name="a" fixer="unwrap"><attr name="x:y"/></rule></fixerMap>"#,
        ];
        for xml in bad {
            assert!(matches!(FixerMap::from_xml(xml, &registry), Err(Error::Config(_))), "{xml}");
        }
    }

    #[test]
    fn test_declared_namespace_and_params() {
        let registry = FixerRegistry::with_builtins();
        let xml = r#"<fixerMap>
            <namespace prefix="x" uri="urn:x"/>
            <rule name="mark" fixer="set-attr" attr="x:seen" value="yes">
                <attr name="x:flag"/>
            </rule>
        </fixerMap>"#;
        let map = FixerMap::from_xml(xml, &registry).unwrap();
        assert_eq!(map.namespaces().uri("x"), Some("urn:x"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.entries()[0].fixer, "set-attr");
    }

    #[test]
    fn test_with_rule() {
        let noop = |_: &mut Dom, _: NodeId, _: &crate::fix::FixContext<'_>| -> Result<FixOutcome> {
            Ok(FixOutcome::Applied)
        };
        let map = FixerMap::new()
            .with_rule("noop", Matcher::Type(SubType::LIST), noop)
            .unwrap();
        assert!(map.with_rule("again", Matcher::Type(SubType::LIST), noop).is_err());
    }
}
