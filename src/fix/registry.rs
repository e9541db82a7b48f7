//! The [`Fix`] trait and the name → constructor registry rule files use.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use super::fixers;
use crate::bbx::{NamespaceTable, SubType};
use crate::dom::{Dom, NodeId, QName};
use crate::error::{Error, Result};
use crate::styles::StyleDefs;

/// Result of applying a fix to a matched node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// The tree was changed.
    Applied,
    /// The fixer declined this node (lenient mode only); the engine will not
    /// offer it to the same rule again.
    Skipped(String),
}

/// Shared, read-only state available to every fixer.
#[derive(Debug, Clone, Copy)]
pub struct FixContext<'a> {
    pub styles: &'a StyleDefs,
    pub strict: bool,
}

impl FixContext<'_> {
    /// Report a node shape the fixer has no rewrite for.
    ///
    /// Strict mode fails with a structural violation; lenient mode logs and
    /// skips the node.
    pub fn unhandled(&self, dom: &Dom, node: NodeId, message: &str) -> Result<FixOutcome> {
        let path = dom.describe(node);
        if self.strict {
            return Err(Error::structural(path, message));
        }
        warn!(node = %path, "{message}; leaving as is");
        Ok(FixOutcome::Skipped(message.to_string()))
    }
}

/// A tree rewrite applied to a matched node.
///
/// A fix must leave the node in a state where the rule's matcher no longer
/// selects it (or move it), otherwise the engine reports a
/// non-terminating rewrite.
pub trait Fix: Send + Sync {
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome>;
}

impl<F> Fix for F
where
    F: Fn(&mut Dom, NodeId, &FixContext<'_>) -> Result<FixOutcome> + Send + Sync,
{
    fn apply(&self, dom: &mut Dom, node: NodeId, ctx: &FixContext<'_>) -> Result<FixOutcome> {
        self(dom, node, ctx)
    }
}

/// Parameters given to a fixer on its `<rule>` element.
#[derive(Debug, Clone, Default)]
pub struct Params {
    rule: String,
    values: BTreeMap<String, String>,
}

impl Params {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::Config(format!("rule '{}' needs a '{key}' parameter", self.rule))
        })
    }

    /// A required `CORE.SUB` parameter.
    pub fn subtype(&self, key: &str) -> Result<SubType> {
        self.require(key)?
            .parse()
            .map_err(|e| Error::Config(format!("rule '{}': {e}", self.rule)))
    }

    /// An optional `CORE.SUB` parameter.
    pub fn optional_subtype(&self, key: &str) -> Result<Option<SubType>> {
        match self.get(key) {
            Some(_) => self.subtype(key).map(Some),
            None => Ok(None),
        }
    }

    /// A required attribute-name parameter, resolved against the rule file's prefixes.
    pub fn attribute(&self, key: &str, namespaces: &NamespaceTable) -> Result<QName> {
        namespaces.resolve(self.require(key)?, None)
    }
}

type Factory = Box<dyn Fn(&Params, &NamespaceTable) -> Result<Box<dyn Fix>> + Send + Sync>;

/// Fixer constructors by name.
pub struct FixerRegistry {
    factories: BTreeMap<String, Factory>,
}

impl fmt::Debug for FixerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixerRegistry")
            .field("fixers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for FixerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FixerRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in fixer.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        fixers::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a fixer constructor.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Params, &NamespaceTable) -> Result<Box<dyn Fix>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(&self, name: &str, params: &Params, namespaces: &NamespaceTable) -> Result<Box<dyn Fix>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown fixer '{name}'")))?;
        factory(params, namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbx::{create, new_document, root_section};

    #[test]
    fn test_builtins_registered() {
        let registry = FixerRegistry::with_builtins();
        for name in [
            "unwrap",
            "detach",
            "retype",
            "wrap",
            "strip-whitespace",
            "split-nesting",
            "merge-siblings",
            "fuse-lists",
            "flatten-list",
            "list-levels",
            "rename-attr",
            "set-attr",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_build_checks_params() {
        let registry = FixerRegistry::with_builtins();
        let ns = NamespaceTable::new();

        assert!(registry.build("retype", &Params::new("r"), &ns).is_err());
        assert!(registry
            .build("retype", &Params::new("r").with("to", "BLOCK.NOPE"), &ns)
            .is_err());
        assert!(registry
            .build("retype", &Params::new("r").with("to", "BLOCK.LIST_ITEM"), &ns)
            .is_ok());
        assert!(matches!(
            registry.build("nope", &Params::new("r"), &ns),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unhandled_respects_strictness() {
        let styles = StyleDefs::default();
        let mut dom = new_document();
        let root = root_section(&dom).unwrap();
        let block = create(&mut dom, SubType::BLOCK_DEFAULT);
        dom.append(root, block);

        let strict = FixContext { styles: &styles, strict: true };
        let lenient = FixContext { styles: &styles, strict: false };

        assert!(matches!(
            strict.unhandled(&dom, block, "no rewrite"),
            Err(Error::StructuralViolation { .. })
        ));
        assert_eq!(
            lenient.unhandled(&dom, block, "no rewrite").unwrap(),
            FixOutcome::Skipped("no rewrite".into())
        );
    }

    #[test]
    fn test_closures_are_fixes() {
        let mut registry = FixerRegistry::empty();
        registry.register("noop", |_params: &Params, _ns: &NamespaceTable| {
            let fix = |_dom: &mut Dom, _node: NodeId, _ctx: &FixContext<'_>| -> Result<FixOutcome> {
                Ok(FixOutcome::Applied)
            };
            Ok(Box::new(fix) as Box<dyn Fix>)
        });
        assert!(registry.contains("noop"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["noop"]);
    }
}
