//! Style definitions.
//!
//! Named formatting styles with single inheritance. The braille formatter
//! consumes the options; this crate only needs to know which names exist
//! (for `utd:overrideStyle`) and how option values inherit.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dom::{parse_str, Dom, NodeId};
use crate::error::{Error, Result};

const BUILTIN_STYLES: &str = include_str!("../rules/styles.xml");

/// One named style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDef {
    pub name: String,
    pub base: Option<String>,
    pub options: BTreeMap<String, String>,
}

/// Catalogue of styles, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StyleDefs {
    styles: BTreeMap<String, StyleDef>,
}

impl StyleDefs {
    /// The catalogue shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_xml(BUILTIN_STYLES)
    }

    /// Load `<styles><style name base><option key value/></style></styles>`.
    ///
    /// Duplicate names, unknown bases and inheritance cycles are errors.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let dom = parse_str(xml)?;
        let Some(root) = dom.document_element() else {
            return Err(Error::Config("empty style file".into()));
        };
        if !dom.element_name(root).is_some_and(|n| n.is(None, "styles")) {
            return Err(Error::Config("style file must have a <styles> root".into()));
        }

        let mut styles = BTreeMap::new();
        for node in dom.children(root).filter(|&c| dom.is_element(c)) {
            let def = parse_style(&dom, node)?;
            if styles.contains_key(&def.name) {
                return Err(Error::Config(format!("duplicate style '{}'", def.name)));
            }
            styles.insert(def.name.clone(), def);
        }

        let defs = StyleDefs { styles };
        defs.check_inheritance()?;
        debug!(count = defs.styles.len(), "loaded style definitions");
        Ok(defs)
    }

    fn check_inheritance(&self) -> Result<()> {
        for def in self.styles.values() {
            let mut seen = vec![def.name.as_str()];
            let mut current = def;
            while let Some(base) = &current.base {
                let Some(next) = self.styles.get(base) else {
                    return Err(Error::Config(format!(
                        "style '{}' has unknown base '{base}'",
                        current.name
                    )));
                };
                if seen.contains(&next.name.as_str()) {
                    return Err(Error::Config(format!(
                        "style inheritance cycle through '{}'",
                        def.name
                    )));
                }
                seen.push(&next.name);
                current = next;
            }
        }
        Ok(())
    }

    pub fn style_by_name(&self, name: &str) -> Option<&StyleDef> {
        self.styles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }

    /// The style followed by its bases, nearest first.
    pub fn lineage(&self, name: &str) -> Vec<&StyleDef> {
        let mut out = Vec::new();
        let mut current = self.styles.get(name);
        while let Some(def) = current {
            out.push(def);
            current = def.base.as_deref().and_then(|b| self.styles.get(b));
        }
        out
    }

    /// An option value, inherited from base styles when not set directly.
    pub fn option(&self, name: &str, key: &str) -> Option<&str> {
        self.lineage(name)
            .into_iter()
            .find_map(|def| def.options.get(key).map(String::as_str))
    }
}

fn parse_style(dom: &Dom, node: NodeId) -> Result<StyleDef> {
    let is_style = dom.element_name(node).is_some_and(|n| n.is(None, "style"));
    let name = dom.attr(node, None, "name");
    let (true, Some(name)) = (is_style, name) else {
        return Err(Error::Config(format!(
            "expected <style name=\"…\"> at {}",
            dom.describe(node)
        )));
    };

    let mut options = BTreeMap::new();
    for option in dom.children(node).filter(|&c| dom.is_element(c)) {
        match (dom.attr(option, None, "key"), dom.attr(option, None, "value")) {
            (Some(key), Some(value)) => {
                options.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(Error::Config(format!(
                    "style option needs key and value at {}",
                    dom.describe(option)
                )));
            }
        }
    }

    Ok(StyleDef {
        name: name.to_string(),
        base: dom.attr(node, None, "base").map(str::to_string),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_loads() {
        let styles = StyleDefs::builtin().unwrap();
        assert!(styles.contains("Body Text"));
        assert!(styles.contains("Heading 1"));
        assert!(styles.style_by_name("Nope").is_none());
    }

    #[test]
    fn test_option_inheritance() {
        let styles = StyleDefs::from_xml(
            r#"<styles>
                <style name="Base"><option key="indent" value="2"/><option key="skip" value="0"/></style>
                <style name="Child" base="Base"><option key="skip" value="1"/></style>
            </styles>"#,
        )
        .unwrap();

        assert_eq!(styles.option("Child", "skip"), Some("1"));
        assert_eq!(styles.option("Child", "indent"), Some("2"));
        assert_eq!(styles.lineage("Child").len(), 2);
        assert_eq!(styles.option("Child", "missing"), None);
    }

    #[test]
    fn test_rejects_bad_catalogues() {
        let dup = r#"<styles><style name="A"/><style name="A"/></styles>"#;
        let unknown = r#"<styles><style name="A" base="B"/></styles>"#;
        let cycle = r#"<styles><style name="A" base="B"/><style name="B" base="A"/></styles>"#;

        for xml in [dup, unknown, cycle] {
            assert!(matches!(StyleDefs::from_xml(xml), Err(Error::Config(_))), "{xml}");
        }
    }
}
