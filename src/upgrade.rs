//! Format upgrader: walks older canonical documents forward to the current
//! format version.
//!
//! Each version has one step to the next: run that step's fixer map, then a
//! structural pass the map cannot express. After the last step (or straight
//! away, for documents already current) the general fixer map runs once and
//! the validator checks the result.

use serde::Serialize;
use tracing::debug;

use crate::bbx::{self, BBX_NS, BB_NS, CURRENT_VERSION, HEAD_ELEMENT};
use crate::context::ConversionContext;
use crate::dom::{Dom, QName};
use crate::error::{Error, Result};
use crate::fix::{FixReport, FixerMap, FixerRegistry};

const UPGRADE_V1: &str = include_str!("../rules/upgrade-v1.xml");
const UPGRADE_V2: &str = include_str!("../rules/upgrade-v2.xml");

/// One version-to-version transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpgradeStep {
    V1ToV2,
    V2ToV3,
}

impl UpgradeStep {
    /// The step leaving `version`, if any.
    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self::V1ToV2),
            2 => Some(Self::V2ToV3),
            _ => None,
        }
    }

    pub fn target(self) -> u32 {
        match self {
            Self::V1ToV2 => 2,
            Self::V2ToV3 => 3,
        }
    }
}

/// Fixer maps for each upgrade step.
#[derive(Debug)]
pub struct UpgradeMaps {
    v1: FixerMap,
    v2: FixerMap,
}

impl UpgradeMaps {
    pub fn builtin(registry: &FixerRegistry) -> Result<Self> {
        Ok(Self {
            v1: FixerMap::from_xml(UPGRADE_V1, registry)?,
            v2: FixerMap::from_xml(UPGRADE_V2, registry)?,
        })
    }

    pub fn for_step(&self, step: UpgradeStep) -> &FixerMap {
        match step {
            UpgradeStep::V1ToV2 => &self.v1,
            UpgradeStep::V2ToV3 => &self.v2,
        }
    }
}

/// What an upgrade did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub from: u32,
    pub to: u32,
    pub steps: Vec<UpgradeStep>,
    /// Result of the final general fixer run.
    pub fix: FixReport,
}

/// Bring `dom` to [`CURRENT_VERSION`] in place, then fix and validate it.
///
/// Already-current documents only get the final fixer run and validation,
/// so upgrading twice is harmless.
pub fn upgrade(dom: &mut Dom, ctx: &ConversionContext) -> Result<UpgradeReport> {
    if bbx::document_element(dom).is_none() {
        let at = dom.document_element().unwrap_or(dom.document());
        return Err(Error::structural(dom.describe(at), "document element is not bbdoc"));
    }

    let from = bbx::format_version(dom)?;
    let mut version = from;
    let mut steps = Vec::new();

    while version < CURRENT_VERSION {
        let Some(step) = UpgradeStep::from_version(version) else {
            return Err(Error::structural(
                "/",
                format!("no upgrade path from format version {version}"),
            ));
        };
        let report = ctx.engine_for(ctx.upgrades.for_step(step)).run(dom)?;
        match step {
            UpgradeStep::V1ToV2 => insert_missing_head(dom),
            UpgradeStep::V2ToV3 => rewrite_emphasis_separators(dom),
        }
        version = step.target();
        bbx::set_format_version(dom, version);
        debug!(
            ?step,
            version,
            rewrites = report.total_applied(),
            "applied upgrade step"
        );
        steps.push(step);
    }

    let fix = ctx.engine().run(dom)?;
    ctx.validator().validate(dom)?;

    Ok(UpgradeReport {
        from,
        to: version.max(CURRENT_VERSION),
        steps,
        fix,
    })
}

/// Version 1 documents have no head; give them an empty one.
fn insert_missing_head(dom: &mut Dom) {
    if bbx::head(dom).is_some() {
        return;
    }
    let Some(doc) = bbx::document_element(dom) else {
        return;
    };
    let head = dom.create_element(QName::new(Some(BBX_NS), HEAD_ELEMENT));
    dom.prepend(doc, head);
}

/// Version 2 separated emphasis values with commas.
fn rewrite_emphasis_separators(dom: &mut Dom) {
    let Some(doc) = bbx::document_element(dom) else {
        return;
    };
    let updates: Vec<_> = dom
        .descendants(doc)
        .filter_map(|node| {
            let value = dom.attr(node, Some(BB_NS), "emphasis")?;
            value.contains(',').then(|| {
                let joined = value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                (node, joined)
            })
        })
        .collect();

    for (node, value) in updates {
        dom.set_attr(node, QName::prefixed(BB_NS, bbx::BB_PREFIX, "emphasis"), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversionConfig;
    use crate::dom::parse_str;

    fn context() -> ConversionContext {
        ConversionContext::new(ConversionConfig {
            strict: true,
            validate: true,
            ..ConversionConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_step_chain() {
        assert_eq!(UpgradeStep::from_version(1), Some(UpgradeStep::V1ToV2));
        assert_eq!(UpgradeStep::from_version(2).map(UpgradeStep::target), Some(3));
        assert_eq!(UpgradeStep::from_version(CURRENT_VERSION), None);
    }

    #[test]
    fn test_emphasis_separators() {
        let mut dom = parse_str(
            r#"<bbdoc xmlns="http://brailleblaster.org/ns/bbx" xmlns:bb="http://brailleblaster.org/ns/bb"><head/>
<SECTION bb:type="ROOT"><BLOCK bb:type="DEFAULT"><INLINE bb:type="EMPHASIS" bb:emphasis="BOLD, ITALIC">x</INLINE></BLOCK></SECTION></bbdoc>"#,
        )
        .unwrap();
        rewrite_emphasis_separators(&mut dom);
        let inline = dom
            .descendants(dom.document())
            .find(|&n| bbx::is_a(&dom, n, crate::bbx::SubType::EMPHASIS))
            .unwrap();
        assert_eq!(dom.attr(inline, Some(BB_NS), "emphasis"), Some("BOLD ITALIC"));
    }

    #[test]
    fn test_version_two_upgrade() {
        let ctx = context();
        let mut dom = parse_str(
            r#"<bbdoc xmlns="http://brailleblaster.org/ns/bbx" xmlns:bb="http://brailleblaster.org/ns/bb" bb:version="2"><head/>
<SECTION bb:type="ROOT"><BLOCK bb:type="STYLE" bb:style="Heading 1">Title</BLOCK></SECTION></bbdoc>"#,
        )
        .unwrap();
        let report = upgrade(&mut dom, &ctx).unwrap();
        assert_eq!(report.from, 2);
        assert_eq!(report.to, CURRENT_VERSION);
        assert_eq!(report.steps, vec![UpgradeStep::V2ToV3]);
        assert_eq!(bbx::format_version(&dom).unwrap(), CURRENT_VERSION);

        let block = dom
            .descendants(dom.document())
            .find(|&n| bbx::is_core(&dom, n, crate::bbx::CoreType::Block))
            .unwrap();
        assert_eq!(dom.attr(block, Some(bbx::UTD_NS), "overrideStyle"), Some("Heading 1"));
        assert_eq!(dom.attr(block, Some(BB_NS), "style"), None);
    }

    #[test]
    fn test_current_document_untouched() {
        let ctx = context();
        let mut dom = bbx::new_document();
        let before = crate::dom::to_string(&dom).unwrap();
        let report = upgrade(&mut dom, &ctx).unwrap();
        assert!(report.steps.is_empty());
        assert_eq!(crate::dom::to_string(&dom).unwrap(), before);
    }

    #[test]
    fn test_not_a_canonical_document() {
        let ctx = context();
        let mut dom = parse_str("<dtbook/>").unwrap();
        assert!(matches!(
            upgrade(&mut dom, &ctx),
            Err(Error::StructuralViolation { .. })
        ));
    }
}
