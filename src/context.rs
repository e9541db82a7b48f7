//! Conversion configuration and the shared, read-only context built from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::Dom;
use crate::error::{Error, Result};
use crate::fix::{FixerEngine, FixerMap, FixerRegistry, DEFAULT_MAX_REWRITES};
use crate::parse::{Parser, ParserMap, SourceFormat};
use crate::styles::StyleDefs;
use crate::upgrade::UpgradeMaps;
use crate::validate::Validator;

/// Options for a conversion run, usually read from a JSON file.
///
/// ```json
/// { "strict": true, "validate": true, "styles": "house-styles.xml" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Fail on unmapped source elements and unhandled fixer input.
    pub strict: bool,
    /// Run the validator after fixing.
    pub validate: bool,
    pub max_rewrites_per_rule: usize,
    /// Replacement fixer map.
    pub fixer_map: Option<PathBuf>,
    /// Replacement style definitions.
    pub styles: Option<PathBuf>,
    pub nimas_map: Option<PathBuf>,
    pub epub_map: Option<PathBuf>,
    /// Skip detection and treat every source as this format.
    pub source_format: Option<SourceFormat>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            strict: false,
            validate: cfg!(debug_assertions),
            max_rewrites_per_rule: DEFAULT_MAX_REWRITES,
            fixer_map: None,
            styles: None,
            nimas_map: None,
            epub_map: None,
            source_format: None,
        }
    }
}

impl ConversionConfig {
    /// Load a JSON config file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: ConversionConfig = serde_json::from_str(&contents)?;

        let base = path.parent().unwrap_or(Path::new(""));
        for field in [
            &mut config.fixer_map,
            &mut config.styles,
            &mut config.nimas_map,
            &mut config.epub_map,
        ] {
            if let Some(p) = field
                && p.is_relative()
            {
                *p = base.join(&*p);
            }
        }
        Ok(config)
    }
}

/// Everything a conversion needs, loaded once and shared by reference.
///
/// The context is immutable after construction, so one instance can serve
/// any number of concurrent conversions.
#[derive(Debug)]
pub struct ConversionContext {
    pub config: ConversionConfig,
    pub registry: FixerRegistry,
    pub fixers: FixerMap,
    pub styles: StyleDefs,
    pub nimas: ParserMap,
    pub epub: ParserMap,
    pub upgrades: UpgradeMaps,
}

impl ConversionContext {
    /// Built-in rules and styles with default options.
    pub fn builtin() -> Result<Self> {
        Self::new(ConversionConfig::default())
    }

    pub fn new(config: ConversionConfig) -> Result<Self> {
        Self::with_registry(config, FixerRegistry::with_builtins())
    }

    /// Build a context whose rule files may refer to extra fixers.
    pub fn with_registry(config: ConversionConfig, registry: FixerRegistry) -> Result<Self> {
        let fixers = match &config.fixer_map {
            Some(path) => FixerMap::from_xml(&read_rules(path)?, &registry)?,
            None => FixerMap::builtin(&registry)?,
        };
        let styles = match &config.styles {
            Some(path) => StyleDefs::from_xml(&read_rules(path)?)?,
            None => StyleDefs::builtin()?,
        };
        let nimas = load_parser_map(config.nimas_map.as_deref(), SourceFormat::Nimas)?;
        let epub = load_parser_map(config.epub_map.as_deref(), SourceFormat::Epub)?;
        let upgrades = UpgradeMaps::builtin(&registry)?;

        debug!(
            rules = fixers.len(),
            styles = styles.len(),
            strict = config.strict,
            validate = config.validate,
            "conversion context ready"
        );
        Ok(Self {
            config,
            registry,
            fixers,
            styles,
            nimas,
            epub,
            upgrades,
        })
    }

    pub fn parser_map(&self, format: SourceFormat) -> &ParserMap {
        match format {
            SourceFormat::Nimas => &self.nimas,
            SourceFormat::Epub => &self.epub,
        }
    }

    /// The configured format, or the one the source tree looks like.
    pub fn detect_format(&self, src: &Dom) -> Result<SourceFormat> {
        if let Some(format) = self.config.source_format {
            return Ok(format);
        }
        SourceFormat::detect(src).ok_or_else(|| {
            let name = src
                .document_element()
                .and_then(|r| src.element_name(r))
                .map(|n| format!("{{{}}}{}", n.ns.as_deref().unwrap_or(""), n.local))
                .unwrap_or_default();
            Error::Config(format!("cannot tell the source format of <{name}>"))
        })
    }

    pub fn parser(&self, format: SourceFormat) -> Parser<'_> {
        Parser::new(self.parser_map(format)).strict(self.config.strict)
    }

    /// An engine running `map` with this context's options.
    pub fn engine_for<'a>(&'a self, map: &'a FixerMap) -> FixerEngine<'a> {
        FixerEngine::new(map, &self.styles)
            .strict(self.config.strict)
            .max_rewrites(self.config.max_rewrites_per_rule)
    }

    /// An engine running the general fixer map.
    pub fn engine(&self) -> FixerEngine<'_> {
        self.engine_for(&self.fixers)
    }

    pub fn validator(&self) -> Validator<'_> {
        Validator::new(&self.styles).enabled(self.config.validate)
    }
}

fn read_rules(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))
}

fn load_parser_map(path: Option<&Path>, format: SourceFormat) -> Result<ParserMap> {
    let map = match path {
        Some(path) => ParserMap::from_xml(&read_rules(path)?)?,
        None => ParserMap::builtin(format)?,
    };
    if map.format != format {
        return Err(Error::Config(format!(
            "{format} parser map declares format '{}'",
            map.format
        )));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_context() {
        let ctx = ConversionContext::builtin().unwrap();
        assert!(!ctx.fixers.is_empty());
        assert!(ctx.styles.contains("Body Text"));
        assert_eq!(ctx.parser_map(SourceFormat::Epub).format, SourceFormat::Epub);
    }

    #[test]
    fn test_config_defaults_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bbx.json");
        std::fs::write(&path, r#"{ "strict": true, "styles": "styles.xml" }"#).unwrap();

        let config = ConversionConfig::load(&path).unwrap();
        assert!(config.strict);
        assert_eq!(config.max_rewrites_per_rule, DEFAULT_MAX_REWRITES);
        assert_eq!(config.styles, Some(dir.path().join("styles.xml")));
        assert_eq!(config.fixer_map, None);
    }

    #[test]
    fn test_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bbx.json");
        std::fs::write(&path, r#"{ "strict": "yes" }"#).unwrap();
        assert!(matches!(ConversionConfig::load(&path), Err(Error::Json(_))));

        let config = ConversionConfig {
            styles: Some(dir.path().join("missing.xml")),
            ..ConversionConfig::default()
        };
        assert!(matches!(ConversionContext::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_forced_format() {
        let ctx = ConversionContext::new(ConversionConfig {
            source_format: Some(SourceFormat::Nimas),
            ..ConversionConfig::default()
        })
        .unwrap();
        let src = crate::dom::parse_str("<doc/>").unwrap();
        assert_eq!(ctx.detect_format(&src).unwrap(), SourceFormat::Nimas);

        let ctx = ConversionContext::builtin().unwrap();
        assert!(ctx.detect_format(&src).is_err());
    }
}
