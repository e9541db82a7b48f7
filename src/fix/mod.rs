//! Pattern-matched structural rewriting.
//!
//! A [`FixerMap`] is an ordered list of rules, each pairing a [`Matcher`]
//! with a [`Fix`]. The [`FixerEngine`] applies the rules to a canonical
//! tree until no matcher selects anything.
//!
//! ```no_run
//! use bbx::fix::{FixerEngine, FixerMap, FixerRegistry};
//! use bbx::styles::StyleDefs;
//!
//! # fn main() -> bbx::Result<()> {
//! let registry = FixerRegistry::with_builtins();
//! let map = FixerMap::builtin(&registry)?;
//! let styles = StyleDefs::builtin()?;
//! let mut dom = bbx::bbx::new_document();
//! let report = FixerEngine::new(&map, &styles).strict(true).run(&mut dom)?;
//! println!("{} fixes", report.total_applied());
//! # Ok(())
//! # }
//! ```

mod engine;
mod fixers;
mod map;
mod matcher;
mod registry;

pub use engine::{FixReport, FixerEngine, RuleReport, DEFAULT_MAX_REWRITES};
pub use fixers::LEVELS_MARKER;
pub use map::{FixerEntry, FixerMap};
pub use matcher::Matcher;
pub use registry::{Fix, FixContext, FixOutcome, FixerRegistry, Params};
