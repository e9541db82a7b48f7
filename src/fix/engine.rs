//! The rewrite-to-fixpoint loop.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, trace, Level};

use super::map::FixerMap;
use super::registry::{FixContext, FixOutcome};
use crate::bbx::{self, FIX_NS};
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::styles::StyleDefs;

/// Default bound on applications of a single rule within one pass.
pub const DEFAULT_MAX_REWRITES: usize = 100_000;

/// Bound on full passes over the rule list.
const MAX_PASSES: usize = 32;

/// Applications allowed per node under the book root in one pass, on top of
/// the configured bound. Every built-in fixer settles at least one node per
/// application, so a rule firing more often than this is cycling.
const REWRITES_PER_NODE: usize = 4;
const REWRITE_SLACK: usize = 64;

/// How often each rule fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub rules: Vec<RuleReport>,
    /// Full passes over the rule list, including the final quiet one.
    pub passes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub name: String,
    pub applied: usize,
    pub skipped: usize,
}

impl FixReport {
    pub fn total_applied(&self) -> usize {
        self.rules.iter().map(|r| r.applied).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.rules.iter().map(|r| r.skipped).sum()
    }
}

/// Applies a [`FixerMap`] to a document until no rule matches.
///
/// Each rule is run to exhaustion before the next: starting from the book
/// root, the engine finds the next matching node in document order, applies
/// the fix, and resumes the search from the nearest section that enclosed
/// the match. Rules can create work for rules earlier in the list, so the
/// whole list is repeated until a pass changes nothing.
///
/// A rule that matches the same node twice in a row with the node still in
/// the same place has made no progress and fails with
/// [`Error::NonTerminatingRewrite`]. The per-rule rewrite bound and the pass
/// bound catch cycles that move nodes around without settling. The rewrite
/// bound is the configured maximum or a small multiple of the document size,
/// whichever is lower.
#[derive(Debug)]
pub struct FixerEngine<'a> {
    map: &'a FixerMap,
    ctx: FixContext<'a>,
    max_rewrites: usize,
}

/// What the last application of a rule looked at.
struct LastMatch {
    node: NodeId,
    chain: Vec<NodeId>,
}

impl<'a> FixerEngine<'a> {
    pub fn new(map: &'a FixerMap, styles: &'a StyleDefs) -> Self {
        Self {
            map,
            ctx: FixContext {
                styles,
                strict: false,
            },
            max_rewrites: DEFAULT_MAX_REWRITES,
        }
    }

    /// Fail on node shapes a fixer cannot handle instead of skipping them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.ctx.strict = strict;
        self
    }

    pub fn max_rewrites(mut self, max: usize) -> Self {
        self.max_rewrites = max.max(1);
        self
    }

    /// Rewrite `dom` in place until no rule matches anywhere under the book root.
    ///
    /// Fixer bookkeeping attributes are removed before returning.
    pub fn run(&self, dom: &mut Dom) -> Result<FixReport> {
        let root = bbx::require_root_section(dom)?;
        let mut report = FixReport {
            rules: self
                .map
                .entries()
                .iter()
                .map(|e| RuleReport {
                    name: e.name.clone(),
                    applied: 0,
                    skipped: 0,
                })
                .collect(),
            passes: 0,
        };
        // Nodes a rule declined stay declined for the whole run
        let mut declined: Vec<HashSet<NodeId>> = vec![HashSet::new(); self.map.len()];

        loop {
            if report.passes == MAX_PASSES {
                return Err(Error::NonTerminatingRewrite {
                    rule: "*".to_string(),
                    node: dom.describe(root),
                    message: format!("rules still firing after {MAX_PASSES} passes"),
                });
            }
            report.passes += 1;

            let mut changed = false;
            for (index, stats) in report.rules.iter_mut().enumerate() {
                let (applied, skipped) = self.run_rule(dom, root, index, &mut declined[index])?;
                stats.applied += applied;
                stats.skipped += skipped;
                changed |= applied > 0;
            }
            if !changed {
                break;
            }
        }

        strip_bookkeeping(dom, root);
        debug!(
            passes = report.passes,
            applied = report.total_applied(),
            "fixer run complete"
        );
        Ok(report)
    }

    fn run_rule(
        &self,
        dom: &mut Dom,
        root: NodeId,
        index: usize,
        declined: &mut HashSet<NodeId>,
    ) -> Result<(usize, usize)> {
        let entry = &self.map.entries()[index];
        let budget = self
            .max_rewrites
            .min(dom.descendants(root).count() * REWRITES_PER_NODE + REWRITE_SLACK);
        let mut cursor = root;
        let mut last: Option<LastMatch> = None;
        let mut applied = 0;
        let mut skipped = 0;

        while let Some(node) = self.find_match(dom, root, cursor, index, declined) {
            let chain: Vec<NodeId> = dom.ancestors(node).collect();
            if let Some(prev) = &last
                && prev.node == node
                && prev.chain == chain
            {
                return Err(Error::NonTerminatingRewrite {
                    rule: entry.name.clone(),
                    node: dom.describe(node),
                    message: "matched the same node again after its fix".to_string(),
                });
            }
            if applied == budget {
                return Err(Error::NonTerminatingRewrite {
                    rule: entry.name.clone(),
                    node: dom.describe(node),
                    message: format!("more than {budget} rewrites in one pass"),
                });
            }

            // The fix may move or drop the node, so capture where it was first
            let path = tracing::enabled!(Level::DEBUG).then(|| dom.describe(node));
            let section = bbx::nearest_section(dom, node);
            last = Some(LastMatch { node, chain });

            let outcome = match entry.fix.apply(dom, node, &self.ctx) {
                Ok(outcome) => outcome,
                Err(e) => {
                    return Err(Error::Fixer {
                        rule: entry.name.clone(),
                        node: path.unwrap_or_else(|| dom.describe(node)),
                        source: Box::new(e),
                    });
                }
            };

            match outcome {
                FixOutcome::Applied => {
                    if let Some(path) = &path {
                        debug!(rule = %entry.name, fixer = %entry.fixer, node = %path, "applied fix");
                    }
                    applied += 1;
                    cursor = match section {
                        Some(s) if s == root || dom.is_ancestor_of(root, s) => s,
                        _ => root,
                    };
                }
                FixOutcome::Skipped(reason) => {
                    if let Some(path) = &path {
                        trace!(rule = %entry.name, node = %path, %reason, "fix declined");
                    }
                    skipped += 1;
                    declined.insert(node);
                    cursor = node;
                }
            }
        }
        Ok((applied, skipped))
    }

    /// First node at or after `cursor` in document order, within `root`,
    /// that the rule matches.
    fn find_match(
        &self,
        dom: &Dom,
        root: NodeId,
        cursor: NodeId,
        index: usize,
        declined: &HashSet<NodeId>,
    ) -> Option<NodeId> {
        let matcher = &self.map.entries()[index].matcher;
        let mut current = Some(cursor);
        while let Some(node) = current {
            if !declined.contains(&node) && matcher.matches(dom, node) {
                return Some(node);
            }
            current = dom.next_in_order(node, root);
        }
        None
    }
}

/// Remove every attribute in the fixer bookkeeping namespace.
fn strip_bookkeeping(dom: &mut Dom, root: NodeId) {
    let nodes: Vec<_> = std::iter::once(root).chain(dom.descendants(root)).collect();
    for node in nodes {
        if let Some(elem) = dom.element_mut(node) {
            elem.attrs.retain(|a| a.name.ns.as_deref() != Some(FIX_NS));
        }
    }
}
