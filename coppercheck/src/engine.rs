//! Engine entry point shared by library users and the CLI.
//!
//! A [`DrcEngine`] is built once per layout snapshot (that is when the
//! spatial index is constructed) and can run [`DrcEngine::check`] any
//! number of times with different rule decks. A check never mutates the
//! layout, so repeated runs over an unchanged snapshot return identical
//! reports. If the layout changes structurally, build a new engine.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::report::{self, Violation, ViolationTable};
use crate::rules::checks::{run_rule, CheckContext};
use crate::rules::RuleSet;
use crate::snapshot::LayoutSnapshot;
use crate::spatial::SpatialIndex;
use crate::topology::ObjectGraph;

#[derive(Debug, thiserror::Error)]
pub enum DrcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule deck error: {0}")]
    RuleDeck(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error("unit error: {0}")]
    Unit(String),
    #[error("report error: {0}")]
    Report(String),
}

/// A rule the dispatcher could not run, with the reason it was skipped.
/// Skips are diagnostics, never fatal: a deck written for another design
/// must not abort the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub kind: String,
    pub reason: String,
}

/// Everything one `check()` call produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrcReport {
    /// Violations in deck order, then discovery order within each rule.
    pub violations: Vec<Violation>,
    pub skipped: Vec<SkippedRule>,
}

impl DrcReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violation counts per rule kind, in first-seen order.
    pub fn counts_by_kind(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for v in &self.violations {
            match counts.iter_mut().find(|(k, _)| *k == v.rule) {
                Some((_, n)) => *n += 1,
                None => counts.push((v.rule.clone(), 1)),
            }
        }
        counts
    }

    pub fn to_table(&self) -> ViolationTable {
        report::to_table(&self.violations)
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), DrcError> {
        report::write_csv(&self.violations, writer)
    }
}

/// The design rule check engine for one layout snapshot.
pub struct DrcEngine<'a> {
    snapshot: &'a LayoutSnapshot,
    index: SpatialIndex,
}

impl<'a> DrcEngine<'a> {
    /// Build the engine and its spatial index. An empty snapshot is fine;
    /// every later query simply finds nothing.
    pub fn new(snapshot: &'a LayoutSnapshot) -> Self {
        let index = SpatialIndex::build(snapshot);
        debug!(entries = index.len(), "spatial index built");
        Self { snapshot, index }
    }

    pub fn snapshot(&self) -> &'a LayoutSnapshot {
        self.snapshot
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Run every rule of the deck, in deck order, and collect violations in
    /// discovery order. Unknown rule kinds are reported as skipped.
    pub fn check(&self, rules: &RuleSet) -> DrcReport {
        let ctx = CheckContext::new(self.snapshot, &self.index);
        let mut violations = Vec::new();

        for (kind, instances) in rules.iter() {
            debug!(kind, count = instances.len(), "running rule kind");
            for rule in instances {
                run_rule(&ctx, rule, &mut violations);
            }
        }

        let skipped = rules
            .unknown_kinds()
            .iter()
            .map(|kind| SkippedRule {
                kind: kind.clone(),
                reason: "no handler registered for this rule kind".into(),
            })
            .collect();

        info!(
            rules = rules.rule_count(),
            violations = violations.len(),
            "DRC check complete"
        );
        DrcReport {
            violations,
            skipped,
        }
    }

    /// Contact graph for the topology analyses (disjoint nets, shorts).
    pub fn object_graph(&self) -> ObjectGraph {
        ObjectGraph::build(self.snapshot, &self.index)
    }

    /// Write the IPC-D-356A-style netlist report for this snapshot.
    pub fn write_netlist_report(&self, path: &Path, report: &DrcReport) -> Result<(), DrcError> {
        report::write_netlist_report(path, self.snapshot, &report.violations)
    }
}
