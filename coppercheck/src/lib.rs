//! CopperCheck - PCB design rule checking over layout snapshots
//!
//! This library runs geometric, electrical and topological design rule
//! checks against a read-only snapshot of a board layout: line widths,
//! copper clearances, annular rings, board-edge distance, copper balance,
//! differential pair length match, closed-form impedance screening and
//! back-drill stub length. A separate topology pass finds disjoint nets and
//! DC shorts and can plan explicit net repairs.
//!
//! # Quick Start
//!
//! ```no_run
//! use coppercheck::{DrcEngine, LayoutSnapshot, RuleSet};
//! use std::path::Path;
//!
//! let snapshot = LayoutSnapshot::from_json_file(Path::new("board.json")).unwrap();
//! let rules = RuleSet::from_json_file(Path::new("rules.json")).unwrap();
//!
//! let engine = DrcEngine::new(&snapshot);
//! let report = engine.check(&rules);
//! for violation in &report.violations {
//!     println!("{}: {}", violation.rule, violation.message);
//! }
//! ```
//!
//! # Rule decks
//!
//! A deck is a JSON object keyed by rule kind, each kind holding a list of
//! parameter objects. Distances take a unit suffix and are normalized to
//! meters on load:
//!
//! ```json
//! {
//!   "min_line_width":   [{ "name": "MW", "value": "3.5mil" }],
//!   "min_clearance":    [{ "name": "CLR", "value": "4mil", "net1": "*", "net2": "*" }],
//!   "impedance_single_end": [{ "name": "Z0_50", "value": 50, "layers": ["TOP"], "tolerance": 3 }]
//! }
//! ```
//!
//! Unknown rule kinds are skipped with a diagnostic, and rules that name
//! nets or layers absent from the snapshot simply match nothing, so one
//! deck can be shared across designs.

pub mod engine;
pub mod geometry;
pub mod impedance;
pub mod report;
pub mod rules;
pub mod snapshot;
pub mod spatial;
pub mod topology;
pub mod units;

// Re-export main types
pub use engine::{DrcEngine, DrcError, DrcReport, SkippedRule};
pub use report::{to_table, Violation, ViolationTable};
pub use rules::{DiffPair, NetSelector, Rule, RuleKind, RuleSet};
pub use snapshot::{LayoutSnapshot, ObjectId};
pub use spatial::SpatialIndex;
pub use topology::{
    apply_repairs, find_disjoint_nets, find_shorts, plan_disjoint_repairs, plan_short_repairs,
    DisjointNet, NetCluster, NetRepair, NetShare, ObjectGraph, RepairOptions, ShortCircuit,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        DrcEngine, DrcError, DrcReport, LayoutSnapshot, Rule, RuleKind, RuleSet, Violation,
    };
}
