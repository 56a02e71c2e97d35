//! Minimal DRC run over a programmatically built snapshot.
//!
//! ```sh
//! cargo run --example run_drc
//! ```

use coppercheck::geometry::{Point, Polygon};
use coppercheck::snapshot::{Layer, LayerKind, Primitive, PrimitiveKind};
use coppercheck::units::METERS_PER_MIL;
use coppercheck::{DrcEngine, LayoutSnapshot, Rule, RuleSet};

fn main() {
    let snapshot = LayoutSnapshot {
        layers: vec![Layer {
            name: "TOP".into(),
            kind: LayerKind::Signal,
            thickness: 35e-6,
            material: None,
        }],
        primitives: vec![Primitive {
            id: 1,
            net: "CLK".into(),
            layer: "TOP".into(),
            kind: PrimitiveKind::Path,
            width: Some(60e-6), // 60µm, narrower than 3.5 mil
            length: Some(10e-3),
            start: Some(Point::new(0.0, 0.0)),
            end: Some(Point::new(10e-3, 0.0)),
            outline: Polygon::rect(Point::new(0.0, -30e-6), Point::new(10e-3, 30e-6)),
            is_void: false,
        }],
        ..Default::default()
    };

    // Decks usually come from JSON (RuleSet::from_json_file); building one
    // in code works just as well.
    let rules = RuleSet::from_rules([Rule::MinLineWidth {
        name: "MW".into(),
        min_width: 3.5 * METERS_PER_MIL,
        layers: None,
    }]);

    let engine = DrcEngine::new(&snapshot);
    let report = engine.check(&rules);

    println!("{} violation(s)", report.len());
    for violation in &report.violations {
        println!("  [{}] {}", violation.rule, violation.message);
    }
}
