//! Connectivity analysis and net repair through the public API.

use std::collections::BTreeSet;

use coppercheck::geometry::{Point, Polygon};
use coppercheck::snapshot::{Layer, LayerKind, Primitive, PrimitiveKind, Via};
use coppercheck::topology::{
    apply_repairs, find_disjoint_nets, find_shorts, plan_disjoint_repairs, plan_short_repairs,
    NetRepair, RepairOptions,
};
use coppercheck::{DrcEngine, LayoutSnapshot};

fn top_layer() -> Vec<Layer> {
    vec![
        Layer {
            name: "TOP".into(),
            kind: LayerKind::Signal,
            thickness: 35e-6,
            material: None,
        },
        Layer {
            name: "BOTTOM".into(),
            kind: LayerKind::Signal,
            thickness: 35e-6,
            material: None,
        },
    ]
}

fn copper_rect(id: u64, net: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Primitive {
    Primitive {
        id,
        net: net.into(),
        layer: "TOP".into(),
        kind: PrimitiveKind::Rect,
        width: None,
        length: None,
        start: None,
        end: None,
        outline: Polygon::rect(Point::new(x0, y0), Point::new(x1, y1)),
        is_void: false,
    }
}

fn bare_via(id: u64, net: &str, x: f64, y: f64) -> Via {
    Via {
        id,
        name: None,
        net: net.into(),
        position: Point::new(x, y),
        pads: vec![],
        hole_diameter: 0.3e-3,
        start_layer: "TOP".into(),
        stop_layer: "BOTTOM".into(),
        backdrill_depth: None,
        component: None,
    }
}

/// Net A in two islands: {1, 2} overlapping, and {3} on its own.
fn split_net_snapshot() -> LayoutSnapshot {
    LayoutSnapshot {
        nets: vec!["A".into()],
        layers: top_layer(),
        primitives: vec![
            copper_rect(1, "A", 0.0, 0.0, 1e-3, 1e-3),
            copper_rect(2, "A", 0.9e-3, 0.0, 2e-3, 1e-3),
            copper_rect(3, "A", 5e-3, 0.0, 6e-3, 1e-3),
        ],
        ..Default::default()
    }
}

#[test]
fn clusters_cover_every_object_exactly_once() {
    let snapshot = split_net_snapshot();
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let clusters = graph.clusters_for_net("A");
    assert_eq!(clusters.len(), 2);

    let mut seen = BTreeSet::new();
    let mut total = 0;
    for cluster in &clusters {
        total += cluster.objects.len();
        seen.extend(cluster.objects.iter().copied());
    }
    // No object missing, no object duplicated.
    assert_eq!(total, 3);
    assert_eq!(seen, BTreeSet::from([1, 2, 3]));
}

#[test]
fn closure_spans_touching_objects() {
    let snapshot = split_net_snapshot();
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    assert_eq!(graph.closure(1), BTreeSet::from([1, 2]));
    assert_eq!(graph.closure(3), BTreeSet::from([3]));
    assert!(graph.closure(999).is_empty());
}

#[test]
fn disjoint_net_detected_and_renamed() {
    let snapshot = split_net_snapshot();
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let disjoint = find_disjoint_nets(&snapshot, &graph);
    assert_eq!(disjoint.len(), 1);
    assert_eq!(disjoint[0].net, "A");
    assert_eq!(disjoint[0].clusters.len(), 2);

    let repairs = plan_disjoint_repairs(&snapshot, &graph, &RepairOptions::default());
    assert_eq!(repairs.len(), 1);
    match &repairs[0] {
        NetRepair::Rename {
            net,
            objects,
            new_net,
        } => {
            assert_eq!(net, "A");
            // The larger cluster {1, 2} keeps the name; {3} moves.
            assert_eq!(objects, &vec![3]);
            assert!(new_net.starts_with("A_"));
        }
        other => panic!("expected a rename, got {other:?}"),
    }
}

#[test]
fn repair_application_heals_the_net() {
    let mut snapshot = split_net_snapshot();
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();
    let repairs = plan_disjoint_repairs(&snapshot, &graph, &RepairOptions::default());
    drop(engine);

    apply_repairs(&mut snapshot, &repairs);

    // Net A is now a single cluster; the split-off island lives under its
    // generated name.
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();
    assert!(find_disjoint_nets(&snapshot, &graph).is_empty());
    assert_eq!(graph.clusters_for_net("A").len(), 1);

    let renamed = snapshot
        .net_names()
        .into_iter()
        .find(|n| n.starts_with("A_"))
        .expect("generated net should be declared");
    assert_eq!(snapshot.objects_on_net(&renamed).len(), 1);
    assert_eq!(snapshot.object(3).unwrap().net(), renamed);
}

#[test]
fn area_ordering_changes_the_keeper() {
    // Two islands: three small rects against one large plane. By count the
    // trio wins; by area the plane wins.
    let snapshot = LayoutSnapshot {
        nets: vec!["A".into()],
        layers: top_layer(),
        primitives: vec![
            copper_rect(1, "A", 0.0, 0.0, 0.2e-3, 0.2e-3),
            copper_rect(2, "A", 0.1e-3, 0.0, 0.3e-3, 0.2e-3),
            copper_rect(3, "A", 0.2e-3, 0.0, 0.4e-3, 0.2e-3),
            copper_rect(4, "A", 5e-3, 0.0, 10e-3, 5e-3),
        ],
        ..Default::default()
    };
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let by_count = plan_disjoint_repairs(&snapshot, &graph, &RepairOptions::default());
    match &by_count[0] {
        NetRepair::Rename { objects, .. } => assert_eq!(objects, &vec![4]),
        other => panic!("expected a rename, got {other:?}"),
    }

    let by_area = plan_disjoint_repairs(
        &snapshot,
        &graph,
        &RepairOptions {
            order_clusters_by_area: true,
            ..Default::default()
        },
    );
    match &by_area[0] {
        NetRepair::Rename { objects, .. } => assert_eq!(objects, &vec![1, 2, 3]),
        other => panic!("expected a rename, got {other:?}"),
    }
}

#[test]
fn tiny_fragment_is_deleted_not_renamed() {
    let snapshot = LayoutSnapshot {
        nets: vec!["A".into()],
        layers: top_layer(),
        primitives: vec![
            copper_rect(1, "A", 0.0, 0.0, 1e-3, 1e-3),
            // A 10µm sliver far away.
            copper_rect(2, "A", 5e-3, 0.0, 5.01e-3, 0.01e-3),
        ],
        ..Default::default()
    };
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let repairs = plan_disjoint_repairs(
        &snapshot,
        &graph,
        &RepairOptions {
            min_fragment_area: 1e-9,
            ..Default::default()
        },
    );
    assert_eq!(
        repairs,
        vec![NetRepair::RemoveObjects {
            net: "A".into(),
            objects: vec![2],
        }]
    );
}

#[test]
fn lone_via_fragment_can_be_dropped() {
    let snapshot = LayoutSnapshot {
        nets: vec!["A".into()],
        layers: top_layer(),
        primitives: vec![copper_rect(1, "A", 0.0, 0.0, 1e-3, 1e-3)],
        vias: vec![bare_via(2, "A", 8e-3, 8e-3)],
        ..Default::default()
    };
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let repairs = plan_disjoint_repairs(
        &snapshot,
        &graph,
        &RepairOptions {
            remove_isolated_vias: true,
            ..Default::default()
        },
    );
    assert_eq!(
        repairs,
        vec![NetRepair::RemoveObjects {
            net: "A".into(),
            objects: vec![2],
        }]
    );
}

#[test]
fn empty_declared_net_is_deleted() {
    let mut snapshot = split_net_snapshot();
    snapshot.nets.push("GHOST".into());

    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();
    let repairs = plan_disjoint_repairs(&snapshot, &graph, &RepairOptions::default());
    drop(engine);

    assert!(repairs.contains(&NetRepair::DeleteNet {
        net: "GHOST".into()
    }));

    apply_repairs(&mut snapshot, &repairs);
    assert!(!snapshot.net_names().contains(&"GHOST".to_string()));
}

#[test]
fn short_between_two_nets() {
    let snapshot = LayoutSnapshot {
        layers: top_layer(),
        primitives: vec![
            copper_rect(1, "GND", 0.0, 0.0, 1e-3, 1e-3),
            copper_rect(2, "GND", 0.9e-3, 0.0, 2e-3, 1e-3),
            // VCC copper overlapping the GND pour: an accidental bridge.
            copper_rect(3, "VCC", 1.9e-3, 0.0, 3e-3, 1e-3),
        ],
        ..Default::default()
    };
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let shorts = find_shorts(&graph);
    assert_eq!(shorts.len(), 1);
    let short = &shorts[0];
    assert_eq!(short.members[0].net, "GND");
    assert_eq!(short.members[0].object_count, 2);
    assert_eq!(short.nets().collect::<Vec<_>>(), vec!["GND", "VCC"]);
    assert_eq!(short.objects.len(), 3);

    let repairs = plan_short_repairs(&shorts);
    assert_eq!(
        repairs,
        vec![NetRepair::MergeNets {
            into: "GND".into(),
            from: vec!["VCC".into()],
        }]
    );
}

#[test]
fn short_merge_rejects_autogenerated_names_on_ties() {
    let snapshot = LayoutSnapshot {
        layers: top_layer(),
        primitives: vec![
            copper_rect(1, "Net-(C1-Pad2)", 0.0, 0.0, 1e-3, 1e-3),
            copper_rect(2, "SPI_CLK", 0.9e-3, 0.0, 2e-3, 1e-3),
        ],
        ..Default::default()
    };
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();

    let repairs = plan_short_repairs(&find_shorts(&graph));
    assert_eq!(
        repairs,
        vec![NetRepair::MergeNets {
            into: "SPI_CLK".into(),
            from: vec!["Net-(C1-Pad2)".into()],
        }]
    );
}

#[test]
fn short_merge_applies_cleanly() {
    let mut snapshot = LayoutSnapshot {
        nets: vec!["GND".into(), "VCC".into()],
        layers: top_layer(),
        primitives: vec![
            copper_rect(1, "GND", 0.0, 0.0, 1e-3, 1e-3),
            copper_rect(2, "GND", 0.9e-3, 0.0, 2e-3, 1e-3),
            copper_rect(3, "VCC", 1.9e-3, 0.0, 3e-3, 1e-3),
        ],
        ..Default::default()
    };
    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();
    let repairs = plan_short_repairs(&find_shorts(&graph));
    drop(engine);

    apply_repairs(&mut snapshot, &repairs);
    assert_eq!(snapshot.objects_on_net("GND").len(), 3);
    assert!(snapshot.objects_on_net("VCC").is_empty());
    assert!(!snapshot.net_names().contains(&"VCC".to_string()));

    // No short is left behind.
    let engine = DrcEngine::new(&snapshot);
    assert!(find_shorts(&engine.object_graph()).is_empty());
}

#[test]
fn via_joins_copper_to_its_net() {
    // A via pad overlapping a trace end connects the two objects.
    let mut snapshot = LayoutSnapshot {
        layers: top_layer(),
        primitives: vec![copper_rect(1, "CLK", 0.0, 0.0, 1e-3, 0.2e-3)],
        ..Default::default()
    };
    let mut via = bare_via(2, "CLK", 1e-3, 0.1e-3);
    via.pads = vec![coppercheck::snapshot::ViaPad {
        layer: "TOP".into(),
        shape: coppercheck::snapshot::PadShape::Round,
        diameter: 0.4e-3,
    }];
    snapshot.vias.push(via);

    let engine = DrcEngine::new(&snapshot);
    let graph = engine.object_graph();
    assert_eq!(graph.closure(1), BTreeSet::from([1, 2]));
    assert_eq!(graph.clusters_for_net("CLK").len(), 1);
}
