//! Check routines, one per rule kind.
//!
//! Every routine reads the layout through the snapshot and the spatial
//! index only, and appends violations to the shared list. A rule that
//! references a net or layer missing from the snapshot simply finds zero
//! matches; rule decks are written generically and reused across designs.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use crate::geometry::Polygon;
use crate::impedance::{
    deviation_percent, differential_impedance, single_ended_z0, TraceCrossSection,
};
use crate::report::Violation;
use crate::rules::{DiffPair, NetSelector, Rule};
use crate::snapshot::{LayerKind, LayoutSnapshot, ObjectId, Primitive, PrimitiveKind};
use crate::spatial::{EntryKind, SpatialIndex};
use crate::units::meters_to_um;

/// Read-only view handed to every check routine.
pub(crate) struct CheckContext<'a> {
    pub snapshot: &'a LayoutSnapshot,
    pub index: &'a SpatialIndex,
    primitives_by_id: HashMap<ObjectId, &'a Primitive>,
}

impl<'a> CheckContext<'a> {
    pub fn new(snapshot: &'a LayoutSnapshot, index: &'a SpatialIndex) -> Self {
        let primitives_by_id = snapshot.primitives.iter().map(|p| (p.id, p)).collect();
        Self {
            snapshot,
            index,
            primitives_by_id,
        }
    }

    /// Signal layers targeted by a rule: the explicit list filtered to
    /// layers that exist, or every signal layer.
    fn target_layers(&self, layers: &Option<Vec<String>>) -> Vec<String> {
        match layers {
            Some(named) => named
                .iter()
                .filter(|n| {
                    let known = self
                        .snapshot
                        .layer(n)
                        .map(|l| l.kind == LayerKind::Signal)
                        .unwrap_or(false);
                    if !known {
                        debug!(layer = n.as_str(), "rule targets a layer not in the snapshot");
                    }
                    known
                })
                .cloned()
                .collect(),
            None => self.snapshot.signal_layers().map(|l| l.name.clone()).collect(),
        }
    }

    /// Copper-bearing primitives on one signal layer.
    fn copper_on_layer(&self, layer: &str) -> Vec<&'a Primitive> {
        self.snapshot
            .primitives
            .iter()
            .filter(|p| p.layer == layer && !p.is_void)
            .collect()
    }

    fn paths_on_layer(&self, layer: &str) -> Vec<&'a Primitive> {
        self.copper_on_layer(layer)
            .into_iter()
            .filter(|p| p.kind == PrimitiveKind::Path && p.width.is_some())
            .collect()
    }
}

/// Dispatch one rule instance.
pub(crate) fn run_rule(ctx: &CheckContext<'_>, rule: &Rule, out: &mut Vec<Violation>) {
    match rule {
        Rule::MinLineWidth {
            name,
            min_width,
            layers,
        } => line_width(ctx, name, *min_width, layers, true, out),
        Rule::MaxLineWidth {
            name,
            max_width,
            layers,
        } => line_width(ctx, name, *max_width, layers, false, out),
        Rule::MinClearance {
            name,
            min_clearance,
            net1,
            net2,
        } => clearance(ctx, name, *min_clearance, net1, net2, out),
        Rule::MinAnnularRing { name, min_ring } => annular_ring(ctx, name, *min_ring, out),
        Rule::MinCopperToBoardEdge { name, min_distance } => {
            board_edge(ctx, name, *min_distance, out)
        }
        Rule::CopperBalance {
            name,
            max_percent,
            layers,
        } => copper_balance(ctx, name, *max_percent, layers, out),
        Rule::DiffPairLengthMatch {
            name,
            tolerance,
            pairs,
        } => length_match(ctx, name, *tolerance, pairs, out),
        Rule::ImpedanceSingleEnd {
            name,
            target_ohms,
            tolerance_percent,
            layers,
        } => impedance_single(ctx, name, *target_ohms, *tolerance_percent, layers, out),
        Rule::ImpedanceDiffPair {
            name,
            target_ohms,
            tolerance_percent,
            pairs,
        } => impedance_diff(ctx, name, *target_ohms, *tolerance_percent, pairs, out),
        Rule::BackDrillStubLength { name, max_stub } => {
            back_drill_stub(ctx, name, *max_stub, out)
        }
    }
}

fn line_width(
    ctx: &CheckContext<'_>,
    name: &str,
    threshold: f64,
    layers: &Option<Vec<String>>,
    is_min: bool,
    out: &mut Vec<Violation>,
) {
    let kind = if is_min { "min_line_width" } else { "max_line_width" };
    for layer in ctx.target_layers(layers) {
        for prim in ctx.paths_on_layer(&layer) {
            let width = prim.width.unwrap_or(0.0);
            // Strict comparison: a path exactly at the threshold passes.
            let bad = if is_min {
                width < threshold
            } else {
                width > threshold
            };
            if !bad {
                continue;
            }
            let bound = if is_min { "minimum" } else { "maximum" };
            out.push(Violation {
                rule: kind.into(),
                name: name.into(),
                layer: Some(layer.clone()),
                net: Some(prim.net.clone()),
                object: Some(prim.id),
                value_um: Some(meters_to_um(width)),
                limit_um: Some(meters_to_um(threshold)),
                message: format!(
                    "path {} on {} is {:.3}µm wide, {} is {:.3}µm",
                    prim.id,
                    layer,
                    meters_to_um(width),
                    bound,
                    meters_to_um(threshold)
                ),
                ..Default::default()
            });
        }
    }
}

fn clearance(
    ctx: &CheckContext<'_>,
    name: &str,
    min_clearance: f64,
    net1: &NetSelector,
    net2: &NetSelector,
    out: &mut Vec<Violation>,
) {
    // Copper on signal layers only; the outline layer never takes part.
    let copper_layer = |p: &Primitive| {
        ctx.snapshot
            .layer(&p.layer)
            .map(|l| l.kind == LayerKind::Signal)
            .unwrap_or(false)
    };

    let seeds: Vec<&Primitive> = ctx
        .snapshot
        .primitives
        .iter()
        .filter(|p| !p.is_void && copper_layer(p) && net1.matches(&p.net))
        .collect();

    // Broad phase per seed via the R-tree, narrow phase on the outlines.
    // Each worker produces its own batch; batches are merged in seed order
    // so the result is deterministic.
    let batches: Vec<Vec<Violation>> = seeds
        .par_iter()
        .map(|a| {
            let mut found = Vec::new();
            let Some(bbox) = a.bbox() else {
                return found;
            };
            let mut candidates: Vec<ObjectId> = ctx
                .index
                .nearby(&bbox, min_clearance)
                .into_iter()
                .filter(|e| e.kind == EntryKind::Primitive && e.id != a.id)
                .map(|e| e.id)
                .collect();
            candidates.sort_unstable();

            for id in candidates {
                let Some(b) = ctx.primitives_by_id.get(&id).copied() else {
                    continue;
                };
                if b.is_void || b.layer != a.layer || b.net == a.net {
                    continue;
                }
                if !net2.matches(&b.net) {
                    continue;
                }
                // When the selectors also match with the roles swapped the
                // pair would be visited twice; keep the lower id as owner.
                if net1.matches(&b.net) && net2.matches(&a.net) && a.id >= b.id {
                    continue;
                }
                let distance = a.outline.distance_to(&b.outline);
                // Touching copper (distance 0) is a short, not a clearance
                // violation; the topology analyzer reports those.
                if distance > 0.0 && distance < min_clearance {
                    found.push(Violation {
                        rule: "min_clearance".into(),
                        name: name.into(),
                        layer: Some(a.layer.clone()),
                        net: Some(a.net.clone()),
                        net2: Some(b.net.clone()),
                        object: Some(a.id),
                        object2: Some(b.id),
                        value_um: Some(meters_to_um(distance)),
                        limit_um: Some(meters_to_um(min_clearance)),
                        message: format!(
                            "{} to {} spacing on {} is {:.3}µm, minimum is {:.3}µm",
                            a.net,
                            b.net,
                            a.layer,
                            meters_to_um(distance),
                            meters_to_um(min_clearance)
                        ),
                        ..Default::default()
                    });
                }
            }
            found
        })
        .collect();

    for batch in batches {
        out.extend(batch);
    }
}

fn annular_ring(ctx: &CheckContext<'_>, name: &str, min_ring: f64, out: &mut Vec<Violation>) {
    for via in &ctx.snapshot.vias {
        // First defined pad layer decides the ring, matching how the
        // padstack is fabricated from its primary definition.
        let Some(pad) = via.pads.first() else {
            continue;
        };
        let ring = (pad.diameter - via.hole_diameter) / 2.0;
        if ring < min_ring {
            out.push(Violation {
                rule: "min_annular_ring".into(),
                name: name.into(),
                net: Some(via.net.clone()),
                object: Some(via.id),
                via: Some(via.display_name()),
                value_um: Some(meters_to_um(ring)),
                limit_um: Some(meters_to_um(min_ring)),
                message: format!(
                    "via {} annular ring is {:.3}µm, minimum is {:.3}µm",
                    via.display_name(),
                    meters_to_um(ring),
                    meters_to_um(min_ring)
                ),
                ..Default::default()
            });
        }
    }
}

fn board_edge(ctx: &CheckContext<'_>, name: &str, min_distance: f64, out: &mut Vec<Violation>) {
    let outlines = ctx.snapshot.outline_primitives();
    if outlines.is_empty() {
        debug!("no outline layer in the snapshot; board edge rule finds nothing");
        return;
    }
    let layers: Vec<String> = ctx.snapshot.signal_layers().map(|l| l.name.clone()).collect();
    for layer in layers {
        for prim in ctx.copper_on_layer(&layer) {
            let Some(bbox) = prim.bbox() else { continue };
            // Every outline segment is checked on its own; one primitive
            // can violate against several edge segments.
            for edge in &outlines {
                let Some(edge_bbox) = edge.bbox() else { continue };
                if !bbox.inflate(min_distance).intersects(&edge_bbox) {
                    continue;
                }
                // Copper sits inside the outline, so measure to the edge
                // contour rather than the solid polygon.
                let distance = prim.outline.contour_distance_to(&edge.outline);
                if distance < min_distance {
                    out.push(Violation {
                        rule: "min_copper_to_board_edge".into(),
                        name: name.into(),
                        layer: Some(layer.clone()),
                        net: Some(prim.net.clone()),
                        object: Some(prim.id),
                        object2: Some(edge.id),
                        value_um: Some(meters_to_um(distance)),
                        limit_um: Some(meters_to_um(min_distance)),
                        message: format!(
                            "copper {} on {} is {:.3}µm from the board edge, minimum is {:.3}µm",
                            prim.id,
                            layer,
                            meters_to_um(distance),
                            meters_to_um(min_distance)
                        ),
                        ..Default::default()
                    });
                }
            }
        }
    }
}

fn copper_balance(
    ctx: &CheckContext<'_>,
    name: &str,
    max_percent: f64,
    layers: &Option<Vec<String>>,
    out: &mut Vec<Violation>,
) {
    let board_area = ctx.snapshot.board_area();
    if board_area <= 0.0 {
        debug!("board area is zero; copper balance finds nothing");
        return;
    }
    let half = board_area / 2.0;
    for layer in ctx.target_layers(layers) {
        let polygons: Vec<&Polygon> = ctx
            .copper_on_layer(&layer)
            .into_iter()
            .map(|p| &p.outline)
            .collect();
        let copper = crate::geometry::union_area(&polygons);
        let imbalance = (copper - half).abs() / half * 100.0;
        if imbalance > max_percent {
            out.push(Violation {
                rule: "copper_balance".into(),
                name: name.into(),
                layer: Some(layer.clone()),
                imbalance_pct: Some(imbalance),
                limit_pct: Some(max_percent),
                message: format!(
                    "copper on {layer} is {imbalance:.1}% out of balance, limit {max_percent:.1}%"
                ),
                ..Default::default()
            });
        }
    }
}

fn length_match(
    ctx: &CheckContext<'_>,
    name: &str,
    tolerance: f64,
    pairs: &[DiffPair],
    out: &mut Vec<Violation>,
) {
    let routed_length = |net: &str| -> f64 {
        ctx.snapshot
            .primitives
            .iter()
            .filter(|p| p.net == net)
            .filter_map(|p| p.length)
            .sum()
    };
    for pair in pairs {
        let len_p = routed_length(&pair.positive);
        let len_n = routed_length(&pair.negative);
        if len_p == 0.0 && len_n == 0.0 {
            debug!(
                pair = %format!("{}/{}", pair.positive, pair.negative),
                "differential pair has no routed length in the snapshot"
            );
            continue;
        }
        let diff = (len_p - len_n).abs();
        if diff > tolerance {
            out.push(Violation {
                rule: "diff_pair_length_match".into(),
                name: name.into(),
                net: Some(pair.positive.clone()),
                net2: Some(pair.negative.clone()),
                value_um: Some(meters_to_um(diff)),
                limit_um: Some(meters_to_um(tolerance)),
                message: format!(
                    "pair {}/{} length mismatch is {:.1}µm, tolerance {:.1}µm",
                    pair.positive,
                    pair.negative,
                    meters_to_um(diff),
                    meters_to_um(tolerance)
                ),
                ..Default::default()
            });
        }
    }
}

fn impedance_single(
    ctx: &CheckContext<'_>,
    name: &str,
    target_ohms: f64,
    tolerance_percent: f64,
    layers: &Option<Vec<String>>,
    out: &mut Vec<Violation>,
) {
    for layer in ctx.target_layers(layers) {
        let Some(profile) = ctx.snapshot.trace_profile(&layer) else {
            debug!(layer = layer.as_str(), "no stack profile; impedance rule skips layer");
            continue;
        };
        for prim in ctx.paths_on_layer(&layer) {
            let xs = TraceCrossSection {
                width: prim.width.unwrap_or(0.0),
                thickness: profile.copper_thickness,
                height: profile.dielectric_height,
                permittivity: profile.permittivity,
            };
            if xs.width <= 0.0 {
                continue;
            }
            let z0 = single_ended_z0(profile.topology, &xs);
            let deviation = deviation_percent(z0, target_ohms);
            if deviation > tolerance_percent {
                out.push(Violation {
                    rule: "impedance_single_end".into(),
                    name: name.into(),
                    layer: Some(layer.clone()),
                    net: Some(prim.net.clone()),
                    object: Some(prim.id),
                    z_ohms: Some(z0),
                    target_ohms: Some(target_ohms),
                    deviation_pct: Some(deviation),
                    limit_pct: Some(tolerance_percent),
                    message: format!(
                        "trace {} on {} computes to {:.1}Ω, {:.1}% off the {:.0}Ω target",
                        prim.id, layer, z0, deviation, target_ohms
                    ),
                    ..Default::default()
                });
            }
        }
    }
}

fn impedance_diff(
    ctx: &CheckContext<'_>,
    name: &str,
    target_ohms: f64,
    tolerance_percent: f64,
    pairs: &[DiffPair],
    out: &mut Vec<Violation>,
) {
    for pair in pairs {
        // Representative positive-side trace: the lowest-id routed path.
        let positive = ctx
            .snapshot
            .primitives
            .iter()
            .filter(|p| {
                p.net == pair.positive && p.kind == PrimitiveKind::Path && p.width.is_some()
            })
            .min_by_key(|p| p.id);
        let Some(positive) = positive else {
            debug!(net = pair.positive.as_str(), "positive net has no routed path");
            continue;
        };
        let Some(profile) = ctx.snapshot.trace_profile(&positive.layer) else {
            continue;
        };

        // Edge-to-edge gap to the nearest negative-side trace.
        let gap = ctx
            .snapshot
            .primitives
            .iter()
            .filter(|p| p.net == pair.negative && p.kind == PrimitiveKind::Path)
            .map(|p| positive.outline.distance_to(&p.outline))
            .fold(f64::INFINITY, f64::min);
        if !gap.is_finite() || gap <= 0.0 {
            debug!(
                pair = %format!("{}/{}", pair.positive, pair.negative),
                "no usable pair gap; differential impedance skips pair"
            );
            continue;
        }

        let xs = TraceCrossSection {
            width: positive.width.unwrap_or(0.0),
            thickness: profile.copper_thickness,
            height: profile.dielectric_height,
            permittivity: profile.permittivity,
        };
        let zdiff = differential_impedance(profile.topology, &xs, gap);
        let deviation = deviation_percent(zdiff, target_ohms);
        if deviation > tolerance_percent {
            out.push(Violation {
                rule: "impedance_diff_pair".into(),
                name: name.into(),
                layer: Some(positive.layer.clone()),
                net: Some(pair.positive.clone()),
                net2: Some(pair.negative.clone()),
                object: Some(positive.id),
                z_ohms: Some(zdiff),
                target_ohms: Some(target_ohms),
                deviation_pct: Some(deviation),
                limit_pct: Some(tolerance_percent),
                message: format!(
                    "pair {}/{} computes to {:.1}Ω differential, {:.1}% off the {:.0}Ω target",
                    pair.positive, pair.negative, zdiff, deviation, target_ohms
                ),
                ..Default::default()
            });
        }
    }
}

fn back_drill_stub(ctx: &CheckContext<'_>, name: &str, max_stub: f64, out: &mut Vec<Violation>) {
    for via in &ctx.snapshot.vias {
        // No back-drill attribute means no back-drill operation is defined
        // for this via; that is not a violation.
        let Some(depth) = via.backdrill_depth else {
            continue;
        };
        let Some(span) = ctx.snapshot.via_span_length(via) else {
            continue;
        };
        let stub = span - depth;
        if stub > max_stub {
            out.push(Violation {
                rule: "back_drill_stub_length".into(),
                name: name.into(),
                net: Some(via.net.clone()),
                object: Some(via.id),
                via: Some(via.display_name()),
                value_um: Some(meters_to_um(stub)),
                limit_um: Some(meters_to_um(max_stub)),
                message: format!(
                    "via {} keeps a {:.1}µm stub after back-drilling, limit {:.1}µm",
                    via.display_name(),
                    meters_to_um(stub),
                    meters_to_um(max_stub)
                ),
                ..Default::default()
            });
        }
    }
}
