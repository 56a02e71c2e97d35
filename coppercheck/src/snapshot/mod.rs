//! Read-only layout snapshot consumed by the DRC engine.
//!
//! The snapshot is the engine's only window into the design: primitives,
//! padstack instances, components, declared nets and the layer stack. It can
//! be deserialized from a JSON export of the layout database or built
//! programmatically (tests do the latter).

pub mod schema;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::DrcError;
use crate::geometry::{union_area, BBox, Polygon};
use crate::impedance::TraceTopology;

pub use schema::{
    Component, DrcObject, Layer, LayerKind, Material, ObjectId, PadShape, Primitive,
    PrimitiveKind, Via, ViaPad,
};

/// Relative permittivity assumed for dielectric layers that carry no
/// material reference (plain FR-4).
const DEFAULT_PERMITTIVITY: f64 = 4.4;

/// Electrical cross-section of a trace on one signal layer, resolved from
/// the layer stack for the impedance checks.
#[derive(Debug, Clone, Copy)]
pub struct TraceProfile {
    pub topology: TraceTopology,
    /// Copper thickness of the signal layer, meters.
    pub copper_thickness: f64,
    /// Dielectric height to the reference layer, meters.
    pub dielectric_height: f64,
    pub permittivity: f64,
}

/// A complete, immutable view of one layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    /// Declared net names. Nets referenced by objects but not declared here
    /// are still reported by [`LayoutSnapshot::net_names`].
    #[serde(default)]
    pub nets: Vec<String>,
    /// Layer stack, top to bottom.
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub primitives: Vec<Primitive>,
    #[serde(default)]
    pub vias: Vec<Via>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl LayoutSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self, DrcError> {
        let snapshot: LayoutSnapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DrcError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), DrcError> {
        if let Err(id) = schema::check_unique_ids(&self.primitives, &self.vias) {
            return Err(DrcError::Snapshot(format!("duplicate object id {id}")));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty() && self.vias.is_empty() && self.components.is_empty()
    }

    /// All net-bearing objects (primitives, then vias).
    pub fn objects(&self) -> impl Iterator<Item = DrcObject<'_>> {
        self.primitives
            .iter()
            .map(DrcObject::Primitive)
            .chain(self.vias.iter().map(DrcObject::Via))
    }

    pub fn object(&self, id: ObjectId) -> Option<DrcObject<'_>> {
        self.objects().find(|o| o.id() == id)
    }

    pub fn primitive(&self, id: ObjectId) -> Option<&Primitive> {
        self.primitives.iter().find(|p| p.id == id)
    }

    pub fn via(&self, id: ObjectId) -> Option<&Via> {
        self.vias.iter().find(|v| v.id == id)
    }

    /// Declared nets first, then any undeclared net in order of appearance.
    pub fn net_names(&self) -> Vec<String> {
        let mut names = self.nets.clone();
        for obj in self.objects() {
            let net = obj.net();
            if !net.is_empty() && !names.iter().any(|n| n == net) {
                names.push(net.to_string());
            }
        }
        names
    }

    pub fn objects_on_net<'a>(&'a self, net: &str) -> Vec<DrcObject<'a>> {
        self.objects().filter(|o| o.net() == net).collect()
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn signal_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.kind == LayerKind::Signal)
    }

    /// Non-void primitives drawn on outline-kind layers (the board edge).
    pub fn outline_primitives(&self) -> Vec<&Primitive> {
        self.primitives
            .iter()
            .filter(|p| {
                !p.is_void
                    && self
                        .layer(&p.layer)
                        .map(|l| l.kind == LayerKind::Outline)
                        .unwrap_or(false)
            })
            .collect()
    }

    /// Total board area in m², from the outline polygons. Falls back to the
    /// bounding box of all primitives when no outline layer is present.
    pub fn board_area(&self) -> f64 {
        let outlines: Vec<&Polygon> = self
            .outline_primitives()
            .iter()
            .map(|p| &p.outline)
            .collect();
        if !outlines.is_empty() {
            return union_area(&outlines);
        }
        debug!("no outline layer; board area falls back to the design bounding box");
        self.design_bbox().map(|b| b.area()).unwrap_or(0.0)
    }

    /// Overall design extent.
    pub fn design_bbox(&self) -> Option<BBox> {
        self.primitives
            .iter()
            .filter_map(|p| p.bbox())
            .reduce(|a, b| a.union(&b))
    }

    /// Whether `name` is the outermost signal layer on either side of the
    /// stack. Outer traces are microstrip, buried traces stripline.
    pub fn is_outer_signal_layer(&self, name: &str) -> bool {
        let mut signals = self
            .layers
            .iter()
            .filter(|l| l.kind == LayerKind::Signal);
        let first = signals.next();
        let last = signals.last().or(first);
        matches!(first, Some(l) if l.name == name) || matches!(last, Some(l) if l.name == name)
    }

    /// Resolve the trace cross-section for a signal layer: topology
    /// (microstrip/stripline), copper thickness, and the dielectric height
    /// and permittivity toward the nearest reference layer.
    pub fn trace_profile(&self, layer_name: &str) -> Option<TraceProfile> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.name == layer_name && l.kind == LayerKind::Signal)?;
        let copper_thickness = self.layers[idx].thickness;

        let down = self.dielectric_run(idx, 1);
        let up = self.dielectric_run(idx, -1);

        if self.is_outer_signal_layer(layer_name) {
            // Outer layer: the reference lies on the board-inward side.
            let (height, permittivity) = down.or(up)?;
            Some(TraceProfile {
                topology: TraceTopology::Microstrip,
                copper_thickness,
                dielectric_height: height,
                permittivity,
            })
        } else {
            // Buried layer: use the thinner dielectric span, that is the
            // nearest reference.
            let (height, permittivity) = match (down, up) {
                (Some(d), Some(u)) => {
                    if d.0 <= u.0 {
                        d
                    } else {
                        u
                    }
                }
                (Some(d), None) => d,
                (None, Some(u)) => u,
                (None, None) => return None,
            };
            Some(TraceProfile {
                topology: TraceTopology::Stripline,
                copper_thickness,
                dielectric_height: height,
                permittivity,
            })
        }
    }

    /// Cumulative dielectric thickness and thickness-weighted permittivity
    /// from `idx` toward the next signal layer in direction `step`.
    fn dielectric_run(&self, idx: usize, step: i64) -> Option<(f64, f64)> {
        let mut height = 0.0;
        let mut weighted_er = 0.0;
        let mut i = idx as i64 + step;
        while i >= 0 && (i as usize) < self.layers.len() {
            let layer = &self.layers[i as usize];
            match layer.kind {
                LayerKind::Dielectric => {
                    let er = layer
                        .material
                        .as_ref()
                        .map(|m| m.permittivity)
                        .unwrap_or(DEFAULT_PERMITTIVITY);
                    height += layer.thickness;
                    weighted_er += er * layer.thickness;
                }
                LayerKind::Signal => break,
                LayerKind::Outline => {}
            }
            i += step;
        }
        if height > 0.0 {
            Some((height, weighted_er / height))
        } else {
            None
        }
    }

    /// Barrel length of a via through the stack, from its start layer to
    /// its stop layer inclusive.
    pub fn via_span_length(&self, via: &Via) -> Option<f64> {
        let a = self.layers.iter().position(|l| l.name == via.start_layer)?;
        let b = self.layers.iter().position(|l| l.name == via.stop_layer)?;
        let (lo, hi) = (a.min(b), a.max(b));
        Some(self.layers[lo..=hi].iter().map(|l| l.thickness).sum())
    }

    // ---- mutation support for the topology repair pass ----
    // `check()` never calls these; see crate::topology.

    pub fn set_object_net(&mut self, id: ObjectId, net: &str) -> bool {
        if let Some(p) = self.primitives.iter_mut().find(|p| p.id == id) {
            p.net = net.to_string();
            return true;
        }
        if let Some(v) = self.vias.iter_mut().find(|v| v.id == id) {
            v.net = net.to_string();
            return true;
        }
        false
    }

    pub fn remove_object(&mut self, id: ObjectId) -> bool {
        let before = self.primitives.len() + self.vias.len();
        self.primitives.retain(|p| p.id != id);
        self.vias.retain(|v| v.id != id);
        before != self.primitives.len() + self.vias.len()
    }

    pub fn declare_net(&mut self, name: &str) {
        if !self.nets.iter().any(|n| n == name) {
            self.nets.push(name.to_string());
        }
    }

    pub fn remove_net_declaration(&mut self, name: &str) {
        self.nets.retain(|n| n != name);
    }
}
