//! Layout snapshot data model.
//!
//! These are the read-only records the DRC engine consumes: geometric
//! primitives, padstack instances, components and the layer stack. The
//! snapshot is produced by an external layout database; the engine never
//! creates or edits geometry, it only reads it (the one exception being the
//! explicit net repair pass in [`crate::topology`]).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::geometry::{BBox, Point, Polygon};

/// Opaque object id, unique across primitives and vias within one snapshot.
pub type ObjectId = u64;

/// Layer role in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    /// Copper layer carrying traces, planes and pads.
    Signal,
    Dielectric,
    /// Board outline / profile layer.
    Outline,
}

/// Dielectric material properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: Option<String>,
    pub permittivity: f64,
    #[serde(default)]
    pub loss_tangent: f64,
}

/// One entry of the layer stack, listed top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    /// Thickness in meters. For signal layers this is the copper thickness.
    pub thickness: f64,
    pub material: Option<Material>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Path,
    Polygon,
    Circle,
    Rect,
}

/// A geometric primitive on one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    pub id: ObjectId,
    pub net: String,
    pub layer: String,
    pub kind: PrimitiveKind,
    /// Trace width in meters; present for paths.
    pub width: Option<f64>,
    /// Routed centerline length in meters; present for length-bearing
    /// primitives (paths and arcs).
    pub length: Option<f64>,
    /// Centerline endpoints; present for paths.
    pub start: Option<Point>,
    pub end: Option<Point>,
    /// Expanded outline in board coordinates (meters).
    pub outline: Polygon,
    #[serde(default)]
    pub is_void: bool,
}

impl Primitive {
    pub fn bbox(&self) -> Option<BBox> {
        self.outline.bbox()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadShape {
    Round,
    Square,
}

/// Pad geometry of a via on one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViaPad {
    pub layer: String,
    #[serde(default = "default_pad_shape")]
    pub shape: PadShape,
    /// Pad diameter (round) or side length (square), meters.
    pub diameter: f64,
}

fn default_pad_shape() -> PadShape {
    PadShape::Round
}

/// A padstack instance (plated via).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Via {
    pub id: ObjectId,
    pub name: Option<String>,
    pub net: String,
    pub position: Point,
    pub pads: Vec<ViaPad>,
    pub hole_diameter: f64,
    pub start_layer: String,
    pub stop_layer: String,
    /// Depth removed by a back-drill operation, meters. Absent when no
    /// back-drill is defined for this via.
    pub backdrill_depth: Option<f64>,
    /// Reference designator of the owning component, if any.
    pub component: Option<String>,
}

impl Via {
    /// Largest pad diameter across layers, falling back to the hole.
    pub fn pad_extent(&self) -> f64 {
        self.pads
            .iter()
            .map(|p| p.diameter)
            .fold(self.hole_diameter, f64::max)
    }

    /// Synthetic square outline used for contact/adjacency geometry.
    pub fn outline(&self) -> Polygon {
        let half = (self.pad_extent() / 2.0).max(1e-6);
        Polygon::rect(
            Point::new(self.position.x - half, self.position.y - half),
            Point::new(self.position.x + half, self.position.y + half),
        )
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("via{}", self.id),
        }
    }
}

/// A placed component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub reference: String,
    pub bbox: BBox,
    pub center: Option<Point>,
}

impl Component {
    pub fn center(&self) -> Point {
        self.center.unwrap_or_else(|| self.bbox.center())
    }
}

/// Either kind of net-bearing object, by reference.
#[derive(Debug, Clone, Copy)]
pub enum DrcObject<'a> {
    Primitive(&'a Primitive),
    Via(&'a Via),
}

impl<'a> DrcObject<'a> {
    pub fn id(&self) -> ObjectId {
        match self {
            DrcObject::Primitive(p) => p.id,
            DrcObject::Via(v) => v.id,
        }
    }

    pub fn net(&self) -> &'a str {
        match self {
            DrcObject::Primitive(p) => &p.net,
            DrcObject::Via(v) => &v.net,
        }
    }

    /// Contact outline: the primitive's own outline, or the via's pad square.
    pub fn outline(&self) -> Polygon {
        match self {
            DrcObject::Primitive(p) => p.outline.clone(),
            DrcObject::Via(v) => v.outline(),
        }
    }

    pub fn is_via(&self) -> bool {
        matches!(self, DrcObject::Via(_))
    }
}

/// Validate that ids are unique across primitives and vias.
pub(crate) fn check_unique_ids(
    primitives: &[Primitive],
    vias: &[Via],
) -> Result<(), ObjectId> {
    let mut seen: HashSet<ObjectId> = HashSet::new();
    for id in primitives
        .iter()
        .map(|p| p.id)
        .chain(vias.iter().map(|v| v.id))
    {
        if !seen.insert(id) {
            return Err(id);
        }
    }
    Ok(())
}
