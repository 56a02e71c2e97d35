//! R-tree spatial index over the snapshot.
//!
//! Built once per engine instance, queried as the broad phase of every
//! proximity rule. Entries carry only the object id and its bounding box;
//! the snapshot resolves ids back to geometry for the narrow phase.

use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::BBox;
use crate::snapshot::{LayoutSnapshot, ObjectId};

/// Padding applied around a via's point position so its index entry is a
/// non-degenerate box (±1 mm).
const VIA_INDEX_MARGIN: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Primitive,
    Via,
    Component,
}

/// One indexed bounding box.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: ObjectId,
    pub kind: EntryKind,
    pub bbox: BBox,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Bounding-box index over primitives, vias and components.
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
}

impl SpatialIndex {
    /// Build from a snapshot in one bulk load. An empty snapshot yields an
    /// empty index; every query then returns no results.
    pub fn build(snapshot: &LayoutSnapshot) -> Self {
        let mut entries = Vec::new();
        for prim in &snapshot.primitives {
            if let Some(bbox) = prim.bbox() {
                entries.push(IndexEntry {
                    id: prim.id,
                    kind: EntryKind::Primitive,
                    bbox,
                });
            }
        }
        for via in &snapshot.vias {
            entries.push(IndexEntry {
                id: via.id,
                kind: EntryKind::Via,
                bbox: BBox::around(via.position, VIA_INDEX_MARGIN),
            });
        }
        for (i, comp) in snapshot.components.iter().enumerate() {
            // Components live in a separate id space; offset keeps entries
            // distinct without colliding with object ids.
            entries.push(IndexEntry {
                id: u64::MAX - i as u64,
                kind: EntryKind::Component,
                bbox: comp.bbox,
            });
        }
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// All entries whose bounding box intersects `bbox`.
    pub fn intersecting(&self, bbox: &BBox) -> Vec<&IndexEntry> {
        let envelope = AABB::from_corners(
            [bbox.min.x, bbox.min.y],
            [bbox.max.x, bbox.max.y],
        );
        self.tree.locate_in_envelope_intersecting(&envelope).collect()
    }

    /// Broad-phase neighbor query: entries intersecting `bbox` grown by
    /// `margin` on every side.
    pub fn nearby(&self, bbox: &BBox, margin: f64) -> Vec<&IndexEntry> {
        self.intersecting(&bbox.inflate(margin))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::snapshot::{Primitive, PrimitiveKind};

    fn prim(id: ObjectId, x0: f64, y0: f64, x1: f64, y1: f64) -> Primitive {
        Primitive {
            id,
            net: "N".into(),
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

    #[test]
    fn test_intersecting_query() {
        let snapshot = LayoutSnapshot {
            primitives: vec![prim(1, 0.0, 0.0, 1.0, 1.0), prim(2, 5.0, 5.0, 6.0, 6.0)],
            ..Default::default()
        };
        let index = SpatialIndex::build(&snapshot);
        assert_eq!(index.len(), 2);

        let query = BBox::new(Point::new(-0.5, -0.5), Point::new(0.5, 0.5));
        let hits: Vec<ObjectId> = index.intersecting(&query).iter().map(|e| e.id).collect();
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_nearby_margin() {
        let snapshot = LayoutSnapshot {
            primitives: vec![prim(1, 0.0, 0.0, 1.0, 1.0), prim(2, 3.0, 0.0, 4.0, 1.0)],
            ..Default::default()
        };
        let index = SpatialIndex::build(&snapshot);

        let from = snapshot.primitives[0].bbox().unwrap();
        let close: Vec<ObjectId> = index.nearby(&from, 1.0).iter().map(|e| e.id).collect();
        assert_eq!(close, vec![1]);
        let mut wide: Vec<ObjectId> = index.nearby(&from, 2.5).iter().map(|e| e.id).collect();
        wide.sort_unstable();
        assert_eq!(wide, vec![1, 2]);
    }

    #[test]
    fn test_empty_snapshot() {
        let index = SpatialIndex::build(&LayoutSnapshot::default());
        assert!(index.is_empty());
        let query = BBox::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        assert!(index.intersecting(&query).is_empty());
    }
}
