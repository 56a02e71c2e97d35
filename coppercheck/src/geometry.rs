//! Planar geometry for the DRC checks.
//!
//! Coordinates are in meters. Polygons are simple closed outlines given as
//! ordered vertex lists; the closing edge from the last vertex back to the
//! first is implicit.

use serde::{Deserialize, Serialize};

/// A 2D point in board coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Grow the box by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> BBox {
        BBox::new(
            Point::new(self.min.x - margin, self.min.y - margin),
            Point::new(self.max.x + margin, self.max.y + margin),
        )
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    /// Box centered on `p` with half-extent `half` in both axes.
    pub fn around(p: Point, half: f64) -> BBox {
        BBox::new(
            Point::new(p.x - half, p.y - half),
            Point::new(p.x + half, p.y + half),
        )
    }
}

/// A simple closed polygon outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn rect(min: Point, max: Point) -> Self {
        Self::new(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// A polygon needs at least three vertices to bound area.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.points)
    }

    /// Unsigned area by the shoelace formula.
    pub fn area(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        let mut acc = 0.0;
        for (a, b) in self.edges() {
            acc += a.x * b.y - b.x * a.y;
        }
        acc.abs() / 2.0
    }

    /// Edges including the implicit closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Even-odd point containment test.
    pub fn contains(&self, p: &Point) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Minimum edge-to-edge distance to another polygon.
    ///
    /// Returns 0.0 when the outlines touch, cross, or one polygon lies
    /// inside the other.
    pub fn distance_to(&self, other: &Polygon) -> f64 {
        if self.is_degenerate() || other.is_degenerate() {
            return f64::INFINITY;
        }
        if self.contains(&other.points[0]) || other.contains(&self.points[0]) {
            return 0.0;
        }
        let mut best = f64::INFINITY;
        for (a0, a1) in self.edges() {
            for (b0, b1) in other.edges() {
                let d = segment_distance(a0, a1, b0, b1);
                if d <= 0.0 {
                    return 0.0;
                }
                best = best.min(d);
            }
        }
        best
    }

    /// Minimum distance from this outline to another polygon's boundary
    /// contour, ignoring containment. This is the right measure against an
    /// enclosing contour such as the board edge, where everything is
    /// "inside" but the distance to the rim is what matters.
    pub fn contour_distance_to(&self, other: &Polygon) -> f64 {
        if self.is_degenerate() || other.is_degenerate() {
            return f64::INFINITY;
        }
        let mut best = f64::INFINITY;
        for (a0, a1) in self.edges() {
            for (b0, b1) in other.edges() {
                let d = segment_distance(a0, a1, b0, b1);
                if d <= 0.0 {
                    return 0.0;
                }
                best = best.min(d);
            }
        }
        best
    }

    /// X-intervals where a horizontal line at `y` lies inside the polygon
    /// (even-odd rule). Crossing x-values are appended to `out` unsorted.
    fn scanline_crossings(&self, y: f64, out: &mut Vec<f64>) {
        for (a, b) in self.edges() {
            if (a.y > y) != (b.y > y) {
                out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
    }
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn segments_intersect(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    let d1 = cross(b0, b1, a0);
    let d2 = cross(b0, b1, a1);
    let d3 = cross(a0, a1, b0);
    let d4 = cross(a0, a1, b1);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    false
}

fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return p.distance_to(&a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len2).clamp(0.0, 1.0);
    p.distance_to(&Point::new(a.x + t * abx, a.y + t * aby))
}

/// Minimum distance between two line segments, 0.0 if they intersect.
pub fn segment_distance(a0: Point, a1: Point, b0: Point, b1: Point) -> f64 {
    if segments_intersect(a0, a1, b0, b1) {
        return 0.0;
    }
    point_segment_distance(a0, b0, b1)
        .min(point_segment_distance(a1, b0, b1))
        .min(point_segment_distance(b0, a0, a1))
        .min(point_segment_distance(b1, a0, a1))
}

/// Area of the union of a set of polygons.
///
/// Scanline-band integration: bands are delimited by every distinct vertex
/// y-coordinate, the covered x-interval union is evaluated at each band's
/// midline and multiplied by the band height. Exact for rectilinear copper,
/// which is what zone fills and plane layers overwhelmingly are.
pub fn union_area(polygons: &[&Polygon]) -> f64 {
    let mut ys: Vec<f64> = polygons
        .iter()
        .filter(|p| !p.is_degenerate())
        .flat_map(|p| p.points.iter().map(|pt| pt.y))
        .collect();
    if ys.is_empty() {
        return 0.0;
    }
    ys.sort_by(|a, b| a.total_cmp(b));
    ys.dedup();

    let mut total = 0.0;
    let mut crossings = Vec::new();
    for band in ys.windows(2) {
        let (y0, y1) = (band[0], band[1]);
        let height = y1 - y0;
        if height <= 0.0 {
            continue;
        }
        let mid = (y0 + y1) / 2.0;

        let mut intervals: Vec<(f64, f64)> = Vec::new();
        for poly in polygons {
            crossings.clear();
            poly.scanline_crossings(mid, &mut crossings);
            crossings.sort_by(|a, b| a.total_cmp(b));
            for pair in crossings.chunks(2) {
                if let [x0, x1] = pair {
                    intervals.push((*x0, *x1));
                }
            }
        }
        if intervals.is_empty() {
            continue;
        }
        intervals.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Merge overlapping intervals and accumulate the covered span.
        let mut covered = 0.0;
        let (mut lo, mut hi) = intervals[0];
        for &(x0, x1) in &intervals[1..] {
            if x0 > hi {
                covered += hi - lo;
                lo = x0;
                hi = x1;
            } else {
                hi = hi.max(x1);
            }
        }
        covered += hi - lo;
        total += covered * height;
    }
    total
}
