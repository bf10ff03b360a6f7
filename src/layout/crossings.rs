use crate::ir::{Graph, Point, Positions};

use super::Budget;
use super::embedding::resolve_positions;
use super::error::{Result, Stage};

/// Twice the signed area of `abc`; positive when `c` lies left of `a -> b`.
pub(crate) fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn strictly_opposite(a: f64, b: f64) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}

/// Proper crossing only: touching, collinear and endpoint contacts do not count.
pub fn segments_cross(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    strictly_opposite(orientation(p1, p2, q1), orientation(p1, p2, q2))
        && strictly_opposite(orientation(q1, q2, p1), orientation(q1, q2, p2))
}

/// Relative tolerance for a point lying on a segment.
const ON_SEGMENT_EPS: f64 = 1e-9;

/// Whether `c` lies on the open segment `p -> q`, up to a tolerance scaled by
/// the segment length.
pub(crate) fn passes_through(p: Point, q: Point, c: Point) -> bool {
    let (dx, dy) = (q.x - p.x, q.y - p.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return false;
    }
    let t = ((c.x - p.x) * dx + (c.y - p.y) * dy) / len2;
    if t <= ON_SEGMENT_EPS || t >= 1.0 - ON_SEGMENT_EPS {
        return false;
    }
    orientation(p, q, c).abs() / len2 <= ON_SEGMENT_EPS
}

pub fn segment_intersection(p1: Point, p2: Point, q1: Point, q2: Point) -> Option<Point> {
    if !segments_cross(p1, p2, q1, q2) {
        return None;
    }
    let o1 = orientation(q1, q2, p1);
    let o2 = orientation(q1, q2, p2);
    let t = o1 / (o1 - o2);
    Some(Point::new(
        p1.x + t * (p2.x - p1.x),
        p1.y + t * (p2.y - p1.y),
    ))
}

/// Exact number of crossing edge pairs of a straight-line placement.
///
/// Quadratic in the number of edges; meant for modest inputs.
pub fn count_crossings(graph: &Graph, positions: &Positions) -> Result<usize> {
    Ok(crossing_pairs(graph, positions, &Budget::unlimited())?.len())
}

/// Crossing edge pairs `(i, j)` with `i < j`, in lexicographic order.
pub fn crossing_pairs(
    graph: &Graph,
    positions: &Positions,
    budget: &Budget,
) -> Result<Vec<(usize, usize)>> {
    let points = resolve_positions(graph, positions)?;
    let segments: Vec<(usize, usize)> = graph.edges.iter().map(|e| (e.a, e.b)).collect();
    find_crossings(&points, &segments, budget, Stage::Embedding, usize::MAX)
}

/// Scans segment pairs, stopping once `limit` crossings were found.
pub(crate) fn find_crossings(
    points: &[Point],
    segments: &[(usize, usize)],
    budget: &Budget,
    stage: Stage,
    limit: usize,
) -> Result<Vec<(usize, usize)>> {
    let mut found = Vec::new();
    for i in 0..segments.len() {
        budget.check(stage)?;
        let (a, b) = segments[i];
        for (j, &(c, d)) in segments.iter().enumerate().skip(i + 1) {
            if a == c || a == d || b == c || b == d {
                continue;
            }
            if segments_cross(points[a], points[b], points[c], points[d]) {
                found.push((i, j));
                if found.len() >= limit {
                    return Ok(found);
                }
            }
        }
    }
    Ok(found)
}
