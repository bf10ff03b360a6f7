//! Rotation systems: the combinatorial planar embedding consumed by the
//! orthogonalization stage.
//!
//! A half-edge is an ordered pair `(origin, target)`. Each vertex stores its
//! neighbours in counter-clockwise order. Faces are traced by leaving the head
//! of a half-edge through the neighbour that precedes the tail in the head's
//! rotation, so every face lies on the left of the half-edges bounding it.

use std::f64::consts::PI;

use tracing::debug;

use crate::ir::{Graph, Point, Positions};

use super::error::{LayoutError, Result};

pub type HalfEdge = (usize, usize);

/// Angles closer than this are treated as the same direction.
const ANGLE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanarEmbedding {
    rotations: Vec<Vec<usize>>,
}

impl PlanarEmbedding {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            rotations: vec![Vec::new(); vertex_count],
        }
    }

    pub fn from_rotations(rotations: Vec<Vec<usize>>) -> Self {
        Self { rotations }
    }

    pub fn vertex_count(&self) -> usize {
        self.rotations.len()
    }

    pub fn edge_count(&self) -> usize {
        self.rotations.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn rotation(&self, v: usize) -> &[usize] {
        &self.rotations[v]
    }

    pub fn degree(&self, v: usize) -> usize {
        self.rotations[v].len()
    }

    pub(crate) fn add_vertex(&mut self) -> usize {
        self.rotations.push(Vec::new());
        self.rotations.len() - 1
    }

    /// Threads `w` after the most recently inserted neighbour of `v`.
    pub(crate) fn push(&mut self, v: usize, w: usize) {
        self.rotations[v].push(w);
    }

    /// Places `w` immediately clockwise of `before` in the rotation of `v`,
    /// i.e. inside the corner that ends at `before`.
    pub(crate) fn insert_before(&mut self, v: usize, before: usize, w: usize) -> Result<()> {
        let pos = self.position(v, before).ok_or_else(|| {
            LayoutError::invalid_embedding(format!("{before} is not a neighbour of {v}"))
        })?;
        self.rotations[v].insert(pos, w);
        Ok(())
    }

    pub(crate) fn replace_neighbor(&mut self, v: usize, old: usize, new: usize) -> Result<()> {
        let pos = self.position(v, old).ok_or_else(|| {
            LayoutError::invalid_embedding(format!("{old} is not a neighbour of {v}"))
        })?;
        self.rotations[v][pos] = new;
        Ok(())
    }

    pub(crate) fn set_rotation(&mut self, v: usize, rotation: Vec<usize>) {
        self.rotations[v] = rotation;
    }

    fn position(&self, v: usize, w: usize) -> Option<usize> {
        self.rotations[v].iter().position(|&n| n == w)
    }

    /// Neighbour following `w` counter-clockwise around `v`.
    pub fn successor(&self, v: usize, w: usize) -> Option<usize> {
        let rotation = &self.rotations[v];
        let pos = self.position(v, w)?;
        Some(rotation[(pos + 1) % rotation.len()])
    }

    /// Neighbour preceding `w` counter-clockwise around `v`.
    pub fn predecessor(&self, v: usize, w: usize) -> Option<usize> {
        let rotation = &self.rotations[v];
        let pos = self.position(v, w)?;
        Some(rotation[(pos + rotation.len() - 1) % rotation.len()])
    }

    pub fn next_in_face(&self, (u, v): HalfEdge) -> Option<HalfEdge> {
        self.predecessor(v, u).map(|w| (v, w))
    }

    /// Half-edges of the face to the left of `start`, beginning with `start`.
    pub fn face_walk(&self, start: HalfEdge) -> Vec<HalfEdge> {
        let limit = 2 * self.edge_count() + 1;
        let mut walk = vec![start];
        let mut current = start;
        while let Some(next) = self.next_in_face(current) {
            if next == start || walk.len() > limit {
                break;
            }
            walk.push(next);
            current = next;
        }
        walk
    }

    /// All faces, discovered in vertex order then rotation order.
    pub fn faces(&self) -> Vec<Vec<HalfEdge>> {
        let mut visited: Vec<Vec<bool>> = self
            .rotations
            .iter()
            .map(|rotation| vec![false; rotation.len()])
            .collect();
        let mut faces = Vec::new();
        for v in 0..self.rotations.len() {
            for i in 0..self.rotations[v].len() {
                if visited[v][i] {
                    continue;
                }
                let walk = self.face_walk((v, self.rotations[v][i]));
                for &(a, b) in &walk {
                    if let Some(pos) = self.position(a, b) {
                        visited[a][pos] = true;
                    }
                }
                faces.push(walk);
            }
        }
        faces
    }

    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.rotations.len()];
        let mut components = Vec::new();
        for root in 0..self.rotations.len() {
            if seen[root] {
                continue;
            }
            seen[root] = true;
            let mut stack = vec![root];
            let mut members = Vec::new();
            while let Some(v) = stack.pop() {
                members.push(v);
                for &w in &self.rotations[v] {
                    if !seen[w] {
                        seen[w] = true;
                        stack.push(w);
                    }
                }
            }
            members.sort_unstable();
            components.push(members);
        }
        components
    }

    /// Checks twins, face closure and Euler's formula `V - E + F = 2C`.
    pub fn validate(&self) -> Result<()> {
        let n = self.rotations.len();
        for (v, rotation) in self.rotations.iter().enumerate() {
            for (i, &w) in rotation.iter().enumerate() {
                if w >= n {
                    return Err(LayoutError::invalid_embedding(format!(
                        "vertex {v} refers to unknown vertex {w}"
                    )));
                }
                if w == v {
                    return Err(LayoutError::invalid_embedding(format!(
                        "vertex {v} lists itself as a neighbour"
                    )));
                }
                if rotation[..i].contains(&w) {
                    return Err(LayoutError::invalid_embedding(format!(
                        "vertex {v} lists neighbour {w} twice"
                    )));
                }
                if !self.rotations[w].contains(&v) {
                    return Err(LayoutError::invalid_embedding(format!(
                        "half-edge {v}->{w} has no twin"
                    )));
                }
            }
        }

        let faces = self.faces();
        let half_edges: usize = faces.iter().map(Vec::len).sum();
        if half_edges != 2 * self.edge_count() {
            return Err(LayoutError::invalid_embedding(
                "face tracing does not close over every half-edge",
            ));
        }

        let components = self.components();
        let isolated = (0..n).filter(|&v| self.rotations[v].is_empty()).count();
        let euler = n as i64 - self.edge_count() as i64 + (faces.len() + isolated) as i64;
        let expected = 2 * components.len() as i64;
        if euler != expected {
            return Err(LayoutError::invalid_embedding(format!(
                "rotation system has genus > 0 (V - E + F = {euler}, expected {expected})"
            )));
        }
        Ok(())
    }

    /// Same cyclic order at every vertex, regardless of the starting edge.
    pub fn is_equivalent(&self, other: &PlanarEmbedding) -> bool {
        if self.rotations.len() != other.rotations.len() {
            return false;
        }
        self.rotations
            .iter()
            .zip(&other.rotations)
            .all(|(a, b)| same_cycle(a, b))
    }
}

fn same_cycle(a: &[usize], b: &[usize]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let Some(first) = b.first() else {
        return true;
    };
    let Some(offset) = a.iter().position(|n| n == first) else {
        return false;
    };
    (0..a.len()).all(|i| a[(offset + i) % a.len()] == b[i])
}

/// Looks up the position of every vertex, in vertex order.
pub(crate) fn resolve_positions(graph: &Graph, positions: &Positions) -> Result<Vec<Point>> {
    graph
        .vertices
        .iter()
        .map(|vertex| {
            let point = positions
                .get(&vertex.id)
                .copied()
                .ok_or_else(|| LayoutError::MissingPosition {
                    vertex: vertex.id.clone(),
                })?;
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(LayoutError::DegenerateGeometry {
                    vertex: vertex.id.clone(),
                    reason: "position is not finite".to_string(),
                });
            }
            Ok(point)
        })
        .collect()
}

/// Derives the rotation system of a straight-line placement.
pub fn positions_to_embedding(graph: &Graph, positions: &Positions) -> Result<PlanarEmbedding> {
    let points = resolve_positions(graph, positions)?;
    embedding_from_points(graph, &points)
}

pub(crate) fn embedding_from_points(graph: &Graph, points: &[Point]) -> Result<PlanarEmbedding> {
    let mut embedding = PlanarEmbedding::new(graph.vertex_count());
    for v in 0..graph.vertex_count() {
        let origin = points[v];
        let mut around: Vec<(f64, usize)> = Vec::with_capacity(graph.degree(v));
        for &w in graph.neighbors(v) {
            let dx = points[w].x - origin.x;
            let dy = points[w].y - origin.y;
            if dx == 0.0 && dy == 0.0 {
                return Err(LayoutError::invalid_embedding(format!(
                    "edge `{}` -- `{}` has zero length",
                    graph.id(v),
                    graph.id(w)
                )));
            }
            around.push((dy.atan2(dx), w));
        }
        around.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let wraps = around.len() > 1
            && (around[0].0 + 2.0 * PI - around[around.len() - 1].0).abs() <= ANGLE_EPS;
        let ambiguous = around
            .windows(2)
            .find(|pair| (pair[1].0 - pair[0].0).abs() <= ANGLE_EPS)
            .map(|pair| (pair[0].1, pair[1].1))
            .or_else(|| wraps.then(|| (around[around.len() - 1].1, around[0].1)));
        if let Some((a, b)) = ambiguous {
            return Err(LayoutError::DegenerateGeometry {
                vertex: graph.id(v).to_string(),
                reason: format!(
                    "neighbours `{}` and `{}` leave at the same angle",
                    graph.id(a),
                    graph.id(b)
                ),
            });
        }

        for (_, w) in around {
            embedding.push(v, w);
        }
    }
    embedding.validate()?;
    debug!(
        vertices = embedding.vertex_count(),
        edges = embedding.edge_count(),
        "embedding extracted from placement"
    );
    Ok(embedding)
}
