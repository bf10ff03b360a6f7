use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Input placement keyed by vertex id. The y axis points up.
pub type Positions = BTreeMap<String, Point>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKind {
    /// Vertex of the input graph.
    Real,
    /// Degree-4 dummy inserted where two edges cross.
    Crossing,
    /// Member of the chain that replaces a vertex of degree > 4.
    Expansion,
    /// Bend of an orthogonal route promoted to a point.
    Bend,
}

impl VertexKind {
    pub fn is_dummy(self) -> bool {
        self != VertexKind::Real
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: String,
    pub kind: VertexKind,
    /// For expansion vertices, the index of the real vertex they stand for.
    pub owner: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
}

impl Edge {
    pub fn other(&self, v: usize) -> usize {
        if self.a == v { self.b } else { self.a }
    }

    fn key(&self) -> (usize, usize) {
        edge_key(self.a, self.b)
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("vertex `{id}` is already present")]
    DuplicateVertex { id: String },
    #[error("unknown vertex `{id}`")]
    UnknownVertex { id: String },
    #[error("self-loop on vertex `{id}` is not supported")]
    SelfLoop { id: String },
    #[error("edge `{a}` -- `{b}` is already present")]
    DuplicateEdge { a: String, b: String },
}

/// Simple undirected graph: no self-loops, no multi-edges.
///
/// Vertices and edges keep insertion order, which is the order every
/// deterministic tie-break in the pipeline falls back to.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    incident: Vec<Vec<usize>>,
    edge_index: HashMap<(usize, usize), usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows × cols lattice with ids `"r,c"`, the classic `grid_2d_graph` fixture.
    pub fn grid(rows: usize, cols: usize) -> Self {
        let mut graph = Graph::new();
        for r in 0..rows {
            for c in 0..cols {
                graph.ensure_vertex(&grid_id(r, c));
            }
        }
        for r in 0..rows {
            for c in 0..cols {
                let here = r * cols + c;
                if c + 1 < cols {
                    graph.push_edge(here, here + 1);
                }
                if r + 1 < rows {
                    graph.push_edge(here, here + cols);
                }
            }
        }
        graph
    }

    /// Unit-spaced placement matching [`Graph::grid`].
    pub fn grid_positions(rows: usize, cols: usize) -> Positions {
        let mut positions = Positions::new();
        for r in 0..rows {
            for c in 0..cols {
                positions.insert(grid_id(r, c), Point::new(c as f64, r as f64));
            }
        }
        positions
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn add_vertex(&mut self, id: &str) -> Result<usize, GraphError> {
        if self.index.contains_key(id) {
            return Err(GraphError::DuplicateVertex { id: id.to_string() });
        }
        Ok(self.push_vertex(id.to_string(), VertexKind::Real, None))
    }

    pub fn ensure_vertex(&mut self, id: &str) -> usize {
        match self.index.get(id) {
            Some(idx) => *idx,
            None => self.push_vertex(id.to_string(), VertexKind::Real, None),
        }
    }

    pub(crate) fn add_dummy(
        &mut self,
        ids: &mut IdAllocator,
        kind: VertexKind,
        owner: Option<usize>,
    ) -> usize {
        let id = ids.next(self, kind);
        self.push_vertex(id, kind, owner)
    }

    fn push_vertex(&mut self, id: String, kind: VertexKind, owner: Option<usize>) -> usize {
        let idx = self.vertices.len();
        self.index.insert(id.clone(), idx);
        self.vertices.push(Vertex { id, kind, owner });
        self.adjacency.push(Vec::new());
        self.incident.push(Vec::new());
        idx
    }

    pub fn add_edge(&mut self, a: &str, b: &str) -> Result<usize, GraphError> {
        let ia = self.require(a)?;
        let ib = self.require(b)?;
        self.add_edge_between(ia, ib)
    }

    pub fn add_edge_between(&mut self, a: usize, b: usize) -> Result<usize, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop {
                id: self.vertices[a].id.clone(),
            });
        }
        if self.edge_index.contains_key(&edge_key(a, b)) {
            return Err(GraphError::DuplicateEdge {
                a: self.vertices[a].id.clone(),
                b: self.vertices[b].id.clone(),
            });
        }
        Ok(self.push_edge(a, b))
    }

    fn push_edge(&mut self, a: usize, b: usize) -> usize {
        let idx = self.edges.len();
        let edge = Edge { a, b };
        self.edge_index.insert(edge.key(), idx);
        self.edges.push(edge);
        self.adjacency[a].push(b);
        self.adjacency[b].push(a);
        self.incident[a].push(idx);
        self.incident[b].push(idx);
        idx
    }

    fn require(&self, id: &str) -> Result<usize, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownVertex { id: id.to_string() })
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn vertex(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.vertices[idx].id
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.adjacency[idx]
    }

    /// Edge indices incident to `idx`, in insertion order.
    pub fn incident_edges(&self, idx: usize) -> &[usize] {
        &self.incident[idx]
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.adjacency[idx].len()
    }

    pub fn find_edge(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_index.get(&edge_key(a, b)).copied()
    }

    /// Same vertices (ids, kinds, owners), no edges.
    pub fn without_edges(&self) -> Graph {
        let mut graph = Graph::new();
        for vertex in &self.vertices {
            graph.push_vertex(vertex.id.clone(), vertex.kind, vertex.owner);
        }
        graph
    }

    /// Connected components as sorted vertex lists, ordered by smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.vertex_count()];
        let mut components = Vec::new();
        for root in 0..self.vertex_count() {
            if seen[root] {
                continue;
            }
            seen[root] = true;
            let mut stack = vec![root];
            let mut members = Vec::new();
            while let Some(v) = stack.pop() {
                members.push(v);
                for &w in &self.adjacency[v] {
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

    pub fn count_kind(&self, kind: VertexKind) -> usize {
        self.vertices.iter().filter(|v| v.kind == kind).count()
    }
}

fn grid_id(r: usize, c: usize) -> String {
    format!("{r},{c}")
}

/// Hands out reserved ids (`__crossing_N`, `__expand_N`, `__bend_N`) that do
/// not collide with ids already in a graph.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    next: usize,
}

impl IdAllocator {
    pub(crate) fn next(&mut self, graph: &Graph, kind: VertexKind) -> String {
        let prefix = match kind {
            VertexKind::Real => "__vertex",
            VertexKind::Crossing => "__crossing",
            VertexKind::Expansion => "__expand",
            VertexKind::Bend => "__bend",
        };
        loop {
            let candidate = format!("{prefix}_{}", self.next);
            self.next += 1;
            if graph.index_of(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_loops_and_duplicates() {
        let mut graph = Graph::new();
        graph.ensure_vertex("a");
        graph.ensure_vertex("b");
        assert!(graph.add_edge("a", "b").is_ok());
        assert_eq!(
            graph.add_edge("b", "a"),
            Err(GraphError::DuplicateEdge {
                a: "b".to_string(),
                b: "a".to_string()
            })
        );
        assert!(matches!(
            graph.add_edge("a", "a"),
            Err(GraphError::SelfLoop { .. })
        ));
        assert!(matches!(
            graph.add_edge("a", "z"),
            Err(GraphError::UnknownVertex { .. })
        ));
        assert!(graph.add_vertex("a").is_err());
    }

    #[test]
    fn grid_has_expected_size() {
        let graph = Graph::grid(5, 5);
        assert_eq!(graph.vertex_count(), 25);
        assert_eq!(graph.edge_count(), 40);
        let positions = Graph::grid_positions(5, 5);
        assert_eq!(positions.len(), 25);
        assert_eq!(positions["4,3"], Point::new(3.0, 4.0));
    }

    #[test]
    fn components_are_ordered() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "d"] {
            graph.ensure_vertex(id);
        }
        graph.add_edge("a", "c").unwrap();
        let components = graph.components();
        assert_eq!(components, vec![vec![0, 2], vec![1], vec![3]]);
    }

    #[test]
    fn allocator_skips_taken_ids() {
        let mut graph = Graph::new();
        graph.ensure_vertex("__crossing_0");
        let mut ids = IdAllocator::default();
        let idx = graph.add_dummy(&mut ids, VertexKind::Crossing, None);
        assert_eq!(graph.id(idx), "__crossing_1");
        assert_eq!(graph.count_kind(VertexKind::Crossing), 1);
    }
}
