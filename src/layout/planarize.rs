use std::collections::{HashMap, VecDeque};

use tracing::{debug, debug_span, warn};

use crate::config::PlanarizationConfig;
use crate::ir::{Graph, IdAllocator, Point, Positions, VertexKind};

use super::Budget;
use super::crossings::{find_crossings, passes_through, segment_intersection};
use super::embedding::{HalfEdge, PlanarEmbedding, embedding_from_points, resolve_positions};
use super::error::{LayoutError, Result, Stage};

#[derive(Debug, Clone)]
pub struct PlanarizedGraph {
    /// Input vertices first (same indices), then crossing dummies.
    pub graph: Graph,
    pub embedding: PlanarEmbedding,
    /// Placement including crossing points, when the input had one.
    pub positions: Option<Positions>,
    /// For every input edge, the planar vertices it runs through, from its
    /// first endpoint to its second.
    pub edge_chains: Vec<Vec<usize>>,
}

impl PlanarizedGraph {
    pub fn crossing_count(&self) -> usize {
        self.graph.count_kind(VertexKind::Crossing)
    }
}

/// Tracks which input edge every planar edge belongs to while edges get split.
#[derive(Debug, Default)]
struct ChainBook {
    chains: Vec<Vec<usize>>,
    owner: HashMap<(usize, usize), usize>,
}

fn key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

impl ChainBook {
    fn with_edges(count: usize) -> Self {
        Self {
            chains: vec![Vec::new(); count],
            owner: HashMap::new(),
        }
    }

    fn register(&mut self, edge: usize, chain: Vec<usize>) {
        for pair in chain.windows(2) {
            self.owner.insert(key(pair[0], pair[1]), edge);
        }
        self.chains[edge] = chain;
    }

    fn subdivide(&mut self, a: usize, b: usize, mid: usize) -> Result<()> {
        let edge = self
            .owner
            .remove(&key(a, b))
            .ok_or_else(|| LayoutError::planarization(format!("no edge {a} -- {b} to split")))?;
        let chain = &mut self.chains[edge];
        let pos = chain
            .windows(2)
            .position(|pair| key(pair[0], pair[1]) == key(a, b))
            .ok_or_else(|| LayoutError::planarization("edge chain lost a segment"))?;
        chain.insert(pos + 1, mid);
        self.owner.insert(key(a, mid), edge);
        self.owner.insert(key(mid, b), edge);
        Ok(())
    }

    /// Adds the chain segments to `vertices` in input edge order.
    fn into_planar(self, mut vertices: Graph) -> Result<(Graph, Vec<Vec<usize>>)> {
        for chain in &self.chains {
            for pair in chain.windows(2) {
                vertices.add_edge_between(pair[0], pair[1])?;
            }
        }
        Ok((vertices, self.chains))
    }
}

/// Turns `graph` into a planar graph with a valid embedding, inserting a
/// degree-4 crossing dummy wherever two edges have to cross.
///
/// With a placement, crossings are found geometrically; without one, edges
/// are inserted one by one into the embedding of a spanning forest.
pub fn planarize(
    graph: &Graph,
    positions: Option<&Positions>,
    config: &PlanarizationConfig,
    budget: &Budget,
) -> Result<PlanarizedGraph> {
    let _span = debug_span!(
        "planarize",
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        placed = positions.is_some()
    )
    .entered();
    let planar = match positions {
        Some(positions) => planarize_geometric(graph, positions, config, budget),
        None => planarize_combinatorial(graph, config, budget),
    }
    .inspect_err(|err| warn!(%err, "planarization failed"))?;
    debug!(
        crossings = planar.crossing_count(),
        edges = planar.graph.edge_count(),
        "planarization finished"
    );
    Ok(planar)
}

fn planarize_geometric(
    graph: &Graph,
    positions: &Positions,
    config: &PlanarizationConfig,
    budget: &Budget,
) -> Result<PlanarizedGraph> {
    let mut points = resolve_positions(graph, positions)?;
    let mut segments: Vec<(usize, usize)> = graph.edges.iter().map(|e| (e.a, e.b)).collect();
    for v in 0..graph.vertex_count() {
        reject_pass_through(graph, &points, &segments, v)?;
    }

    if find_crossings(&points, &segments, budget, Stage::Planarization, 1)?.is_empty() {
        let embedding = embedding_from_points(graph, &points)?;
        return Ok(PlanarizedGraph {
            graph: graph.clone(),
            embedding,
            positions: Some(positions_of(graph, &points)),
            edge_chains: segments.iter().map(|&(a, b)| vec![a, b]).collect(),
        });
    }

    let mut vertices = graph.without_edges();
    let mut ids = IdAllocator::default();
    let mut book = ChainBook::with_edges(graph.edge_count());
    for (idx, &(a, b)) in segments.iter().enumerate() {
        book.register(idx, vec![a, b]);
    }

    let mut inserted = 0usize;
    loop {
        let found = find_crossings(&points, &segments, budget, Stage::Planarization, 1)?;
        let Some(&(i, j)) = found.first() else {
            break;
        };
        if inserted >= config.max_iterations {
            return Err(LayoutError::planarization(format!(
                "more than {} crossings to resolve",
                config.max_iterations
            )));
        }
        let (a, b) = segments[i];
        let (c, d) = segments[j];
        let at = segment_intersection(points[a], points[b], points[c], points[d])
            .ok_or_else(|| LayoutError::planarization("crossing vanished while splitting"))?;

        let x = vertices.add_dummy(&mut ids, VertexKind::Crossing, None);
        points.push(at);
        segments[i] = (a, x);
        segments.push((x, b));
        segments[j] = (c, x);
        segments.push((x, d));
        book.subdivide(a, b, x)?;
        book.subdivide(c, d, x)?;
        reject_pass_through(&vertices, &points, &segments, x)?;
        inserted += 1;
    }

    let (planar, edge_chains) = book.into_planar(vertices)?;
    let embedding = embedding_from_points(&planar, &points)?;
    Ok(PlanarizedGraph {
        positions: Some(positions_of(&planar, &points)),
        graph: planar,
        embedding,
        edge_chains,
    })
}

/// A point lying inside a segment it does not end would be drawn on that
/// edge without being part of it: an edge through a vertex, or a third edge
/// through a crossing.
fn reject_pass_through(
    graph: &Graph,
    points: &[Point],
    segments: &[(usize, usize)],
    v: usize,
) -> Result<()> {
    let at = points[v];
    for &(a, b) in segments {
        if a == v || b == v || !passes_through(points[a], points[b], at) {
            continue;
        }
        let reason = match graph.vertex(v).kind {
            VertexKind::Crossing => format!(
                "edge `{}` -- `{}` runs through a crossing at ({}, {}); more than two edges meet there",
                graph.id(a),
                graph.id(b),
                at.x,
                at.y
            ),
            _ => format!("lies on edge `{}` -- `{}`", graph.id(a), graph.id(b)),
        };
        return Err(LayoutError::DegenerateGeometry {
            vertex: graph.id(v).to_string(),
            reason,
        });
    }
    Ok(())
}

fn positions_of(graph: &Graph, points: &[Point]) -> Positions {
    graph
        .vertices
        .iter()
        .zip(points)
        .map(|(vertex, point)| (vertex.id.clone(), *point))
        .collect()
}

fn planarize_combinatorial(
    graph: &Graph,
    config: &PlanarizationConfig,
    budget: &Budget,
) -> Result<PlanarizedGraph> {
    let mut vertices = graph.without_edges();
    let mut embedding = PlanarEmbedding::new(graph.vertex_count());
    let mut book = ChainBook::with_edges(graph.edge_count());
    let mut ids = IdAllocator::default();

    // Any rotation of a spanning forest is planar.
    let mut in_forest = vec![false; graph.edge_count()];
    let mut seen = vec![false; graph.vertex_count()];
    for root in 0..graph.vertex_count() {
        if seen[root] {
            continue;
        }
        seen[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(v) = queue.pop_front() {
            for &e in graph.incident_edges(v) {
                let edge = graph.edges[e];
                let w = edge.other(v);
                if seen[w] {
                    continue;
                }
                seen[w] = true;
                in_forest[e] = true;
                embedding.push(v, w);
                embedding.push(w, v);
                book.register(e, vec![edge.a, edge.b]);
                queue.push_back(w);
            }
        }
    }

    let mut inserted = 0usize;
    for (e, edge) in graph.edges.iter().enumerate() {
        if in_forest[e] {
            continue;
        }
        budget.check(Stage::Planarization)?;
        let mut inserter = EdgeInserter {
            embedding: &mut embedding,
            vertices: &mut vertices,
            ids: &mut ids,
            book: &mut book,
        };
        let chain = inserter.insert(edge.a, edge.b)?;
        inserted += chain.len() - 2;
        if inserted > config.max_iterations {
            return Err(LayoutError::planarization(format!(
                "more than {} crossings to resolve",
                config.max_iterations
            )));
        }
        book.register(e, chain);
    }

    embedding
        .validate()
        .map_err(|err| LayoutError::planarization(format!("edge insertion broke planarity: {err}")))?;
    let (planar, edge_chains) = book.into_planar(vertices)?;
    Ok(PlanarizedGraph {
        graph: planar,
        embedding,
        positions: None,
        edge_chains,
    })
}

struct EdgeInserter<'a> {
    embedding: &'a mut PlanarEmbedding,
    vertices: &'a mut Graph,
    ids: &'a mut IdAllocator,
    book: &'a mut ChainBook,
}

impl EdgeInserter<'_> {
    /// Inserts `u -- v`, returning the chain of planar vertices it became.
    fn insert(&mut self, u: usize, v: usize) -> Result<Vec<usize>> {
        let faces = self.embedding.faces();

        if let Some(face) = faces.iter().find(|f| touches(f, u) && touches(f, v)) {
            self.connect(face[0], u, v)?;
            return Ok(vec![u, v]);
        }

        let mut face_of: HashMap<HalfEdge, usize> = HashMap::new();
        for (idx, face) in faces.iter().enumerate() {
            for &h in face {
                face_of.insert(h, idx);
            }
        }

        // Breadth-first search in the dual graph: each step crosses one edge.
        let mut parent: Vec<Option<(usize, HalfEdge)>> = vec![None; faces.len()];
        let mut visited = vec![false; faces.len()];
        let mut queue = VecDeque::new();
        for (idx, face) in faces.iter().enumerate() {
            if touches(face, u) {
                visited[idx] = true;
                queue.push_back(idx);
            }
        }
        let mut reached = None;
        while let Some(f) = queue.pop_front() {
            if touches(&faces[f], v) {
                reached = Some(f);
                break;
            }
            for &(a, b) in &faces[f] {
                let Some(&g) = face_of.get(&(b, a)) else {
                    continue;
                };
                if g == f || visited[g] {
                    continue;
                }
                visited[g] = true;
                parent[g] = Some((f, (a, b)));
                queue.push_back(g);
            }
        }
        let Some(mut f) = reached else {
            return Err(LayoutError::planarization(format!(
                "no route between `{}` and `{}`",
                self.vertices.id(u),
                self.vertices.id(v)
            )));
        };
        let mut crossed = Vec::new();
        while let Some((prev, h)) = parent[f] {
            crossed.push(h);
            f = prev;
        }
        crossed.reverse();

        let mut chain = vec![u];
        let mut p = u;
        for &(a, b) in &crossed {
            let walk = self.embedding.face_walk((a, b));
            let p_in = incoming(&walk, p)?;
            let d = self.split(a, b)?;
            self.embedding.insert_before(p, p_in, d)?;
            self.embedding.insert_before(d, a, p)?;
            chain.push(d);
            p = d;
        }
        // `p` is the last crossing; the target lies in the face beyond it.
        let &(_, b) = crossed
            .last()
            .ok_or_else(|| LayoutError::planarization("empty dual route"))?;
        self.connect((b, p), p, v)?;
        chain.push(v);
        Ok(chain)
    }

    /// Subdivides `a -- b` with a fresh crossing vertex.
    fn split(&mut self, a: usize, b: usize) -> Result<usize> {
        let d = self
            .vertices
            .add_dummy(self.ids, VertexKind::Crossing, None);
        let slot = self.embedding.add_vertex();
        if slot != d {
            return Err(LayoutError::planarization(
                "embedding and graph disagree on vertex count",
            ));
        }
        self.embedding.replace_neighbor(a, b, d)?;
        self.embedding.replace_neighbor(b, a, d)?;
        self.embedding.push(d, a);
        self.embedding.push(d, b);
        self.book.subdivide(a, b, d)?;
        Ok(d)
    }

    /// Adds `u -- v` inside the face to the left of `start`.
    fn connect(&mut self, start: HalfEdge, u: usize, v: usize) -> Result<()> {
        let walk = self.embedding.face_walk(start);
        let u_in = incoming(&walk, u)?;
        let v_in = incoming(&walk, v)?;
        self.embedding.insert_before(u, u_in, v)?;
        self.embedding.insert_before(v, v_in, u)?;
        Ok(())
    }
}

fn touches(face: &[HalfEdge], x: usize) -> bool {
    face.iter().any(|&(_, head)| head == x)
}

/// Tail of the first half-edge of `walk` that arrives at `x`.
fn incoming(walk: &[HalfEdge], x: usize) -> Result<usize> {
    walk.iter()
        .find(|&&(_, head)| head == x)
        .map(|&(tail, _)| tail)
        .ok_or_else(|| LayoutError::planarization(format!("vertex {x} is not on the face")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::crossings::count_crossings;

    fn config() -> PlanarizationConfig {
        PlanarizationConfig::default()
    }

    fn complete(n: usize) -> Graph {
        let mut graph = Graph::new();
        for i in 0..n {
            graph.ensure_vertex(&format!("v{i}"));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                graph.add_edge_between(i, j).unwrap();
            }
        }
        graph
    }

    fn k4_square() -> (Graph, Positions) {
        let graph = complete(4);
        let mut positions = Positions::new();
        for (i, (x, y)) in [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]
            .into_iter()
            .enumerate()
        {
            positions.insert(format!("v{i}"), Point::new(x, y));
        }
        (graph, positions)
    }

    #[test]
    fn crossing_free_placement_is_kept() {
        let graph = Graph::grid(3, 3);
        let positions = Graph::grid_positions(3, 3);
        let planar = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap();
        assert_eq!(planar.crossing_count(), 0);
        assert_eq!(planar.graph.edge_count(), graph.edge_count());
    }

    #[test]
    fn k4_with_crossing_diagonals_gains_one_dummy() {
        let (graph, positions) = k4_square();
        let planar = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap();
        assert_eq!(planar.crossing_count(), 1);
        assert_eq!(planar.graph.vertex_count(), 5);
        assert_eq!(planar.graph.degree(4), 4);
        assert_eq!(planar.graph.vertex(4).kind, VertexKind::Crossing);
        let placed = planar.positions.as_ref().unwrap();
        assert_eq!(placed[planar.graph.id(4)], Point::new(1.0, 1.0));
        assert_eq!(count_crossings(&planar.graph, placed).unwrap(), 0);
        // The diagonal v0 -- v2 now runs through the dummy.
        assert_eq!(planar.edge_chains[1], vec![0, 4, 2]);
    }

    #[test]
    fn crossing_dummy_keeps_each_edge_straight_through() {
        let (graph, positions) = k4_square();
        let planar = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap();
        let rotation = planar.embedding.rotation(4);
        assert_eq!(rotation.len(), 4);
        let opposite = |x: usize| rotation[(rotation.iter().position(|&n| n == x).unwrap() + 2) % 4];
        assert_eq!(opposite(0), 2);
        assert_eq!(opposite(1), 3);
    }

    #[test]
    fn iteration_budget_is_enforced() {
        let (graph, positions) = k4_square();
        let tight = PlanarizationConfig { max_iterations: 0 };
        let err = planarize(&graph, Some(&positions), &tight, &Budget::unlimited()).unwrap_err();
        assert!(matches!(err, LayoutError::Planarization { .. }));
        assert_eq!(err.stage(), Stage::Planarization);
    }

    #[test]
    fn planar_graph_without_placement_needs_no_dummy_for_a_cycle() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "d"] {
            graph.ensure_vertex(id);
        }
        for (a, b) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "a"), ("a", "c")] {
            graph.add_edge(a, b).unwrap();
        }
        let planar = planarize(&graph, None, &config(), &Budget::unlimited()).unwrap();
        assert_eq!(planar.crossing_count(), 0);
        planar.embedding.validate().unwrap();
        assert_eq!(planar.embedding.faces().len(), 3);
    }

    #[test]
    fn k5_without_placement_is_made_planar() {
        let graph = complete(5);
        let planar = planarize(&graph, None, &config(), &Budget::unlimited()).unwrap();
        assert!(planar.crossing_count() >= 1);
        planar.embedding.validate().unwrap();
        for v in 0..planar.graph.vertex_count() {
            if planar.graph.vertex(v).kind == VertexKind::Crossing {
                assert_eq!(planar.graph.degree(v), 4);
            }
            assert_eq!(planar.graph.degree(v), planar.embedding.degree(v));
        }
        for (e, chain) in planar.edge_chains.iter().enumerate() {
            assert_eq!(chain.first(), Some(&graph.edges[e].a));
            assert_eq!(chain.last(), Some(&graph.edges[e].b));
        }
    }

    #[test]
    fn k33_without_placement_is_made_planar() {
        let mut graph = Graph::new();
        for id in ["a0", "a1", "a2", "b0", "b1", "b2"] {
            graph.ensure_vertex(id);
        }
        for a in 0..3 {
            for b in 3..6 {
                graph.add_edge_between(a, b).unwrap();
            }
        }
        let planar = planarize(&graph, None, &config(), &Budget::unlimited()).unwrap();
        assert!(planar.crossing_count() >= 1);
        planar.embedding.validate().unwrap();
    }

    #[test]
    fn disconnected_input_keeps_components_apart() {
        let mut graph = Graph::new();
        for id in ["a", "b", "c", "x", "y", "lonely"] {
            graph.ensure_vertex(id);
        }
        for (a, b) in [("a", "b"), ("b", "c"), ("c", "a"), ("x", "y")] {
            graph.add_edge(a, b).unwrap();
        }
        let planar = planarize(&graph, None, &config(), &Budget::unlimited()).unwrap();
        assert_eq!(planar.crossing_count(), 0);
        assert_eq!(planar.embedding.components().len(), 3);
    }

    fn placed(points: &[(&str, f64, f64)], edges: &[(&str, &str)]) -> (Graph, Positions) {
        let mut graph = Graph::new();
        let mut positions = Positions::new();
        for &(id, x, y) in points {
            graph.ensure_vertex(id);
            positions.insert(id.to_string(), Point::new(x, y));
        }
        for &(a, b) in edges {
            graph.add_edge(a, b).unwrap();
        }
        (graph, positions)
    }

    #[test]
    fn three_edges_through_one_point_are_rejected() {
        let corners = [
            ("a", -1.0, 0.0),
            ("d", 1.0, 0.0),
            ("b", 0.0, -1.0),
            ("e", 0.0, 1.0),
            ("c", -1.0, -1.0),
            ("f", 1.0, 1.0),
        ];
        let star = [("a", "d"), ("b", "e"), ("c", "f")];
        let (graph, positions) = placed(&corners, &star);
        assert_eq!(count_crossings(&graph, &positions).unwrap(), 3);
        let err = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap_err();
        assert!(matches!(err, LayoutError::DegenerateGeometry { .. }), "{err}");
        assert_eq!(err.stage(), Stage::Embedding);

        // An extra edge elsewhere does not hide the shared point.
        let (graph, positions) = placed(&corners, &[("a", "d"), ("b", "e"), ("c", "f"), ("a", "c")]);
        let err = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap_err();
        assert!(matches!(err, LayoutError::DegenerateGeometry { .. }), "{err}");
    }

    #[test]
    fn edge_through_a_vertex_is_rejected() {
        let (graph, positions) = placed(
            &[("a", 0.0, 0.0), ("b", 2.0, 0.0), ("m", 1.0, 0.0), ("t", 1.0, 1.0)],
            &[("a", "b"), ("m", "t")],
        );
        let err = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap_err();
        match err {
            LayoutError::DegenerateGeometry { vertex, .. } => assert_eq!(vertex, "m"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn near_miss_of_a_crossing_still_splits() {
        // The third edge passes just beside the first crossing point.
        let (graph, positions) = placed(
            &[
                ("a", -1.0, 0.0),
                ("d", 1.0, 0.0),
                ("b", 0.0, -1.0),
                ("e", 0.0, 1.0),
                ("c", -1.0, -0.9),
                ("f", 1.0, 1.1),
            ],
            &[("a", "d"), ("b", "e"), ("c", "f")],
        );
        let planar = planarize(&graph, Some(&positions), &config(), &Budget::unlimited()).unwrap();
        assert_eq!(planar.crossing_count(), 3);
        let placed = planar.positions.as_ref().unwrap();
        assert_eq!(count_crossings(&planar.graph, placed).unwrap(), 0);
    }
}
