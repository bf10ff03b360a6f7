use std::collections::{HashMap, VecDeque};

use tracing::{debug, debug_span, trace};

use crate::config::OrthogonalizationConfig;
use crate::ir::{Graph, IdAllocator, VertexKind};

use super::Budget;
use super::embedding::{HalfEdge, PlanarEmbedding};
use super::error::{LayoutError, Result, Stage};
use super::flow::{MinCostFlow, UNBOUNDED};
use super::planarize::PlanarizedGraph;
use super::types::Direction;

/// Bends of one planar edge, described as the directions of its segments
/// when walked from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrthogonalEdge {
    pub from: usize,
    pub to: usize,
    pub segments: Vec<Direction>,
}

impl OrthogonalEdge {
    pub fn bends(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct OrthogonalRepresentation {
    /// Planar graph with expansion chains in place of vertices of degree > 4.
    pub graph: Graph,
    pub embedding: PlanarEmbedding,
    /// One entry per edge of `graph`, in the same order.
    pub edges: Vec<OrthogonalEdge>,
    /// Per vertex, `(neighbour, direction)` in rotation order.
    pub ports: Vec<Vec<(usize, Direction)>>,
    /// First half-edge of the outer face of every non-trivial component.
    pub outer_faces: Vec<HalfEdge>,
    pub edge_chains: Vec<Vec<usize>>,
    pub total_bends: usize,
}

impl OrthogonalRepresentation {
    pub fn direction(&self, v: usize, w: usize) -> Option<Direction> {
        self.ports[v]
            .iter()
            .find(|(n, _)| *n == w)
            .map(|(_, dir)| *dir)
    }

    /// Segment directions of `v -- w` walked from `v`.
    pub fn route(&self, v: usize, w: usize) -> Option<Vec<Direction>> {
        let edge = &self.edges[self.graph.find_edge(v, w)?];
        if edge.from == v {
            Some(edge.segments.clone())
        } else {
            Some(edge.segments.iter().rev().map(|d| d.opposite()).collect())
        }
    }

    /// Quarter turns of the corners around `v`; they sum to 4 whenever
    /// `v` has an edge.
    pub fn corner_angles(&self, v: usize) -> Vec<usize> {
        let ports = &self.ports[v];
        if ports.len() == 1 {
            return vec![4];
        }
        (0..ports.len())
            .map(|i| {
                let here = ports[i].1.index();
                let next = ports[(i + 1) % ports.len()].1.index();
                (next + 4 - here) % 4
            })
            .collect()
    }

    pub fn expansion_count(&self) -> usize {
        self.graph.count_kind(VertexKind::Expansion)
    }
}

/// Computes a bend-minimal orthogonal shape for a planar embedding.
pub fn orthogonalize(
    planar: &PlanarizedGraph,
    config: &OrthogonalizationConfig,
    budget: &Budget,
) -> Result<OrthogonalRepresentation> {
    let _span = debug_span!(
        "orthogonalize",
        vertices = planar.graph.vertex_count(),
        edges = planar.graph.edge_count()
    )
    .entered();
    planar.embedding.validate().map_err(|err| {
        LayoutError::orthogonalization(format!("input embedding is not planar: {err}"))
    })?;
    let expanded = split_high_degree(planar)?;
    let ortho = shape(expanded, config, budget)?;
    debug!(
        bends = ortho.total_bends,
        expansions = ortho.expansion_count(),
        "orthogonal representation ready"
    );
    Ok(ortho)
}

/// Replaces every vertex of degree > 4 by a path of expansion vertices.
///
/// The vertex keeps its first three neighbours and a link to the first
/// expansion vertex; each expansion vertex takes the next contiguous block
/// of the rotation, so contracting the path gives back the original
/// rotation. Edge chains ending at a split vertex are redirected to the
/// chain member that now holds the edge.
pub fn split_high_degree(planar: &PlanarizedGraph) -> Result<PlanarizedGraph> {
    let mut graph = planar.graph.without_edges();
    let mut embedding = planar.embedding.clone();
    let mut ids = IdAllocator::default();
    let mut holders: HashMap<(usize, usize), usize> = HashMap::new();
    let mut links: Vec<(usize, usize)> = Vec::new();

    for v in 0..planar.graph.vertex_count() {
        if embedding.degree(v) <= 4 {
            continue;
        }
        let rotation = embedding.rotation(v).to_vec();
        let mut holder = v;
        let mut back: Option<usize> = None;
        let mut kept = rotation[..3].to_vec();
        let mut remaining = &rotation[3..];
        loop {
            let mut order: Vec<usize> = back.into_iter().collect();
            order.extend_from_slice(&kept);
            if remaining.is_empty() {
                embedding.set_rotation(holder, order);
                break;
            }
            let next = graph.add_dummy(&mut ids, VertexKind::Expansion, Some(v));
            if embedding.add_vertex() != next {
                return Err(LayoutError::orthogonalization(
                    "embedding and graph disagree on vertex count",
                ));
            }
            order.push(next);
            embedding.set_rotation(holder, order);
            links.push((holder, next));

            back = Some(holder);
            holder = next;
            let take = if remaining.len() <= 3 { remaining.len() } else { 2 };
            kept = remaining[..take].to_vec();
            remaining = &remaining[take..];
            for &w in &kept {
                embedding.replace_neighbor(w, v, holder)?;
                let original = graph.vertex(w).owner.unwrap_or(w);
                holders.insert((v, original), holder);
            }
        }
        trace!(vertex = graph.id(v), degree = rotation.len(), "vertex expanded");
    }

    if links.is_empty() {
        return Ok(planar.clone());
    }

    let holder_of = |v: usize, w: usize| holders.get(&(v, w)).copied().unwrap_or(v);
    for edge in &planar.graph.edges {
        graph.add_edge_between(holder_of(edge.a, edge.b), holder_of(edge.b, edge.a))?;
    }
    for &(a, b) in &links {
        graph.add_edge_between(a, b)?;
    }
    let edge_chains = planar
        .edge_chains
        .iter()
        .map(|chain| {
            let mut chain = chain.clone();
            let n = chain.len();
            if n >= 2 {
                let head = holder_of(chain[0], chain[1]);
                let tail = holder_of(chain[n - 1], chain[n - 2]);
                chain[0] = head;
                chain[n - 1] = tail;
            }
            chain
        })
        .collect();

    embedding.validate().map_err(|err| {
        LayoutError::orthogonalization(format!("vertex expansion broke planarity: {err}"))
    })?;
    debug!(expansions = graph.count_kind(VertexKind::Expansion), "high-degree vertices split");
    Ok(PlanarizedGraph {
        graph,
        embedding,
        positions: planar.positions.clone(),
        edge_chains,
    })
}

/// Per-component min-cost flow and direction assignment. Every vertex must
/// already have degree at most 4.
pub(crate) fn shape(
    planar: PlanarizedGraph,
    config: &OrthogonalizationConfig,
    budget: &Budget,
) -> Result<OrthogonalRepresentation> {
    let PlanarizedGraph {
        graph,
        embedding,
        edge_chains,
        ..
    } = planar;

    if let Some(v) = (0..embedding.vertex_count()).find(|&v| embedding.degree(v) > 4) {
        return Err(LayoutError::orthogonalization(format!(
            "vertex `{}` has degree {} and was not expanded",
            graph.id(v),
            embedding.degree(v)
        )));
    }
    if graph.edge_count() != embedding.edge_count() {
        return Err(LayoutError::orthogonalization(
            "graph and embedding disagree on edges",
        ));
    }

    let faces = embedding.faces();
    let mut face_of: HashMap<HalfEdge, usize> = HashMap::new();
    for (idx, face) in faces.iter().enumerate() {
        for &h in face {
            face_of.insert(h, idx);
        }
    }

    let mut shaper = Shaper {
        graph: &graph,
        embedding: &embedding,
        faces: &faces,
        face_of: &face_of,
        bend_cost: config.bend_cost,
        spread_bends: config.spread_bends,
        angles: HashMap::new(),
        turns: HashMap::new(),
        directions: HashMap::new(),
    };
    let mut outer_faces = Vec::new();
    for component in embedding.components() {
        if component.iter().all(|&v| embedding.degree(v) == 0) {
            continue;
        }
        budget.check(Stage::Orthogonalization)?;
        let outer = shaper.solve_component(&component, budget)?;
        shaper.assign_directions(&component)?;
        outer_faces.push(faces[outer][0]);
    }

    let mut edges = Vec::with_capacity(graph.edge_count());
    for edge in &graph.edges {
        let h = (edge.a, edge.b);
        let start = shaper.direction(h)?;
        let (lefts, rights) = shaper.turns.get(&h).copied().unwrap_or((0, 0));
        edges.push(OrthogonalEdge {
            from: edge.a,
            to: edge.b,
            segments: walk_turns(start, lefts, rights),
        });
    }
    let mut ports = Vec::with_capacity(graph.vertex_count());
    for v in 0..graph.vertex_count() {
        let mut around = Vec::with_capacity(embedding.degree(v));
        for &w in embedding.rotation(v) {
            around.push((w, shaper.direction((v, w))?));
        }
        ports.push(around);
    }
    let total_bends = edges.iter().map(OrthogonalEdge::bends).sum();

    Ok(OrthogonalRepresentation {
        graph,
        embedding,
        edges,
        ports,
        outer_faces,
        edge_chains,
        total_bends,
    })
}

fn walk_turns(start: Direction, lefts: usize, rights: usize) -> Vec<Direction> {
    let mut segments = vec![start];
    let mut dir = start;
    for _ in 0..lefts {
        dir = dir.ccw();
        segments.push(dir);
    }
    for _ in 0..rights {
        dir = dir.cw();
        segments.push(dir);
    }
    segments
}

struct Shaper<'a> {
    graph: &'a Graph,
    embedding: &'a PlanarEmbedding,
    faces: &'a [Vec<HalfEdge>],
    face_of: &'a HashMap<HalfEdge, usize>,
    bend_cost: i64,
    spread_bends: bool,
    /// Quarter turns of the corner between `w` and its successor around `v`,
    /// keyed by the half-edge `(v, w)`.
    angles: HashMap<HalfEdge, usize>,
    /// `(left, right)` bend counts along a half-edge.
    turns: HashMap<HalfEdge, (usize, usize)>,
    directions: HashMap<HalfEdge, Direction>,
}

impl Shaper<'_> {
    fn face(&self, h: HalfEdge) -> Result<usize> {
        self.face_of
            .get(&h)
            .copied()
            .ok_or_else(|| LayoutError::orthogonalization(format!("half-edge {h:?} is on no face")))
    }

    fn direction(&self, h: HalfEdge) -> Result<Direction> {
        self.directions.get(&h).copied().ok_or_else(|| {
            LayoutError::orthogonalization(format!("half-edge {h:?} received no direction"))
        })
    }

    /// Builds and solves the flow network of one component; returns its
    /// outer face.
    fn solve_component(&mut self, component: &[usize], budget: &Budget) -> Result<usize> {
        let mut local: HashMap<usize, usize> = HashMap::new();
        for (idx, &v) in component.iter().enumerate() {
            local.insert(v, idx);
        }
        let component_faces: Vec<usize> = (0..self.faces.len())
            .filter(|&f| local.contains_key(&self.faces[f][0].0))
            .collect();
        let mut outer = component_faces[0];
        for &f in &component_faces {
            if self.faces[f].len() > self.faces[outer].len() {
                outer = f;
            }
        }
        let mut face_node: HashMap<usize, usize> = HashMap::new();
        for (idx, &f) in component_faces.iter().enumerate() {
            face_node.insert(f, component.len() + idx);
        }
        let source = component.len() + component_faces.len();
        let sink = source + 1;
        let mut net = MinCostFlow::new(sink + 1);

        // Balances after reserving 90 degrees for every corner.
        let mut supply = 0;
        let mut balance = |net: &mut MinCostFlow, node: usize, amount: i64| {
            if amount > 0 {
                net.add_arc(source, node, amount, 0);
                supply += amount;
            } else if amount < 0 {
                net.add_arc(node, sink, -amount, 0);
            }
        };
        for (idx, &v) in component.iter().enumerate() {
            balance(&mut net, idx, 4 - self.embedding.degree(v) as i64);
        }
        for &f in &component_faces {
            let len = self.faces[f].len() as i64;
            let amount = if f == outer { -(len + 4) } else { 4 - len };
            balance(&mut net, face_node[&f], amount);
        }

        let mut corners = Vec::new();
        for (idx, &v) in component.iter().enumerate() {
            for &w in self.embedding.rotation(v) {
                let f = self.face((v, w))?;
                corners.push(((v, w), net.add_arc(idx, face_node[&f], 3, 0)));
            }
        }

        // A bend outweighs the whole spreading penalty: every unit of supply
        // crosses at most one bend arc per face, each bend adds at most 3.
        let scale = 3 * supply * component_faces.len() as i64 + 1;
        let mut bends = Vec::new();
        for edge in &self.graph.edges {
            if !local.contains_key(&edge.a) {
                continue;
            }
            let h = (edge.a, edge.b);
            let f = self.face(h)?;
            let g = self.face((edge.b, edge.a))?;
            if f == g {
                continue;
            }
            let forward = self.bend_arcs(&mut net, face_node[&f], face_node[&g], scale);
            let backward = self.bend_arcs(&mut net, face_node[&g], face_node[&f], scale);
            bends.push((h, forward, backward));
        }

        let result = net.solve(source, sink, supply, budget, Stage::Orthogonalization)?;
        if result.flow < supply {
            return Err(LayoutError::orthogonalization(format!(
                "no feasible shape: routed {} of {} units",
                result.flow, supply
            )));
        }
        trace!(cost = result.cost, faces = component_faces.len(), "component shaped");

        for (h, arc) in corners {
            self.angles.insert(h, 1 + net.flow(arc) as usize);
        }
        for ((a, b), forward, backward) in bends {
            let lefts: i64 = forward.iter().map(|&arc| net.flow(arc)).sum();
            let rights: i64 = backward.iter().map(|&arc| net.flow(arc)).sum();
            self.turns.insert((a, b), (lefts as usize, rights as usize));
            self.turns.insert((b, a), (rights as usize, lefts as usize));
        }
        Ok(outer)
    }

    /// Convex cost tiers: the k-th bend on one side costs
    /// `bend_cost * scale + k - 1` (capped at 3 extra), so the bend count
    /// decides first and the tiers only break ties.
    fn bend_arcs(&self, net: &mut MinCostFlow, from: usize, to: usize, scale: i64) -> Vec<usize> {
        let base = self.bend_cost.saturating_mul(scale);
        if !self.spread_bends {
            return vec![net.add_arc(from, to, UNBOUNDED, self.bend_cost)];
        }
        let mut arcs: Vec<usize> = (0..3)
            .map(|k| net.add_arc(from, to, 1, base + k))
            .collect();
        arcs.push(net.add_arc(from, to, UNBOUNDED, base + 3));
        arcs
    }

    /// Spreads directions from the first half-edge (east) through corner
    /// angles and bends.
    fn assign_directions(&mut self, component: &[usize]) -> Result<()> {
        let Some(&root) = component
            .iter()
            .find(|&&v| self.embedding.degree(v) > 0)
        else {
            return Ok(());
        };
        let start = (root, self.embedding.rotation(root)[0]);
        let mut queue = VecDeque::new();
        self.settle(start, Direction::East, &mut queue)?;
        while let Some((v, w)) = queue.pop_front() {
            let dir = self.direction((v, w))?;
            let angle = self.angles.get(&(v, w)).copied().unwrap_or(1);
            let next = self.embedding.successor(v, w).ok_or_else(|| {
                LayoutError::orthogonalization(format!("{w} is not a neighbour of {v}"))
            })?;
            self.settle((v, next), dir.rotate_ccw(angle), &mut queue)?;

            let (lefts, rights) = self.turns.get(&(v, w)).copied().unwrap_or((0, 0));
            let arrival = walk_turns(dir, lefts, rights);
            let last = arrival[arrival.len() - 1];
            self.settle((w, v), last.opposite(), &mut queue)?;
        }

        for &v in component {
            let sum: usize = self
                .embedding
                .rotation(v)
                .iter()
                .map(|&w| self.angles.get(&(v, w)).copied().unwrap_or(1))
                .sum();
            if self.embedding.degree(v) > 0 && sum != 4 {
                return Err(LayoutError::orthogonalization(format!(
                    "corner angles around `{}` sum to {} quarter turns",
                    self.graph.id(v),
                    sum
                )));
            }
        }
        Ok(())
    }

    fn settle(
        &mut self,
        h: HalfEdge,
        dir: Direction,
        queue: &mut VecDeque<HalfEdge>,
    ) -> Result<()> {
        match self.directions.get(&h) {
            Some(&known) if known != dir => Err(LayoutError::orthogonalization(format!(
                "half-edge `{}` -> `{}` would point both {:?} and {:?}",
                self.graph.id(h.0),
                self.graph.id(h.1),
                known,
                dir
            ))),
            Some(_) => Ok(()),
            None => {
                self.directions.insert(h, dir);
                queue.push_back(h);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanarizationConfig;
    use crate::ir::{Point, Positions};
    use crate::layout::planarize::planarize;

    fn placed(vertices: &[(&str, f64, f64)], edges: &[(&str, &str)]) -> PlanarizedGraph {
        let mut graph = Graph::new();
        let mut positions = Positions::new();
        for &(id, x, y) in vertices {
            graph.ensure_vertex(id);
            positions.insert(id.to_string(), Point::new(x, y));
        }
        for &(a, b) in edges {
            graph.add_edge(a, b).unwrap();
        }
        planarize(
            &graph,
            Some(&positions),
            &PlanarizationConfig::default(),
            &Budget::unlimited(),
        )
        .unwrap()
    }

    fn run(planar: &PlanarizedGraph) -> OrthogonalRepresentation {
        orthogonalize(
            planar,
            &OrthogonalizationConfig::default(),
            &Budget::unlimited(),
        )
        .unwrap()
    }

    fn star(leaves: usize) -> PlanarizedGraph {
        let mut vertices = vec![("hub".to_string(), 0.0, 0.0)];
        for i in 0..leaves {
            let angle = i as f64 * std::f64::consts::TAU / leaves as f64;
            vertices.push((format!("leaf{i}"), angle.cos() * 4.0, angle.sin() * 4.0));
        }
        let refs: Vec<(&str, f64, f64)> = vertices
            .iter()
            .map(|(id, x, y)| (id.as_str(), *x, *y))
            .collect();
        let names: Vec<String> = (0..leaves).map(|i| format!("leaf{i}")).collect();
        let edges: Vec<(&str, &str)> = names.iter().map(|n| ("hub", n.as_str())).collect();
        placed(&refs, &edges)
    }

    fn assert_angles_close(ortho: &OrthogonalRepresentation) {
        for v in 0..ortho.graph.vertex_count() {
            if ortho.embedding.degree(v) > 0 {
                assert_eq!(ortho.corner_angles(v).iter().sum::<usize>(), 4, "vertex {v}");
            }
        }
    }

    #[test]
    fn single_edge_is_straight() {
        let planar = placed(&[("a", 0.0, 0.0), ("b", 1.0, 0.0)], &[("a", "b")]);
        let ortho = run(&planar);
        assert_eq!(ortho.total_bends, 0);
        assert_eq!(ortho.direction(0, 1), Some(Direction::East));
        assert_eq!(ortho.direction(1, 0), Some(Direction::West));
        assert_eq!(ortho.corner_angles(0), vec![4]);
    }

    /// Seeded random graph, laid out without a placement.
    fn scrambled(seed: u64, vertices: usize, edges: usize) -> PlanarizedGraph {
        let mut state = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
        let mut next = move |bound: usize| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as usize) % bound
        };
        let mut graph = Graph::new();
        for i in 0..vertices {
            graph.ensure_vertex(&format!("v{i}"));
        }
        let mut added = 0;
        for _ in 0..edges * 8 {
            if added == edges {
                break;
            }
            if graph.add_edge_between(next(vertices), next(vertices)).is_ok() {
                added += 1;
            }
        }
        planarize(&graph, None, &PlanarizationConfig::default(), &Budget::unlimited()).unwrap()
    }

    /// Sum over edge sides of the tier surcharges `min(k - 1, 3)`.
    fn stacking_penalty(ortho: &OrthogonalRepresentation) -> usize {
        let side = |n: usize| (0..n).map(|k| k.min(3)).sum::<usize>();
        ortho
            .edges
            .iter()
            .map(|edge| {
                let turns: Vec<i32> = edge
                    .segments
                    .windows(2)
                    .map(|pair| pair[0].turn_to(pair[1]))
                    .collect();
                let lefts = turns.iter().filter(|&&t| t == 1).count();
                let rights = turns.iter().filter(|&&t| t == -1).count();
                side(lefts) + side(rights)
            })
            .sum()
    }

    #[test]
    fn spreading_never_costs_an_extra_bend() {
        let flat = OrthogonalizationConfig {
            spread_bends: false,
            ..OrthogonalizationConfig::default()
        };
        for seed in 0..40 {
            let planar = scrambled(seed, 8, 14);
            let spread = run(&planar);
            let minimal = orthogonalize(&planar, &flat, &Budget::unlimited()).unwrap();
            assert_eq!(spread.total_bends, minimal.total_bends, "seed {seed}");
            assert!(
                stacking_penalty(&spread) <= stacking_penalty(&minimal),
                "seed {seed}: spreading stacked more bends"
            );
            assert_angles_close(&spread);
        }
    }

    #[test]
    fn bend_cost_does_not_change_the_total() {
        let pricey = OrthogonalizationConfig {
            bend_cost: 1000,
            ..OrthogonalizationConfig::default()
        };
        for seed in [3, 16, 27] {
            let planar = scrambled(seed, 8, 14);
            let cheap = run(&planar);
            let costly = orthogonalize(&planar, &pricey, &Budget::unlimited()).unwrap();
            assert_eq!(cheap.total_bends, costly.total_bends, "seed {seed}");
        }
    }

    #[test]
    fn square_needs_no_bends() {
        let planar = placed(
            &[("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 1.0, 1.0), ("d", 0.0, 1.0)],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
        );
        let ortho = run(&planar);
        assert_eq!(ortho.total_bends, 0);
        assert_angles_close(&ortho);
    }

    #[test]
    fn triangle_needs_exactly_one_bend() {
        let planar = placed(
            &[("a", 0.0, 0.0), ("b", 2.0, 0.0), ("c", 1.0, 2.0)],
            &[("a", "b"), ("b", "c"), ("c", "a")],
        );
        let ortho = run(&planar);
        assert_eq!(ortho.total_bends, 1);
        assert_angles_close(&ortho);
    }

    #[test]
    fn grid_is_drawn_without_bends() {
        let graph = Graph::grid(3, 3);
        let positions = Graph::grid_positions(3, 3);
        let planar = planarize(
            &graph,
            Some(&positions),
            &PlanarizationConfig::default(),
            &Budget::unlimited(),
        )
        .unwrap();
        let ortho = run(&planar);
        assert_eq!(ortho.total_bends, 0);
        assert_eq!(ortho.outer_faces.len(), 1);
        // The center has four neighbours on four distinct sides.
        let center = ortho.graph.index_of("1,1").unwrap();
        assert_eq!(ortho.corner_angles(center), vec![1, 1, 1, 1]);
    }

    #[test]
    fn crossing_dummies_get_right_angles() {
        let planar = placed(
            &[("a", 0.0, 0.0), ("b", 2.0, 0.0), ("c", 2.0, 2.0), ("d", 0.0, 2.0)],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a"), ("a", "c"), ("b", "d")],
        );
        let ortho = run(&planar);
        let crossing = ortho.graph.index_of("__crossing_0").unwrap();
        assert_eq!(ortho.corner_angles(crossing), vec![1, 1, 1, 1]);
        assert_angles_close(&ortho);
    }

    #[test]
    fn twin_routes_mirror_each_other() {
        let planar = placed(
            &[("a", 0.0, 0.0), ("b", 2.0, 0.0), ("c", 1.0, 2.0)],
            &[("a", "b"), ("b", "c"), ("c", "a")],
        );
        let ortho = run(&planar);
        for edge in &ortho.edges {
            let forward = ortho.route(edge.from, edge.to).unwrap();
            let backward = ortho.route(edge.to, edge.from).unwrap();
            assert_eq!(forward.len(), backward.len());
            assert_eq!(forward[0], ortho.direction(edge.from, edge.to).unwrap());
            assert_eq!(backward[0], ortho.direction(edge.to, edge.from).unwrap());
            assert_eq!(forward.last().unwrap().opposite(), backward[0]);
        }
    }

    #[test]
    fn splits_high_degree_vertices_into_a_chain() {
        let planar = star(6);
        let expanded = split_high_degree(&planar).unwrap();
        assert_eq!(expanded.graph.count_kind(VertexKind::Expansion), 1);
        assert_eq!(expanded.graph.edge_count(), 7);
        expanded.embedding.validate().unwrap();
        for v in 0..expanded.graph.vertex_count() {
            assert!(expanded.embedding.degree(v) <= 4);
            assert_eq!(expanded.embedding.degree(v), expanded.graph.degree(v));
        }
        let expansion = expanded.graph.index_of("__expand_0").unwrap();
        assert_eq!(expanded.graph.vertex(expansion).owner, Some(0));
        // Three leaves move to the expansion vertex; their chains follow.
        let moved: Vec<&Vec<usize>> = expanded
            .edge_chains
            .iter()
            .filter(|chain| chain[0] == expansion)
            .collect();
        assert_eq!(moved.len(), 3);
        assert_eq!(expanded.edge_chains.iter().filter(|chain| chain[0] == 0).count(), 3);
        assert_eq!(expanded.graph.degree(expansion), 4);
    }

    #[test]
    fn long_chains_for_very_high_degree() {
        let planar = star(9);
        let expanded = split_high_degree(&planar).unwrap();
        // 3 on the hub, then 2, 2 and a final 2 on the expansion vertices.
        assert_eq!(expanded.graph.count_kind(VertexKind::Expansion), 3);
        let ortho = run(&planar);
        assert_angles_close(&ortho);
        assert!(
            (0..ortho.graph.vertex_count()).all(|v| ortho.embedding.degree(v) <= 4)
        );
    }

    #[test]
    fn shaping_without_expansion_rejects_high_degree() {
        let planar = star(5);
        let err = shape(
            planar,
            &OrthogonalizationConfig::default(),
            &Budget::unlimited(),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::Orthogonalization { .. }));
    }

    #[test]
    fn rejects_an_invalid_embedding() {
        let mut planar = placed(&[("a", 0.0, 0.0), ("b", 1.0, 0.0)], &[("a", "b")]);
        planar.embedding = PlanarEmbedding::from_rotations(vec![vec![1], vec![]]);
        let err = orthogonalize(
            &planar,
            &OrthogonalizationConfig::default(),
            &Budget::unlimited(),
        )
        .unwrap_err();
        assert_eq!(err.stage(), Stage::Orthogonalization);
    }
}
