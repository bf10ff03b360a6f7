//! Turns an orthogonal representation into integer grid coordinates.
//!
//! Bends become nodes of a port graph where every node has at most one
//! neighbour per side. Each component is enclosed in a frame and its faces
//! are refined into rectangles by dummy edges; two longest-path passes over
//! the resulting constraint graphs then give minimal x and y coordinates.
//! The frame and refinement nodes are dropped from the result.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, debug_span, trace};

use crate::config::CompactionConfig;
use crate::ir::{IdAllocator, VertexKind};

use super::Budget;
use super::error::{LayoutError, Result, Stage};
use super::orthogonalize::OrthogonalRepresentation;
use super::types::{Direction, DrawnPoint, Drawing, EdgeRoute, GridPoint, VertexPlacement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Vertex of the orthogonal representation.
    Vertex(usize),
    Bend,
    /// Frame corner or refinement point; never part of the output.
    Scaffold,
}

/// Half-edge leaving `tail` towards `dir`, with the turn taken at its head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    tail: usize,
    dir: Direction,
    turn: i32,
}

#[derive(Debug, Default)]
struct PortGraph {
    ports: Vec<[Option<usize>; 4]>,
    roles: Vec<Role>,
    component: Vec<usize>,
    /// Node path of every planar edge, from its `from` end to its `to` end.
    edge_paths: Vec<Vec<usize>>,
}

impl PortGraph {
    fn add_node(&mut self, role: Role, component: usize) -> usize {
        self.ports.push([None; 4]);
        self.roles.push(role);
        self.component.push(component);
        self.ports.len() - 1
    }

    fn neighbor(&self, v: usize, dir: Direction) -> Option<usize> {
        self.ports[v][dir.index()]
    }

    fn connect(&mut self, a: usize, b: usize, dir: Direction) -> Result<()> {
        if self.ports[a][dir.index()].is_some() || self.ports[b][dir.opposite().index()].is_some()
        {
            return Err(LayoutError::compaction(format!(
                "port {dir:?} between nodes {a} and {b} is already taken"
            )));
        }
        self.ports[a][dir.index()] = Some(b);
        self.ports[b][dir.opposite().index()] = Some(a);
        Ok(())
    }

    /// Splits the edge leaving `a` towards `dir` with `mid`.
    fn subdivide(&mut self, a: usize, dir: Direction, mid: usize) -> Result<()> {
        let b = self
            .neighbor(a, dir)
            .ok_or_else(|| LayoutError::compaction(format!("node {a} has no {dir:?} edge")))?;
        self.ports[a][dir.index()] = Some(mid);
        self.ports[mid][dir.opposite().index()] = Some(a);
        self.ports[mid][dir.index()] = Some(b);
        self.ports[b][dir.opposite().index()] = Some(mid);
        Ok(())
    }

    /// Leaving direction after arriving at `v` while travelling `arriving`,
    /// keeping the face on the left.
    fn next_out(&self, v: usize, arriving: Direction) -> Option<Direction> {
        let mut dir = arriving.opposite();
        for _ in 0..4 {
            dir = dir.cw();
            if self.neighbor(v, dir).is_some() {
                return Some(dir);
            }
        }
        None
    }

    fn walk(&self, start: (usize, Direction)) -> Result<Vec<Step>> {
        let limit = 4 * self.ports.len() + 4;
        let mut steps = Vec::new();
        let (mut tail, mut dir) = start;
        loop {
            let head = self.neighbor(tail, dir).ok_or_else(|| {
                LayoutError::compaction(format!("node {tail} has no {dir:?} edge"))
            })?;
            let out = self
                .next_out(head, dir)
                .ok_or_else(|| LayoutError::compaction(format!("node {head} is isolated")))?;
            steps.push(Step {
                tail,
                dir,
                turn: dir.turn_to(out),
            });
            (tail, dir) = (head, out);
            if (tail, dir) == start {
                return Ok(steps);
            }
            if steps.len() > limit {
                return Err(LayoutError::compaction("face walk does not close"));
            }
        }
    }

    fn faces(&self) -> Result<Vec<Vec<Step>>> {
        let mut visited = vec![[false; 4]; self.ports.len()];
        let mut faces = Vec::new();
        for v in 0..self.ports.len() {
            for dir in Direction::ALL {
                if visited[v][dir.index()] || self.neighbor(v, dir).is_none() {
                    continue;
                }
                let face = self.walk((v, dir))?;
                for step in &face {
                    visited[step.tail][step.dir.index()] = true;
                }
                faces.push(face);
            }
        }
        Ok(faces)
    }

    fn head(&self, step: &Step) -> Result<usize> {
        self.neighbor(step.tail, step.dir).ok_or_else(|| {
            LayoutError::compaction(format!("node {} has no {:?} edge", step.tail, step.dir))
        })
    }
}

fn turn_sum(face: &[Step]) -> i32 {
    face.iter().map(|step| step.turn).sum()
}

/// Computes integer coordinates for an orthogonal representation.
pub fn compact(
    ortho: &OrthogonalRepresentation,
    config: &CompactionConfig,
    budget: &Budget,
) -> Result<Drawing> {
    let _span = debug_span!(
        "compact",
        vertices = ortho.graph.vertex_count(),
        bends = ortho.total_bends
    )
    .entered();

    let components = ortho.embedding.components();
    let mut component_of = vec![0; ortho.graph.vertex_count()];
    for (idx, members) in components.iter().enumerate() {
        for &v in members {
            component_of[v] = idx;
        }
    }

    let mut ports = build_port_graph(ortho, &component_of)?;
    for &(a, b) in &ortho.outer_faces {
        budget.check(Stage::Compaction)?;
        let dir = ortho.direction(a, b).ok_or_else(|| {
            LayoutError::compaction(format!("outer half-edge {a} -> {b} has no direction"))
        })?;
        attach_frame(&mut ports, (a, dir), component_of[a])?;
    }
    refine(&mut ports, budget)?;

    let xs = longest_paths(&ports, Direction::North, Direction::East)?;
    let ys = longest_paths(&ports, Direction::East, Direction::North)?;
    let positions = place_components(&ports, &xs, &ys, components.len(), config.component_gap);

    let drawing = assemble(ortho, &ports, &positions)?;
    debug!(
        width = drawing.width,
        height = drawing.height,
        bends = drawing.total_bends(),
        "compaction finished"
    );
    Ok(drawing)
}

fn build_port_graph(ortho: &OrthogonalRepresentation, component_of: &[usize]) -> Result<PortGraph> {
    let mut ports = PortGraph::default();
    for v in 0..ortho.graph.vertex_count() {
        ports.add_node(Role::Vertex(v), component_of[v]);
    }
    for edge in &ortho.edges {
        let mut path = vec![edge.from];
        let mut current = edge.from;
        for (idx, &dir) in edge.segments.iter().enumerate() {
            let next = if idx + 1 == edge.segments.len() {
                edge.to
            } else {
                ports.add_node(Role::Bend, component_of[edge.from])
            };
            ports.connect(current, next, dir)?;
            path.push(next);
            current = next;
        }
        ports.edge_paths.push(path);
    }
    Ok(ports)
}

/// Encloses the component of `outer` in a four-sided frame, joined to it by
/// extending the first reflex corner of the outer face.
fn attach_frame(ports: &mut PortGraph, outer: (usize, Direction), component: usize) -> Result<()> {
    let face = ports.walk(outer)?;
    let corner = face
        .iter()
        .find(|step| step.turn < 0)
        .copied()
        .ok_or_else(|| LayoutError::compaction("outer face has no reflex corner"))?;
    let v = ports.head(&corner)?;

    let sw = ports.add_node(Role::Scaffold, component);
    let se = ports.add_node(Role::Scaffold, component);
    let ne = ports.add_node(Role::Scaffold, component);
    let nw = ports.add_node(Role::Scaffold, component);
    ports.connect(sw, se, Direction::East)?;
    ports.connect(se, ne, Direction::North)?;
    ports.connect(ne, nw, Direction::West)?;
    ports.connect(nw, sw, Direction::South)?;

    let (side_start, side_dir) = match corner.dir {
        Direction::East => (se, Direction::North),
        Direction::North => (ne, Direction::West),
        Direction::West => (nw, Direction::South),
        Direction::South => (sw, Direction::East),
    };
    let w = ports.add_node(Role::Scaffold, component);
    ports.subdivide(side_start, side_dir, w)?;
    ports.connect(v, w, corner.dir)
}

/// Splits faces at reflex corners until every face but the frame exteriors
/// is a rectangle.
fn refine(ports: &mut PortGraph, budget: &Budget) -> Result<()> {
    let limit = 4 * ports.ports.len() + 16;
    let mut splits = 0;
    loop {
        budget.check(Stage::Compaction)?;
        let faces = ports.faces()?;
        let Some(face) = faces
            .iter()
            .find(|face| turn_sum(face) != -4 && face.iter().any(|step| step.turn < 0))
        else {
            break;
        };
        if splits >= limit {
            return Err(LayoutError::compaction("face refinement does not terminate"));
        }
        let (reflex, front) = find_refinement(face)?;
        let v = ports.head(&reflex)?;
        if front.dir != reflex.dir.ccw() {
            return Err(LayoutError::compaction(format!(
                "front edge runs {:?}, expected {:?}",
                front.dir,
                reflex.dir.ccw()
            )));
        }
        let front_head = ports.head(&front)?;
        if front.tail == v || front_head == v {
            return Err(LayoutError::compaction(format!(
                "reflex corner at node {v} faces its own edge"
            )));
        }
        let w = ports.add_node(Role::Scaffold, ports.component[v]);
        ports.subdivide(front.tail, front.dir, w)?;
        ports.connect(v, w, reflex.dir)?;
        splits += 1;
    }
    trace!(splits, "faces refined into rectangles");
    Ok(())
}

/// A reflex corner followed by convex turns adding up to a left turn, and the
/// edge the extension of that corner runs into.
fn find_refinement(face: &[Step]) -> Result<(Step, Step)> {
    let m = face.len();
    for c in 0..m {
        if face[c].turn >= 0 {
            continue;
        }
        let mut sum = face[c].turn;
        for offset in 1..m {
            let j = (c + offset) % m;
            if face[j].turn < 0 {
                break;
            }
            sum += face[j].turn;
            if sum == 1 {
                return Ok((face[c], face[(j + 1) % m]));
            }
        }
    }
    Err(LayoutError::compaction("face has reflex corners but no refinement"))
}

/// Minimal coordinate along one axis: nodes joined through `same` ports share
/// a coordinate, and every `increasing` port steps the coordinate up by one.
fn longest_paths(ports: &PortGraph, same: Direction, increasing: Direction) -> Result<Vec<i64>> {
    let n = ports.ports.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn root(parent: &mut [usize], mut v: usize) -> usize {
        while parent[v] != v {
            parent[v] = parent[parent[v]];
            v = parent[v];
        }
        v
    }
    for v in 0..n {
        if let Some(w) = ports.neighbor(v, same) {
            let (rv, rw) = (root(&mut parent, v), root(&mut parent, w));
            if rv != rw {
                parent[rv.max(rw)] = rv.min(rw);
            }
        }
    }

    let mut class_of = vec![usize::MAX; n];
    let mut roots: BTreeMap<usize, usize> = BTreeMap::new();
    for v in 0..n {
        let r = root(&mut parent, v);
        let next = roots.len();
        class_of[v] = *roots.entry(r).or_insert(next);
    }
    let classes = roots.len();

    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); classes];
    let mut indegree = vec![0usize; classes];
    for v in 0..n {
        if let Some(w) = ports.neighbor(v, increasing) {
            outgoing[class_of[v]].push(class_of[w]);
            indegree[class_of[w]] += 1;
        }
    }

    let mut level = vec![0i64; classes];
    let mut queue: VecDeque<usize> = indegree
        .iter()
        .enumerate()
        .filter_map(|(idx, deg)| (*deg == 0).then_some(idx))
        .collect();
    let mut visited = 0;
    while let Some(class) = queue.pop_front() {
        visited += 1;
        for &next in &outgoing[class] {
            level[next] = level[next].max(level[class] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    if visited < classes {
        return Err(LayoutError::compaction(format!(
            "{increasing:?} constraints contain a cycle"
        )));
    }
    Ok(class_of.into_iter().map(|class| level[class]).collect())
}

/// Shifts components so that their kept nodes start at y = 0 and follow each
/// other left to right. Scaffold nodes get no position.
fn place_components(
    ports: &PortGraph,
    xs: &[i64],
    ys: &[i64],
    components: usize,
    gap: i64,
) -> Vec<Option<GridPoint>> {
    let mut bounds: Vec<Option<(i64, i64, i64)>> = vec![None; components];
    for node in 0..ports.roles.len() {
        if ports.roles[node] == Role::Scaffold {
            continue;
        }
        let entry = &mut bounds[ports.component[node]];
        let (min_x, max_x, min_y) = entry.unwrap_or((xs[node], xs[node], ys[node]));
        *entry = Some((min_x.min(xs[node]), max_x.max(xs[node]), min_y.min(ys[node])));
    }

    let mut shift = vec![(0, 0); components];
    let mut offset = 0;
    for (idx, bound) in bounds.iter().enumerate() {
        let Some((min_x, max_x, min_y)) = *bound else {
            continue;
        };
        shift[idx] = (offset - min_x, -min_y);
        offset += max_x - min_x + gap;
    }

    (0..ports.roles.len())
        .map(|node| {
            (ports.roles[node] != Role::Scaffold).then(|| {
                let (dx, dy) = shift[ports.component[node]];
                GridPoint::new(xs[node] + dx, ys[node] + dy)
            })
        })
        .collect()
}

fn assemble(
    ortho: &OrthogonalRepresentation,
    ports: &PortGraph,
    positions: &[Option<GridPoint>],
) -> Result<Drawing> {
    let at = |node: usize| {
        positions[node]
            .ok_or_else(|| LayoutError::compaction(format!("node {node} was not placed")))
    };

    let mut drawing = Drawing {
        crossings: ortho.graph.count_kind(VertexKind::Crossing),
        ..Drawing::default()
    };
    let mut ids = IdAllocator::default();
    for node in 0..ports.roles.len() {
        let (id, kind) = match ports.roles[node] {
            Role::Vertex(v) => (ortho.graph.id(v).to_string(), ortho.graph.vertex(v).kind),
            Role::Bend => (ids.next(&ortho.graph, VertexKind::Bend), VertexKind::Bend),
            Role::Scaffold => continue,
        };
        let position = at(node)?;
        drawing.width = drawing.width.max(position.x);
        drawing.height = drawing.height.max(position.y);
        drawing.points.insert(id, DrawnPoint { kind, position });
    }
    if drawing.has_coincident_points() {
        let mut seen: BTreeMap<GridPoint, &str> = BTreeMap::new();
        for (id, point) in &drawing.points {
            if let Some(other) = seen.insert(point.position, id) {
                return Err(LayoutError::compaction(format!(
                    "`{other}` and `{id}` share position ({}, {})",
                    point.position.x, point.position.y
                )));
            }
        }
    }

    for (idx, path) in ports.edge_paths.iter().enumerate() {
        for pair in path.windows(2) {
            let (p, q) = (at(pair[0])?, at(pair[1])?);
            if Direction::between(p, q).is_none() {
                let edge = &ortho.edges[idx];
                return Err(LayoutError::compaction(format!(
                    "edge `{}` -- `{}` has a segment that is not axis-aligned",
                    ortho.graph.id(edge.from),
                    ortho.graph.id(edge.to)
                )));
            }
        }
    }

    for v in 0..ortho.graph.vertex_count() {
        let vertex = ortho.graph.vertex(v);
        let owner = match vertex.kind {
            VertexKind::Real => v,
            VertexKind::Expansion => match vertex.owner {
                Some(owner) => owner,
                None => continue,
            },
            _ => continue,
        };
        let position = at(v)?;
        let placement = drawing
            .vertices
            .entry(ortho.graph.id(owner).to_string())
            .or_insert(VertexPlacement {
                position,
                min: position,
                max: position,
            });
        if owner == v {
            placement.position = position;
        }
        placement.min = GridPoint::new(
            placement.min.x.min(position.x),
            placement.min.y.min(position.y),
        );
        placement.max = GridPoint::new(
            placement.max.x.max(position.x),
            placement.max.y.max(position.y),
        );
    }

    for chain in &ortho.edge_chains {
        drawing.edges.push(route_chain(ortho, ports, chain, &at)?);
    }
    Ok(drawing)
}

/// Concatenates the node paths of a chain of planar edges and keeps only the
/// points where the route turns.
fn route_chain(
    ortho: &OrthogonalRepresentation,
    ports: &PortGraph,
    chain: &[usize],
    at: &dyn Fn(usize) -> Result<GridPoint>,
) -> Result<EdgeRoute> {
    let (Some(&first), Some(&last)) = (chain.first(), chain.last()) else {
        return Err(LayoutError::compaction("empty edge chain"));
    };
    let real = |v: usize| {
        let vertex = ortho.graph.vertex(v);
        ortho.graph.id(vertex.owner.unwrap_or(v)).to_string()
    };

    let mut nodes = vec![first];
    for pair in chain.windows(2) {
        let idx = ortho.graph.find_edge(pair[0], pair[1]).ok_or_else(|| {
            LayoutError::compaction(format!("chain edge {} -- {} is missing", pair[0], pair[1]))
        })?;
        let path = &ports.edge_paths[idx];
        if ortho.edges[idx].from == pair[0] {
            nodes.extend(path.iter().skip(1));
        } else {
            nodes.extend(path.iter().rev().skip(1));
        }
    }

    let mut points: Vec<GridPoint> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let point = at(node)?;
        if points.last() == Some(&point) {
            continue;
        }
        if points.len() >= 2 {
            let before = points[points.len() - 2];
            let middle = points[points.len() - 1];
            if Direction::between(before, middle) == Direction::between(middle, point) {
                points.pop();
            }
        }
        points.push(point);
    }

    Ok(EdgeRoute {
        from: real(first),
        to: real(last),
        points,
    })
}
