mod compaction;
mod crossings;
mod embedding;
mod error;
pub mod flow;
mod orthogonalize;
mod planarize;
pub(crate) mod types;

pub use compaction::compact;
pub use crossings::{count_crossings, crossing_pairs, segment_intersection, segments_cross};
pub use embedding::{HalfEdge, PlanarEmbedding, positions_to_embedding};
pub use error::{LayoutError, Result, Stage};
pub use orthogonalize::{
    OrthogonalEdge, OrthogonalRepresentation, orthogonalize, split_high_degree,
};
pub use planarize::{PlanarizedGraph, planarize};
pub use types::*;

use std::time::{Duration, Instant};

use tracing::{debug, info_span, warn};

use crate::config::LayoutConfig;
use crate::ir::{Graph, Positions};

/// Wall-clock allowance shared by every stage of one layout run.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Option<Duration>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
        }
    }

    pub fn from_millis(limit_ms: Option<u64>) -> Self {
        Self {
            started: Instant::now(),
            limit: limit_ms.map(Duration::from_millis),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn check(&self, stage: Stage) -> Result<()> {
        match self.limit {
            Some(limit) if self.started.elapsed() > limit => Err(LayoutError::Timeout {
                stage,
                budget_ms: limit.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

/// Intermediate results of every stage, for inspection and debugging dumps.
#[derive(Debug, Clone)]
pub struct LayoutStages {
    pub planar: PlanarizedGraph,
    pub ortho: OrthogonalRepresentation,
    pub drawing: Drawing,
}

/// Orthogonal grid drawing of `graph`.
///
/// With `positions`, the straight-line placement fixes the embedding and
/// the crossings; without it, a planar embedding is built combinatorially.
pub fn compute_layout(
    graph: &Graph,
    positions: Option<&Positions>,
    config: &LayoutConfig,
) -> Result<Drawing> {
    compute_stages(graph, positions, config).map(|stages| stages.drawing)
}

pub fn compute_stages(
    graph: &Graph,
    positions: Option<&Positions>,
    config: &LayoutConfig,
) -> Result<LayoutStages> {
    let _span = info_span!(
        "layout",
        vertices = graph.vertex_count(),
        edges = graph.edge_count()
    )
    .entered();
    let budget = Budget::from_millis(config.time_budget_ms);

    let run = || -> Result<LayoutStages> {
        let planar = planarize(graph, positions, &config.planarization, &budget)?;
        budget.check(Stage::Planarization)?;
        let ortho = orthogonalize(&planar, &config.orthogonalization, &budget)?;
        budget.check(Stage::Orthogonalization)?;
        let drawing = compact(&ortho, &config.compaction, &budget)?;
        Ok(LayoutStages {
            planar,
            ortho,
            drawing,
        })
    };
    let stages = run().inspect_err(|err| warn!(stage = %err.stage(), %err, "layout failed"))?;
    debug!(
        crossings = stages.drawing.crossings,
        bends = stages.drawing.total_bends(),
        elapsed_ms = budget.elapsed().as_millis() as u64,
        "layout finished"
    );
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanarizationConfig;
    use crate::ir::{Point, VertexKind};

    fn placed(vertices: &[(&str, f64, f64)], edges: &[(&str, &str)]) -> (Graph, Positions) {
        let mut graph = Graph::new();
        let mut positions = Positions::new();
        for &(id, x, y) in vertices {
            graph.ensure_vertex(id);
            positions.insert(id.to_string(), Point::new(x, y));
        }
        for &(a, b) in edges {
            graph.add_edge(a, b).unwrap();
        }
        (graph, positions)
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

    fn assert_sound(drawing: &Drawing, graph: &Graph) {
        assert!(drawing.is_orthogonal());
        assert!(!drawing.has_coincident_points());
        assert_eq!(drawing.edges.len(), graph.edge_count());
        for vertex in &graph.vertices {
            assert!(drawing.vertices.contains_key(&vertex.id), "{}", vertex.id);
        }
        for (route, edge) in drawing.edges.iter().zip(&graph.edges) {
            assert_eq!(route.from, graph.id(edge.a));
            assert_eq!(route.to, graph.id(edge.b));
            for (a, b) in route.segments() {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn grid_with_placement_is_drawn_without_bends() {
        let graph = Graph::grid(5, 5);
        let positions = Graph::grid_positions(5, 5);
        let drawing = compute_layout(&graph, Some(&positions), &LayoutConfig::default()).unwrap();
        assert_sound(&drawing, &graph);
        assert_eq!(drawing.crossings, 0);
        assert_eq!(drawing.total_bends(), 0);
        assert_eq!((drawing.width, drawing.height), (4, 4));
    }

    #[test]
    fn single_edge_has_no_bends() {
        let (graph, positions) = placed(&[("a", 0.0, 0.0), ("b", 0.0, 3.0)], &[("a", "b")]);
        let drawing = compute_layout(&graph, Some(&positions), &LayoutConfig::default()).unwrap();
        assert_sound(&drawing, &graph);
        assert_eq!(drawing.total_bends(), 0);
        assert_eq!(drawing.edges[0].points.len(), 2);
    }

    #[test]
    fn bowtie_placement_gets_one_crossing() {
        let (graph, positions) = placed(
            &[("a", 0.0, 0.0), ("b", 2.0, 2.0), ("c", 2.0, 0.0), ("d", 0.0, 2.0)],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("d", "a")],
        );
        let stages = compute_stages(&graph, Some(&positions), &LayoutConfig::default()).unwrap();
        assert_eq!(stages.planar.crossing_count(), 1);
        assert_eq!(stages.drawing.crossings, 1);
        assert_sound(&stages.drawing, &graph);
        let crossing = &stages.drawing.points["__crossing_0"];
        assert_eq!(crossing.kind, VertexKind::Crossing);
    }

    #[test]
    fn crossing_free_placement_keeps_its_rotation() {
        let graph = Graph::grid(3, 4);
        let positions = Graph::grid_positions(3, 4);
        let stages = compute_stages(&graph, Some(&positions), &LayoutConfig::default()).unwrap();
        let expected = positions_to_embedding(&graph, &positions).unwrap();
        assert!(stages.planar.embedding.is_equivalent(&expected));
        // Without bends the shape has to follow the placement exactly.
        assert_eq!(stages.ortho.total_bends, 0);
        for edge in &graph.edges {
            let a = positions[graph.id(edge.a)];
            let b = positions[graph.id(edge.b)];
            let expected = Direction::between(
                GridPoint::new(a.x as i64, a.y as i64),
                GridPoint::new(b.x as i64, b.y as i64),
            );
            assert_eq!(stages.ortho.direction(edge.a, edge.b), expected);
        }
    }

    #[test]
    fn complete_graphs_without_placement() {
        for graph in [complete(4), complete(5)] {
            let drawing = compute_layout(&graph, None, &LayoutConfig::default()).unwrap();
            assert_sound(&drawing, &graph);
        }
        let k5 = compute_layout(&complete(5), None, &LayoutConfig::default()).unwrap();
        assert!(k5.crossings >= 1);
    }

    #[test]
    fn k33_without_placement() {
        let mut graph = Graph::new();
        for id in ["a0", "a1", "a2", "b0", "b1", "b2"] {
            graph.ensure_vertex(id);
        }
        for a in ["a0", "a1", "a2"] {
            for b in ["b0", "b1", "b2"] {
                graph.add_edge(a, b).unwrap();
            }
        }
        let drawing = compute_layout(&graph, None, &LayoutConfig::default()).unwrap();
        assert_sound(&drawing, &graph);
        assert!(drawing.crossings >= 1);
    }

    #[test]
    fn high_degree_star() {
        let mut graph = Graph::new();
        graph.ensure_vertex("hub");
        for i in 0..7 {
            let leaf = format!("leaf{i}");
            graph.ensure_vertex(&leaf);
            graph.add_edge("hub", &leaf).unwrap();
        }
        let stages = compute_stages(&graph, None, &LayoutConfig::default()).unwrap();
        assert!(stages.ortho.expansion_count() >= 1);
        assert_sound(&stages.drawing, &graph);
        let hub = stages.drawing.vertices["hub"];
        assert!(hub.min.x <= hub.position.x && hub.position.x <= hub.max.x);
        assert!(hub.min.y <= hub.position.y && hub.position.y <= hub.max.y);
    }

    #[test]
    fn disconnected_graph_and_isolated_vertices() {
        let mut graph = Graph::grid(2, 2);
        for id in ["x", "y", "solo"] {
            graph.ensure_vertex(id);
        }
        graph.add_edge("x", "y").unwrap();
        let drawing = compute_layout(&graph, None, &LayoutConfig::default()).unwrap();
        assert_sound(&drawing, &graph);
        assert_eq!(drawing.points.len(), graph.vertex_count() + drawing.total_bends());
    }

    #[test]
    fn empty_graph_gives_empty_drawing() {
        let drawing = compute_layout(&Graph::new(), None, &LayoutConfig::default()).unwrap();
        assert!(drawing.points.is_empty());
        assert_eq!((drawing.width, drawing.height), (0, 0));
    }

    #[test]
    fn errors_carry_their_stage() {
        let (graph, positions) = placed(
            &[("a", 0.0, 0.0), ("b", 2.0, 0.0), ("c", 2.0, 2.0), ("d", 0.0, 2.0)],
            &[("a", "c"), ("b", "d")],
        );
        let config = LayoutConfig {
            planarization: PlanarizationConfig { max_iterations: 0 },
            ..LayoutConfig::default()
        };
        let err = compute_layout(&graph, Some(&positions), &config).unwrap_err();
        assert_eq!(err.stage(), Stage::Planarization);

        let mut missing = positions.clone();
        missing.remove("d");
        let err = compute_layout(&graph, Some(&missing), &LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, LayoutError::MissingPosition { .. }));
        assert_eq!(err.stage(), Stage::Embedding);
    }

    #[test]
    fn exhausted_budget_times_out() {
        let budget = Budget::from_millis(Some(0));
        std::thread::sleep(Duration::from_millis(2));
        let err = budget.check(Stage::Compaction).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::Timeout {
                stage: Stage::Compaction,
                budget_ms: 0
            }
        ));
        assert!(Budget::unlimited().check(Stage::Planarization).is_ok());
    }
}
