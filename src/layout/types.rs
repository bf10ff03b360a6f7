use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::ir::VertexKind;

/// Axis direction, declared in counter-clockwise order starting east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Direction {
    East,
    North,
    West,
    South,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::East => 0,
            Direction::North => 1,
            Direction::West => 2,
            Direction::South => 3,
        }
    }

    pub fn from_index(idx: usize) -> Self {
        Self::ALL[idx % 4]
    }

    pub fn ccw(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn cw(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    pub fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    pub fn rotate_ccw(self, quarter_turns: usize) -> Self {
        Self::from_index(self.index() + quarter_turns)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::East => (1, 0),
            Direction::North => (0, 1),
            Direction::West => (-1, 0),
            Direction::South => (0, -1),
        }
    }

    /// Signed quarter turns when travelling `self` and continuing along
    /// `next`: +1 left, -1 right, 0 straight, -2 for a U-turn.
    pub fn turn_to(self, next: Direction) -> i32 {
        match (next.index() + 4 - self.index()) % 4 {
            0 => 0,
            1 => 1,
            2 => -2,
            _ => -1,
        }
    }

    pub fn between(from: GridPoint, to: GridPoint) -> Option<Direction> {
        match ((to.x - from.x).signum(), (to.y - from.y).signum()) {
            (1, 0) => Some(Direction::East),
            (-1, 0) => Some(Direction::West),
            (0, 1) => Some(Direction::North),
            (0, -1) => Some(Direction::South),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

impl GridPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawnPoint {
    pub kind: VertexKind,
    pub position: GridPoint,
}

/// Where a real vertex ended up. `min`/`max` span its expansion chain when
/// the vertex had degree > 4, otherwise they equal `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VertexPlacement {
    pub position: GridPoint,
    pub min: GridPoint,
    pub max: GridPoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRoute {
    pub from: String,
    pub to: String,
    /// Endpoints and bends, in order from `from` to `to`.
    pub points: Vec<GridPoint>,
}

impl EdgeRoute {
    pub fn bends(&self) -> usize {
        self.points.len().saturating_sub(2)
    }

    pub fn segments(&self) -> impl Iterator<Item = (GridPoint, GridPoint)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Drawing {
    /// Every point of the drawing: real vertices, crossings, expansion
    /// chain members and bends.
    pub points: BTreeMap<String, DrawnPoint>,
    pub vertices: BTreeMap<String, VertexPlacement>,
    /// One route per input edge, in input order.
    pub edges: Vec<EdgeRoute>,
    pub width: i64,
    pub height: i64,
    pub crossings: usize,
}

impl Drawing {
    pub fn total_bends(&self) -> usize {
        self.edges.iter().map(EdgeRoute::bends).sum()
    }

    pub fn is_orthogonal(&self) -> bool {
        self.edges
            .iter()
            .flat_map(EdgeRoute::segments)
            .all(|(a, b)| Direction::between(a, b).is_some())
    }

    pub fn has_coincident_points(&self) -> bool {
        let mut seen = HashSet::new();
        self.points
            .values()
            .any(|point| !seen.insert(point.position))
    }

    pub fn position(&self, id: &str) -> Option<GridPoint> {
        self.points.get(id).map(|point| point.position)
    }
}
