//! Min-cost flow by successive shortest paths.
//!
//! Arcs are stored in residual pairs: arc `i` and its reverse `i ^ 1`. Costs
//! are non-negative on forward arcs, so the residual graph never contains a
//! negative cycle and Bellman-Ford (queue based) finds every augmenting path.

use std::collections::VecDeque;

use super::Budget;
use super::error::{Result, Stage};

/// Capacity that never limits an augmentation.
pub const UNBOUNDED: i64 = i64::MAX / 4;

#[derive(Debug, Clone)]
struct Arc {
    to: usize,
    cap: i64,
    cost: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowResult {
    pub flow: i64,
    pub cost: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MinCostFlow {
    adjacency: Vec<Vec<usize>>,
    arcs: Vec<Arc>,
}

impl MinCostFlow {
    pub fn new(nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); nodes],
            arcs: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns an arc id usable with [`MinCostFlow::flow`].
    pub fn add_arc(&mut self, from: usize, to: usize, cap: i64, cost: i64) -> usize {
        let id = self.arcs.len();
        self.arcs.push(Arc { to, cap, cost });
        self.arcs.push(Arc {
            to: from,
            cap: 0,
            cost: -cost,
        });
        self.adjacency[from].push(id);
        self.adjacency[to].push(id + 1);
        id
    }

    /// Flow currently routed over a forward arc.
    pub fn flow(&self, arc: usize) -> i64 {
        self.arcs[arc ^ 1].cap
    }

    /// Pushes up to `demand` units from `source` to `sink` at minimum cost.
    /// Returns early with less flow when the sink becomes unreachable.
    pub fn solve(
        &mut self,
        source: usize,
        sink: usize,
        demand: i64,
        budget: &Budget,
        stage: Stage,
    ) -> Result<FlowResult> {
        let mut result = FlowResult { flow: 0, cost: 0 };
        while result.flow < demand {
            budget.check(stage)?;
            let Some((dist, via)) = self.shortest_path(source, sink) else {
                break;
            };

            let mut push = demand - result.flow;
            let mut node = sink;
            while node != source {
                let arc = via[node];
                push = push.min(self.arcs[arc].cap);
                node = self.arcs[arc ^ 1].to;
            }
            let mut node = sink;
            while node != source {
                let arc = via[node];
                self.arcs[arc].cap -= push;
                self.arcs[arc ^ 1].cap += push;
                node = self.arcs[arc ^ 1].to;
            }
            result.flow += push;
            result.cost += push * dist;
        }
        Ok(result)
    }

    /// Cheapest residual path; returns its cost and, per node, the arc used
    /// to reach it.
    fn shortest_path(&self, source: usize, sink: usize) -> Option<(i64, Vec<usize>)> {
        let n = self.adjacency.len();
        let mut dist = vec![i64::MAX; n];
        let mut via = vec![usize::MAX; n];
        let mut queued = vec![false; n];
        let mut queue = VecDeque::from([source]);
        dist[source] = 0;
        queued[source] = true;
        while let Some(u) = queue.pop_front() {
            queued[u] = false;
            for &id in &self.adjacency[u] {
                let arc = &self.arcs[id];
                if arc.cap <= 0 {
                    continue;
                }
                let candidate = dist[u] + arc.cost;
                if candidate < dist[arc.to] {
                    dist[arc.to] = candidate;
                    via[arc.to] = id;
                    if !queued[arc.to] {
                        queued[arc.to] = true;
                        queue.push_back(arc.to);
                    }
                }
            }
        }
        (dist[sink] != i64::MAX).then(|| (dist[sink], via))
    }
}
