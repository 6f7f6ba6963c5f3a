use crate::error::{PlanError, PlanResult};
use crate::task::DependencyType;
use crate::tasks::Tasks;
use crate::timespan::TimeSpan;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Dependency edge between two leaf tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub kind: DependencyType,
    pub lag: TimeSpan,
}

/// A constraint on a task: the row it waits for and how.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub from: usize,
    pub kind: DependencyType,
    pub lag: TimeSpan,
}

/// Predecessor graph over schedulable (non-blank, non-summary) rows.
///
/// Predecessors of a summary apply to each of its leaves, and a summary named
/// as a predecessor stands for all of its leaves.
pub struct DependencyGraph {
    pub graph: DiGraph<usize, Link>,
    pub row_to_index: HashMap<usize, NodeIndex>,
}

impl DependencyGraph {
    pub fn build(tasks: &Tasks) -> Self {
        let mut graph: DiGraph<usize, Link> = DiGraph::new();
        let mut row_to_index: HashMap<usize, NodeIndex> = HashMap::new();

        // nodes first
        for (row, task) in tasks.not_blank() {
            if !task.is_summary() {
                row_to_index.insert(row, graph.add_node(row));
            }
        }

        // edges: predecessor leaf -> successor leaf
        for (&row, &to) in &row_to_index {
            let holders = std::iter::once(row).chain(tasks.summaries_of(row));
            for holder in holders {
                let Ok(task) = tasks.get(holder) else {
                    continue;
                };
                for pred in task.predecessors.iter() {
                    for leaf in tasks.leaves_of(pred.task) {
                        if let Some(&from) = row_to_index.get(&leaf) {
                            graph.add_edge(
                                from,
                                to,
                                Link {
                                    kind: pred.kind,
                                    lag: pred.lag,
                                },
                            );
                        }
                    }
                }
            }
        }

        Self {
            graph,
            row_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn check_acyclic(&self) -> PlanResult<()> {
        toposort(&self.graph, None)
            .map(|_| ())
            .map_err(|cycle| PlanError::CyclicDependency {
                task: self.graph[cycle.node_id()],
            })
    }

    /// Evaluation order: every task after all of its predecessors, and among
    /// ready tasks higher priority first, then lower row.
    pub fn schedule_order(&self, tasks: &Tasks) -> PlanResult<Vec<usize>> {
        self.check_acyclic()?;

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|ix| (ix, self.graph.neighbors_directed(ix, Direction::Incoming).count()))
            .collect();

        let priority = |ix: NodeIndex| {
            let row = self.graph[ix];
            let prio = tasks.get(row).map(|task| task.priority).unwrap_or(0);
            (prio, Reverse(row), ix)
        };

        let mut ready: BinaryHeap<(u32, Reverse<usize>, NodeIndex)> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(ix, _)| priority(*ix))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((_, Reverse(row), ix)) = ready.pop() {
            order.push(row);
            for succ in self.graph.neighbors_directed(ix, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(priority(succ));
                    }
                }
            }
        }
        Ok(order)
    }

    /// Incoming constraints of a leaf row.
    pub fn constraints_of(&self, row: usize) -> Vec<Constraint> {
        let Some(&ix) = self.row_to_index.get(&row) else {
            return Vec::new();
        };
        let mut constraints: Vec<Constraint> = self
            .graph
            .edges_directed(ix, Direction::Incoming)
            .map(|edge| Constraint {
                from: self.graph[edge.source()],
                kind: edge.weight().kind,
                lag: edge.weight().lag,
            })
            .collect();
        constraints.sort_by_key(|c| c.from);
        constraints
    }
}
