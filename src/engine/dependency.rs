// ABOUTME: Dependency graph over planned tasks backed by petgraph
// ABOUTME: Priority-aware topological ordering, cycle extraction and reachability queries

use indexmap::IndexMap;
use petgraph::algo::has_path_connecting;
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use super::error::{EngineError, Result};

/// Directed graph with an edge `dependency -> dependent` for every ordering constraint
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: Graph<String, ()>,
    task_indices: IndexMap<String, NodeIndex>,
    priorities: Vec<i32>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; re-adding an existing id is a no-op
    pub fn add_task(&mut self, task_id: &str, priority: i32) -> NodeIndex {
        if let Some(&index) = self.task_indices.get(task_id) {
            return index;
        }
        let index = self.graph.add_node(task_id.to_string());
        self.task_indices.insert(task_id.to_string(), index);
        self.priorities.push(priority);
        index
    }

    /// Record that `task_id` runs after `dependency`. Returns false when either is unknown.
    pub fn add_dependency(&mut self, task_id: &str, dependency: &str) -> bool {
        match (self.task_indices.get(dependency), self.task_indices.get(task_id)) {
            (Some(&from), Some(&to)) => {
                self.graph.update_edge(from, to, ());
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.task_indices.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.task_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_indices.is_empty()
    }

    /// Task ids in insertion order
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.task_indices.keys().map(String::as_str)
    }

    fn neighbors(&self, task_id: &str, direction: Direction) -> Vec<String> {
        let Some(&node) = self.task_indices.get(task_id) else {
            return Vec::new();
        };
        let mut nodes: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
        nodes.sort();
        nodes.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    /// Direct dependencies of a task, in insertion order
    pub fn get_dependencies(&self, task_id: &str) -> Vec<String> {
        self.neighbors(task_id, Direction::Incoming)
    }

    /// Tasks that directly depend on the given task, in insertion order
    pub fn get_dependents(&self, task_id: &str) -> Vec<String> {
        self.neighbors(task_id, Direction::Outgoing)
    }

    /// Check if `task_id` depends on `dependency`, directly or transitively
    pub fn has_dependency_path(&self, task_id: &str, dependency: &str) -> bool {
        match (self.task_indices.get(dependency), self.task_indices.get(task_id)) {
            (Some(&from), Some(&to)) if from != to => {
                has_path_connecting(&self.graph, from, to, None)
            }
            _ => false,
        }
    }

    /// Either task is an ancestor of the other
    pub fn are_related(&self, a: &str, b: &str) -> bool {
        self.has_dependency_path(a, b) || self.has_dependency_path(b, a)
    }

    /// Adjacency as task id -> direct dependents, every task present
    pub fn adjacency(&self) -> IndexMap<String, Vec<String>> {
        self.task_indices
            .keys()
            .map(|id| (id.clone(), self.get_dependents(id)))
            .collect()
    }

    /// Kahn's algorithm. Ready tasks are taken by priority descending, then
    /// insertion order. Fails with the ids of one concrete cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<(i32, Reverse<usize>)> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(index, _)| (self.priorities[index], Reverse(index)))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some((_, Reverse(index))) = ready.pop() {
            let node = NodeIndex::new(index);
            order.push(self.graph[node].clone());

            for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                let slot = &mut in_degree[dependent.index()];
                *slot -= 1;
                if *slot == 0 {
                    ready.push((self.priorities[dependent.index()], Reverse(dependent.index())));
                }
            }
        }

        if order.len() == self.len() {
            return Ok(order);
        }

        let remaining: HashSet<NodeIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree > 0)
            .map(|(index, _)| NodeIndex::new(index))
            .collect();
        Err(EngineError::CyclicDependency {
            tasks: self.extract_cycle(&remaining),
        })
    }

    /// Walk dependencies from the earliest unconsumed task until a node repeats.
    /// Every unconsumed node has at least one unconsumed dependency.
    fn extract_cycle(&self, remaining: &HashSet<NodeIndex>) -> Vec<String> {
        let Some(&start) = remaining.iter().min() else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .filter(|n| remaining.contains(n))
                .min();
            let Some(next) = next else {
                break;
            };

            if let Some(position) = path.iter().position(|&n| n == next) {
                path.drain(..position);
                path.push(next);
                break;
            }
            path.push(next);
            current = next;
        }

        path.into_iter().map(|n| self.graph[n].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for id in ["task_a", "task_b", "task_c", "task_d"] {
            graph.add_task(id, 0);
        }
        graph.add_dependency("task_b", "task_a");
        graph.add_dependency("task_c", "task_a");
        graph.add_dependency("task_d", "task_b");
        graph.add_dependency("task_d", "task_c");
        graph
    }

    #[test]
    fn test_dependency_queries() {
        let graph = diamond();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.get_dependencies("task_a"), Vec::<String>::new());
        assert_eq!(graph.get_dependencies("task_d"), vec!["task_b", "task_c"]);
        assert_eq!(graph.get_dependents("task_a"), vec!["task_b", "task_c"]);
        assert!(graph.get_dependents("task_x").is_empty());

        assert!(graph.has_dependency_path("task_d", "task_a"));
        assert!(!graph.has_dependency_path("task_a", "task_d"));
        assert!(!graph.are_related("task_b", "task_c"));
        assert!(graph.are_related("task_a", "task_d"));
    }

    #[test]
    fn test_unknown_edge_endpoints_are_rejected() {
        let mut graph = diamond();
        assert!(!graph.add_dependency("task_a", "task_z"));
        assert!(graph.add_dependency("task_d", "task_a"));
        // duplicate edges collapse
        assert!(graph.add_dependency("task_d", "task_a"));
        assert_eq!(graph.get_dependencies("task_d").len(), 3);
    }

    #[test]
    fn test_topological_order() {
        let order = diamond().topological_order().unwrap();
        assert_eq!(order, vec!["task_a", "task_b", "task_c", "task_d"]);
    }

    #[test]
    fn test_priority_breaks_ties() {
        let mut graph = DependencyGraph::new();
        graph.add_task("low", 0);
        graph.add_task("high", 10);
        graph.add_task("mid", 5);
        graph.add_task("after_low", 100);
        graph.add_dependency("after_low", "low");

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec!["high", "mid", "low", "after_low"]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let mut graph = DependencyGraph::new();
        graph.add_task("root", 0);
        graph.add_task("a", 0);
        graph.add_task("b", 0);
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");
        graph.add_dependency("a", "root");

        match graph.topological_order() {
            Err(EngineError::CyclicDependency { tasks }) => {
                assert_eq!(tasks, vec!["a", "b", "a"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_task("loop", 0);
        graph.add_dependency("loop", "loop");

        let err = graph.topological_order().unwrap_err();
        assert_eq!(err.to_string(), "Circular dependency detected: loop -> loop");
    }

    #[test]
    fn test_adjacency_lists_every_task() {
        let adjacency = diamond().adjacency();
        assert_eq!(adjacency.len(), 4);
        assert_eq!(adjacency["task_a"], vec!["task_b", "task_c"]);
        assert!(adjacency["task_d"].is_empty());
    }
}
