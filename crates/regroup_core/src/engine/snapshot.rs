//! Per-request graph arena.
//!
//! # Responsibility
//! - Hold the closure nodes loaded for one request, addressed by index.
//! - Record composition edges inside the closure and every composition
//!   parent id, inside or outside it.
//!
//! # Invariants
//! - Each node id appears at most once; indices are stable for the request.
//! - The arena is built once per request and never outlives it.

use crate::model::node::{Node, NodeId};
use std::collections::{HashMap, VecDeque};

/// Arena of nodes with index-based adjacency.
#[derive(Debug, Default)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<NodeId>>,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node, returning its index and whether it was new.
    pub fn insert(&mut self, node: Node) -> (usize, bool) {
        if let Some(&idx) = self.index.get(&node.id) {
            return (idx, false);
        }
        let idx = self.nodes.len();
        self.index.insert(node.id, idx);
        self.nodes.push(node);
        self.children.push(Vec::new());
        self.parents.push(Vec::new());
        (idx, true)
    }

    /// Records a composition edge between two arena nodes.
    pub fn add_child(&mut self, parent: usize, child: usize) {
        if !self.children[parent].contains(&child) {
            self.children[parent].push(child);
        }
    }

    /// Stores every composition parent id of one node.
    pub fn set_parents(&mut self, idx: usize, mut parent_ids: Vec<NodeId>) {
        parent_ids.sort_unstable();
        parent_ids.dedup();
        self.parents[idx] = parent_ids;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    pub fn parents(&self, idx: usize) -> &[NodeId] {
        &self.parents[idx]
    }

    /// Parents before children (Kahn).
    ///
    /// Returns `None` when the in-closure composition edges contain a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for children in &self.children {
            for &child in children {
                in_degree[child] += 1;
            }
        }

        let mut ready: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(idx) = ready.pop_front() {
            order.push(idx);
            for &child in &self.children[idx] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push_back(child);
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }
}
