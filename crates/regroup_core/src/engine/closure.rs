//! Closure computation.
//!
//! # Responsibility
//! - Resolve and authorize the request roots.
//! - Walk composition children breadth-first and collect every reachable
//!   node, plus each node's full composition parent list.
//!
//! # Invariants
//! - The walk only descends; it never follows a link toward a parent.
//! - The walk stays inside the group of the node it descends from.
//! - Closure size never exceeds the configured ceiling.

use crate::engine::error::{RelocationError, RelocationResult};
use crate::engine::snapshot::GraphSnapshot;
use crate::model::node::{Node, NodeId, TypeTag};
use crate::model::request::{GroupContext, SessionContext};
use crate::repo::graph_repo::{GraphRepository, RepoResult};
use crate::repo::security_repo::SecurityRepository;
use log::debug;
use std::collections::VecDeque;

/// Nodes reachable from the roots along composition links.
#[derive(Debug)]
pub struct Closure {
    pub snapshot: GraphSnapshot,
    roots: Vec<usize>,
}

impl Closure {
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn is_root(&self, idx: usize) -> bool {
        self.roots.contains(&idx)
    }

    pub fn root_ids(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .map(|&idx| self.snapshot.node(idx).id)
            .collect()
    }
}

/// Whether the session may address this node at all.
pub fn is_visible<S: SecurityRepository>(
    security: &S,
    session: &SessionContext,
    node: &Node,
) -> RepoResult<bool> {
    if let GroupContext::Group(group_id) = session.group_context {
        if node.group_id != group_id {
            return Ok(false);
        }
    }
    security.has_read_access(session.actor_id, node)
}

/// Loads the roots and every composition descendant.
///
/// Missing, mistyped and invisible roots are reported together as
/// `NotFound`.
pub fn build_closure<G, S>(
    graph: &G,
    security: &S,
    session: &SessionContext,
    root_type: TypeTag,
    root_ids: &[NodeId],
    max_nodes: usize,
) -> RelocationResult<Closure>
where
    G: GraphRepository,
    S: SecurityRepository,
{
    let mut snapshot = GraphSnapshot::new();
    let mut roots = Vec::with_capacity(root_ids.len());
    let mut missing = Vec::new();

    for &id in root_ids {
        match graph.load_node(id)? {
            Some(node) if node.kind == root_type && is_visible(security, session, &node)? => {
                let (idx, _) = snapshot.insert(node);
                roots.push(idx);
            }
            _ => missing.push(id),
        }
    }
    if !missing.is_empty() {
        return Err(RelocationError::NotFound { ids: missing });
    }
    ensure_within(&snapshot, max_nodes)?;

    let mut queue: VecDeque<usize> = roots.iter().copied().collect();
    while let Some(parent_idx) = queue.pop_front() {
        let parent = snapshot.node(parent_idx);
        let (parent_id, parent_group) = (parent.id, parent.group_id);

        for child in graph.composition_children(parent_id)? {
            if child.group_id != parent_group {
                debug!(
                    "event=closure_skip module=engine status=ok parent_id={} child_id={} child_group_id={}",
                    parent_id,
                    child.id,
                    child.group_id
                );
                continue;
            }
            let (child_idx, inserted) = snapshot.insert(child);
            snapshot.add_child(parent_idx, child_idx);
            if inserted {
                ensure_within(&snapshot, max_nodes)?;
                queue.push_back(child_idx);
            }
        }
    }

    for idx in 0..snapshot.len() {
        let id = snapshot.node(idx).id;
        let parent_ids = graph
            .composition_parents(id)?
            .into_iter()
            .map(|parent| parent.id)
            .collect();
        snapshot.set_parents(idx, parent_ids);
    }

    Ok(Closure { snapshot, roots })
}

fn ensure_within(snapshot: &GraphSnapshot, max_nodes: usize) -> RelocationResult<()> {
    if snapshot.len() > max_nodes {
        return Err(RelocationError::TooLarge { limit: max_nodes });
    }
    Ok(())
}
