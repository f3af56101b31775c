//! Bundle validation.
//!
//! # Responsibility
//! - Collect every bundle touched by the closure.
//! - Reject requests that would carry only part of a bundle.
//!
//! # Invariants
//! - A bundle passes when each member is in the closure, or for moves
//!   already sits in the destination group.
//! - Validation reads only; it never mutates the store.

use crate::engine::closure::Closure;
use crate::engine::error::{RelocationError, RelocationResult};
use crate::engine::Target;
use crate::model::link::Bundle;
use crate::model::node::{Node, NodeId};
use crate::repo::graph_repo::GraphRepository;
use log::warn;
use std::collections::BTreeMap;

/// Closure whose bundles are known to be complete.
#[derive(Debug)]
pub struct ValidatedClosure {
    pub closure: Closure,
    /// Touched bundles ordered by anchor id.
    pub bundles: Vec<Bundle>,
}

/// Checks bundle completeness for the whole closure.
///
/// The first incomplete bundle, by anchor id, is reported.
pub fn validate_bundles<G: GraphRepository>(
    graph: &G,
    closure: Closure,
    target: &Target,
) -> RelocationResult<ValidatedClosure> {
    let mut touched: BTreeMap<NodeId, Bundle> = BTreeMap::new();
    for node in closure.snapshot.nodes() {
        for bundle in graph.bundles_of(node.id)? {
            touched.entry(bundle.anchor.id).or_insert(bundle);
        }
    }

    for bundle in touched.values() {
        let missing = missing_members(bundle, |member| {
            closure.snapshot.contains(member.id) || already_at_target(member, target)
        });
        if !missing.is_empty() {
            warn!(
                "event=bundle_check module=engine status=error bundle={} anchor_id={} missing={:?}",
                bundle.kind.as_str(),
                bundle.anchor.id,
                missing
            );
            return Err(RelocationError::ConstraintViolation {
                bundle: bundle.kind,
                anchor_id: bundle.anchor.id,
                member_ids: missing,
            });
        }
    }

    Ok(ValidatedClosure {
        closure,
        bundles: touched.into_values().collect(),
    })
}

/// Members of `bundle` that fail `carried`.
fn missing_members<F>(bundle: &Bundle, carried: F) -> Vec<NodeId>
where
    F: Fn(&Node) -> bool,
{
    bundle
        .members
        .iter()
        .filter(|member| !carried(member))
        .map(|member| member.id)
        .collect()
}

/// True when a move targets the group this node already lives in.
pub(crate) fn already_at_target(node: &Node, target: &Target) -> bool {
    target
        .destination_id()
        .is_some_and(|destination| node.group_id == destination)
}
