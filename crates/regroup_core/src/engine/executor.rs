//! Plan execution.
//!
//! # Responsibility
//! - Check every permission precondition before the first write.
//! - Apply a resolved plan: sever links that would span groups, reassign
//!   moved nodes, delete dropped nodes.
//! - Re-check bundle integrity against the store after mutation.
//!
//! # Invariants
//! - No write happens unless all preconditions hold.
//! - Only links that become cross-group through this plan are severed;
//!   bundle links are never severed.
//! - Runs inside the caller's transaction; any error means rollback.

use crate::engine::disposition::{PlannedNode, RelocationPlan};
use crate::engine::error::{RelocationError, RelocationResult};
use crate::engine::policy::Disposition;
use crate::model::group::PermissionLevel;
use crate::model::link::{Link, LinkKind};
use crate::model::node::{ActorId, GroupId, NodeId};
use crate::repo::graph_repo::GraphRepository;
use crate::repo::security_repo::SecurityRepository;
use log::{error, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What execution actually changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Nodes whose group changed.
    pub moved: Vec<NodeId>,
    pub deleted: Vec<NodeId>,
    /// Node id to new owner, for owner overrides that took effect.
    pub reowned: BTreeMap<NodeId, ActorId>,
    pub unlinked: Vec<Link>,
}

/// Rejects plans the actor is not allowed to apply.
pub fn check_preconditions<S: SecurityRepository>(
    security: &S,
    plan: &RelocationPlan,
) -> RelocationResult<()> {
    let actor = &plan.context.actor;

    if let Some(destination) = plan.target().destination() {
        if !actor.is_admin && !security.is_member(actor.id, destination.id)? {
            return Err(RelocationError::permission_denied(format!(
                "actor {} is not a member of destination group {}",
                actor.id, destination.id
            )));
        }
        if !plan.context.owner_overrides.is_empty() {
            if !actor.is_admin {
                return Err(RelocationError::permission_denied(
                    "only administrators may reassign owners",
                ));
            }
            for &to_owner in plan.context.owner_overrides.values() {
                if !security.is_member(to_owner, destination.id)? {
                    return Err(RelocationError::permission_denied(format!(
                        "owner override target {to_owner} is not a member of destination group {}",
                        destination.id
                    )));
                }
            }
        }
    }

    let mut denied = Vec::new();
    for entry in plan.entries.values() {
        if entry.structural
            && entry.disposition != Disposition::Leave
            && !security.has_write_access(actor.id, &entry.node)?
        {
            denied.push(entry.node.id);
        }
    }
    if !denied.is_empty() {
        return Err(RelocationError::permission_denied(format!(
            "actor {} may not modify nodes {denied:?}",
            actor.id
        )));
    }

    if let Some(destination) = plan.target().destination() {
        if destination.permission_level == PermissionLevel::Private {
            let mut membership: HashMap<ActorId, bool> = HashMap::new();
            let mut foreign = Vec::new();
            for entry in plan.entries_with(Disposition::Move) {
                let owner = entry.owner_after;
                let is_member = match membership.get(&owner) {
                    Some(&known) => known,
                    None => {
                        let known = security.is_member(owner, destination.id)?;
                        membership.insert(owner, known);
                        known
                    }
                };
                if !is_member {
                    foreign.push(entry.node.id);
                }
            }
            if !foreign.is_empty() {
                return Err(RelocationError::permission_denied(format!(
                    "private group {} only holds objects owned by its members; reassign owners of {foreign:?}",
                    destination.id
                )));
            }
        }
    }

    Ok(())
}

/// Applies the plan through the graph repository.
pub fn execute_plan<G: GraphRepository>(
    graph: &G,
    plan: &RelocationPlan,
) -> RelocationResult<ExecutionOutcome> {
    let mut outcome = ExecutionOutcome::default();

    sever_split_links(graph, plan, &mut outcome)?;

    if let Some(destination_id) = plan.target().destination_id() {
        for entry in plan.entries_with(Disposition::Move) {
            reassign(graph, entry, destination_id, &mut outcome)?;
        }
    }

    for entry in plan.entries_with(Disposition::Delete) {
        graph.delete_node(entry.node.id)?;
        outcome.deleted.push(entry.node.id);
    }

    verify_bundles(graph, plan)?;

    info!(
        "event=plan_execute module=engine status=ok moved={} deleted={} reowned={} unlinked={}",
        outcome.moved.len(),
        outcome.deleted.len(),
        outcome.reowned.len(),
        outcome.unlinked.len()
    );
    Ok(outcome)
}

fn sever_split_links<G: GraphRepository>(
    graph: &G,
    plan: &RelocationPlan,
    outcome: &mut ExecutionOutcome,
) -> RelocationResult<()> {
    let mut seen = BTreeSet::new();
    for entry in plan.entries_with(Disposition::Move) {
        for ends in graph.links_touching(entry.node.id)? {
            if ends.link.kind == LinkKind::Bundle || !seen.insert(ends.link.id) {
                continue;
            }
            if ends.parent_group_id != ends.child_group_id {
                continue;
            }
            let parent_after = plan.group_after(ends.link.parent_id, ends.parent_group_id);
            let child_after = plan.group_after(ends.link.child_id, ends.child_group_id);
            // Links to deleted ends go with the node.
            let (Some(parent_after), Some(child_after)) = (parent_after, child_after) else {
                continue;
            };
            if parent_after != child_after {
                graph.delete_link(ends.link.id)?;
                outcome.unlinked.push(ends.link);
            }
        }
    }
    Ok(())
}

fn reassign<G: GraphRepository>(
    graph: &G,
    entry: &PlannedNode,
    destination_id: GroupId,
    outcome: &mut ExecutionOutcome,
) -> RelocationResult<()> {
    let node = &entry.node;
    let group_changed = node.group_id != destination_id;
    let owner_changed = node.owner_id != entry.owner_after;
    if !group_changed && !owner_changed {
        return Ok(());
    }

    graph.reassign_node(node.id, destination_id, entry.owner_after)?;
    if group_changed {
        outcome.moved.push(node.id);
    }
    if owner_changed {
        outcome.reowned.insert(node.id, entry.owner_after);
    }
    Ok(())
}

fn verify_bundles<G: GraphRepository>(graph: &G, plan: &RelocationPlan) -> RelocationResult<()> {
    for bundle in &plan.bundles {
        if plan.disposition_of(bundle.anchor.id) == Some(Disposition::Delete) {
            continue;
        }
        let groups = graph.bundle_group_count(bundle.anchor.id)?;
        if groups > 1 {
            error!(
                "event=bundle_verify module=engine status=error bundle={} anchor_id={} groups={}",
                bundle.kind.as_str(),
                bundle.anchor.id,
                groups
            );
            return Err(RelocationError::ConstraintViolation {
                bundle: bundle.kind,
                anchor_id: bundle.anchor.id,
                member_ids: bundle
                    .members
                    .iter()
                    .filter(|member| !plan.follows(member.id))
                    .map(|member| member.id)
                    .collect(),
            });
        }
    }
    Ok(())
}
