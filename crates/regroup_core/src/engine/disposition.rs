//! Disposition resolution.
//!
//! # Responsibility
//! - Turn a validated closure into a complete plan: one disposition per
//!   structural node, bundle anchor and reachable annotation.
//! - Apply owner overrides to every moving node.
//!
//! # Invariants
//! - Parents are decided before children, so sharing checks see final
//!   parent dispositions.
//! - A plan never carries part of a bundle; a bundle member that is
//!   shared with a staying parent makes the whole request fail instead.
//! - A plan never holds more than `max_nodes` entries.
//! - Resolution reads the store but never mutates it.

use crate::engine::bundle::{already_at_target, ValidatedClosure};
use crate::engine::closure::Closure;
use crate::engine::error::{RelocationError, RelocationResult};
use crate::engine::policy::{
    annotation_disposition, rendering_settings_disposition, structural_disposition,
    AnnotationCase, AnnotationOwner, Disposition, DispositionReason, ParentState,
};
use crate::engine::Target;
use crate::model::group::{Actor, PermissionLevel};
use crate::model::link::Bundle;
use crate::model::node::{ActorId, GroupId, Node, NodeId};
use crate::model::request::ChildOptionMap;
use crate::repo::graph_repo::{GraphRepository, RepoError, RepoResult};
use crate::repo::security_repo::SecurityRepository;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

/// Request facts the resolver needs besides the closure.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub actor: Actor,
    pub target: Target,
    pub child_options: ChildOptionMap,
    pub owner_overrides: BTreeMap<ActorId, ActorId>,
    /// Ceiling on planned nodes, anchors and annotations included.
    pub max_nodes: usize,
}

/// One node with its decided fate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNode {
    pub node: Node,
    pub disposition: Disposition,
    pub reason: DispositionReason,
    /// Roots, composition descendants and bundle anchors; these require
    /// write access. Annotations do not.
    pub structural: bool,
    /// Owner after a move; differs from `node.owner_id` only under an
    /// override.
    pub owner_after: ActorId,
}

/// Complete per-request plan handed to the executor.
#[derive(Debug)]
pub struct RelocationPlan {
    pub context: PlanContext,
    pub root_ids: Vec<NodeId>,
    pub entries: BTreeMap<NodeId, PlannedNode>,
    pub bundles: Vec<Bundle>,
}

impl RelocationPlan {
    pub fn target(&self) -> &Target {
        &self.context.target
    }

    pub fn disposition_of(&self, id: NodeId) -> Option<Disposition> {
        self.entries.get(&id).map(|entry| entry.disposition)
    }

    /// Whether the node shares the roots' fate.
    pub fn follows(&self, id: NodeId) -> bool {
        self.disposition_of(id) == Some(self.target().follow())
    }

    pub fn entries_with(&self, disposition: Disposition) -> impl Iterator<Item = &PlannedNode> {
        self.entries
            .values()
            .filter(move |entry| entry.disposition == disposition)
    }

    /// Group the node will live in after execution; `None` once deleted.
    pub fn group_after(&self, id: NodeId, current_group: GroupId) -> Option<GroupId> {
        match self.disposition_of(id) {
            Some(Disposition::Delete) => None,
            Some(Disposition::Move) => Some(self.target().destination_id().unwrap_or(current_group)),
            Some(Disposition::Leave) | None => Some(current_group),
        }
    }
}

/// Decides every disposition for one request.
pub fn resolve_dispositions<G, S>(
    graph: &G,
    security: &S,
    validated: ValidatedClosure,
    context: PlanContext,
) -> RelocationResult<RelocationPlan>
where
    G: GraphRepository,
    S: SecurityRepository,
{
    let ValidatedClosure { closure, bundles } = validated;
    let follow = context.target.follow();

    let mut entries = resolve_structural(&closure, &context, follow);
    resolve_anchors(&bundles, follow, &mut entries);
    ensure_within(&entries, context.max_nodes)?;
    ensure_bundles_intact(&bundles, &context.target, &entries)?;
    resolve_annotations(graph, security, &context, &mut entries)?;
    ensure_within(&entries, context.max_nodes)?;
    apply_owner_overrides(&context, &mut entries);

    Ok(RelocationPlan {
        root_ids: closure.root_ids(),
        context,
        entries,
        bundles,
    })
}

fn resolve_structural(
    closure: &Closure,
    context: &PlanContext,
    follow: Disposition,
) -> BTreeMap<NodeId, PlannedNode> {
    let snapshot = &closure.snapshot;
    let order = match snapshot.topological_order() {
        Some(order) => order,
        None => {
            warn!(
                "event=closure_order module=engine status=error reason=composition_cycle fallback=walk_order nodes={}",
                snapshot.len()
            );
            (0..snapshot.len()).collect()
        }
    };

    let mut decided: Vec<Option<Disposition>> = vec![None; snapshot.len()];
    let mut entries = BTreeMap::new();
    for idx in order {
        let node = snapshot.node(idx);
        let (disposition, reason) = if closure.is_root(idx) {
            (follow, DispositionReason::Root)
        } else {
            let parents = parent_state(closure, idx, &decided, follow);
            if node.kind.is_rendering_settings() {
                (
                    rendering_settings_disposition(parents),
                    DispositionReason::RenderingSettings,
                )
            } else {
                structural_disposition(
                    follow,
                    parents,
                    context.child_options.get(&node.kind).copied(),
                )
            }
        };

        decided[idx] = Some(disposition);
        entries.insert(
            node.id,
            PlannedNode {
                node: node.clone(),
                disposition,
                reason,
                structural: true,
                owner_after: node.owner_id,
            },
        );
    }
    entries
}

fn parent_state(
    closure: &Closure,
    idx: usize,
    decided: &[Option<Disposition>],
    follow: Disposition,
) -> ParentState {
    let snapshot = &closure.snapshot;
    let mut state = ParentState {
        held_outside: false,
        held_by_following: false,
    };
    for &parent_id in snapshot.parents(idx) {
        match snapshot.index_of(parent_id).and_then(|parent| decided[parent]) {
            Some(disposition) if disposition == follow => state.held_by_following = true,
            _ => state.held_outside = true,
        }
    }
    state
}

/// Anchors outside the closure follow as soon as any member does.
fn resolve_anchors(
    bundles: &[Bundle],
    follow: Disposition,
    entries: &mut BTreeMap<NodeId, PlannedNode>,
) {
    for bundle in bundles {
        if entries.contains_key(&bundle.anchor.id) {
            continue;
        }
        let carried = bundle.members.iter().any(|member| {
            entries
                .get(&member.id)
                .is_some_and(|entry| entry.disposition == follow)
        });
        if carried {
            entries.insert(
                bundle.anchor.id,
                PlannedNode {
                    node: bundle.anchor.clone(),
                    disposition: follow,
                    reason: DispositionReason::Bundle,
                    structural: true,
                    owner_after: bundle.anchor.owner_id,
                },
            );
        }
    }
}

fn ensure_within(
    entries: &BTreeMap<NodeId, PlannedNode>,
    max_nodes: usize,
) -> RelocationResult<()> {
    if entries.len() > max_nodes {
        warn!(
            "event=plan_size module=engine status=error planned={} limit={}",
            entries.len(),
            max_nodes
        );
        return Err(RelocationError::TooLarge { limit: max_nodes });
    }
    Ok(())
}

/// Catches bundles split by sharing or child options after validation passed.
fn ensure_bundles_intact(
    bundles: &[Bundle],
    target: &Target,
    entries: &BTreeMap<NodeId, PlannedNode>,
) -> RelocationResult<()> {
    let follow = target.follow();
    let follows = |node: &Node| {
        entries
            .get(&node.id)
            .is_some_and(|entry| entry.disposition == follow)
    };

    for bundle in bundles {
        if !bundle.nodes().any(|node| follows(node)) {
            continue;
        }
        let stranded: Vec<NodeId> = bundle
            .nodes()
            .filter(|node| !follows(node) && !already_at_target(node, target))
            .map(|node| node.id)
            .collect();
        if !stranded.is_empty() {
            warn!(
                "event=bundle_check module=engine status=error stage=resolve bundle={} anchor_id={} stranded={:?}",
                bundle.kind.as_str(),
                bundle.anchor.id,
                stranded
            );
            return Err(RelocationError::ConstraintViolation {
                bundle: bundle.kind,
                anchor_id: bundle.anchor.id,
                member_ids: stranded,
            });
        }
    }
    Ok(())
}

fn resolve_annotations<G, S>(
    graph: &G,
    security: &S,
    context: &PlanContext,
    entries: &mut BTreeMap<NodeId, PlannedNode>,
) -> RelocationResult<()>
where
    G: GraphRepository,
    S: SecurityRepository,
{
    let follow = context.target.follow();
    let following: Vec<NodeId> = entries
        .values()
        .filter(|entry| entry.disposition == follow)
        .map(|entry| entry.node.id)
        .collect();

    let mut candidates: BTreeMap<NodeId, Node> = BTreeMap::new();
    for id in following {
        for link in graph.annotation_links_of(id)? {
            candidates
                .entry(link.annotation.id)
                .or_insert(link.annotation);
        }
    }

    let destination_level = context
        .target
        .destination()
        .map(|group| group.permission_level);
    let mut levels: HashMap<GroupId, PermissionLevel> = HashMap::new();
    let mut decisions = Vec::with_capacity(candidates.len());

    for (id, annotation) in candidates {
        if entries.contains_key(&id) {
            continue;
        }
        let Some(sharing) = annotation.kind.annotation_sharing() else {
            continue;
        };

        let annotated = graph.annotated_objects(id)?;
        let follows = |node: &Node| {
            entries
                .get(&node.id)
                .is_some_and(|entry| entry.disposition == follow)
        };
        let linked_elsewhere = annotated.iter().any(|object| !follows(object));
        let owner = if annotation.owner_id == context.actor.id
            || annotated
                .iter()
                .any(|object| object.owner_id == annotation.owner_id && follows(object))
        {
            AnnotationOwner::Mover
        } else {
            match context.target.destination() {
                Some(group) if security.is_member(annotation.owner_id, group.id)? => {
                    AnnotationOwner::DestinationMember
                }
                _ => AnnotationOwner::NonMember,
            }
        };

        let case = AnnotationCase {
            sharing,
            source_level: group_level(security, &mut levels, annotation.group_id)?,
            destination_level,
            owner,
            option: context.child_options.get(&annotation.kind).copied(),
            linked_elsewhere,
        };
        let disposition = annotation_disposition(&case);
        debug!(
            "event=annotation_disposition module=engine status=ok annotation_id={} type={} owner={:?} linked_elsewhere={} disposition={:?}",
            id,
            annotation.kind.as_str(),
            owner,
            linked_elsewhere,
            disposition
        );
        decisions.push((annotation, disposition));
    }

    for (annotation, disposition) in decisions {
        entries.insert(
            annotation.id,
            PlannedNode {
                owner_after: annotation.owner_id,
                node: annotation,
                disposition,
                reason: DispositionReason::AnnotationPolicy,
                structural: false,
            },
        );
    }
    Ok(())
}

fn group_level<S: SecurityRepository>(
    security: &S,
    cache: &mut HashMap<GroupId, PermissionLevel>,
    group_id: GroupId,
) -> RepoResult<PermissionLevel> {
    if let Some(level) = cache.get(&group_id) {
        return Ok(*level);
    }
    let group = security.load_group(group_id)?.ok_or(RepoError::NotFound {
        entity: "group",
        id: group_id,
    })?;
    cache.insert(group_id, group.permission_level);
    Ok(group.permission_level)
}

fn apply_owner_overrides(context: &PlanContext, entries: &mut BTreeMap<NodeId, PlannedNode>) {
    if context.owner_overrides.is_empty() {
        return;
    }
    for entry in entries
        .values_mut()
        .filter(|entry| entry.disposition == Disposition::Move)
    {
        if let Some(&to_owner) = context.owner_overrides.get(&entry.node.owner_id) {
            entry.owner_after = to_owner;
        }
    }
}
