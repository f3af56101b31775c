//! Request outcome reporting.
//!
//! # Responsibility
//! - Summarize what a committed (or dry-run) request changed, grouped by
//!   node type.
//! - Shape failures into a stable, serializable response.

use crate::engine::disposition::RelocationPlan;
use crate::engine::error::{ErrorKind, RelocationError};
use crate::engine::executor::ExecutionOutcome;
use crate::engine::policy::Disposition;
use crate::engine::OperationKind;
use crate::model::link::{Link, LinkKind};
use crate::model::node::{ActorId, GroupId, NodeId, TypeTag};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Link removed because its ends ended up in different groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlinkedLink {
    pub link_id: i64,
    pub kind: LinkKind,
    pub parent_id: NodeId,
    pub child_id: NodeId,
}

impl From<&Link> for UnlinkedLink {
    fn from(link: &Link) -> Self {
        Self {
            link_id: link.id,
            kind: link.kind,
            parent_id: link.parent_id,
            child_id: link.child_id,
        }
    }
}

/// Successful outcome of one move or delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationReport {
    pub request_id: Uuid,
    pub operation: OperationKind,
    /// True when every change was rolled back after planning.
    pub dry_run: bool,
    pub root_ids: Vec<NodeId>,
    pub destination_group_id: Option<GroupId>,
    pub moved: BTreeMap<TypeTag, Vec<NodeId>>,
    pub deleted: BTreeMap<TypeTag, Vec<NodeId>>,
    pub left: BTreeMap<TypeTag, Vec<NodeId>>,
    pub unlinked: Vec<UnlinkedLink>,
    pub reowned: BTreeMap<NodeId, ActorId>,
}

impl RelocationReport {
    pub fn new(
        request_id: Uuid,
        dry_run: bool,
        plan: &RelocationPlan,
        outcome: &ExecutionOutcome,
    ) -> Self {
        Self {
            request_id,
            operation: plan.target().operation(),
            dry_run,
            root_ids: plan.root_ids.clone(),
            destination_group_id: plan.target().destination_id(),
            moved: group_by_type(plan, outcome.moved.iter().copied()),
            deleted: group_by_type(plan, outcome.deleted.iter().copied()),
            left: group_by_type(
                plan,
                plan.entries_with(Disposition::Leave).map(|entry| entry.node.id),
            ),
            unlinked: outcome.unlinked.iter().map(UnlinkedLink::from).collect(),
            reowned: outcome.reowned.clone(),
        }
    }

    pub fn moved_count(&self) -> usize {
        self.moved.values().map(Vec::len).sum()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.values().map(Vec::len).sum()
    }

    pub fn was_moved(&self, id: NodeId) -> bool {
        self.moved.values().any(|ids| ids.contains(&id))
    }

    pub fn was_deleted(&self, id: NodeId) -> bool {
        self.deleted.values().any(|ids| ids.contains(&id))
    }

    pub fn was_left(&self, id: NodeId) -> bool {
        self.left.values().any(|ids| ids.contains(&id))
    }
}

fn group_by_type(
    plan: &RelocationPlan,
    ids: impl IntoIterator<Item = NodeId>,
) -> BTreeMap<TypeTag, Vec<NodeId>> {
    let mut grouped: BTreeMap<TypeTag, Vec<NodeId>> = BTreeMap::new();
    for id in ids {
        if let Some(entry) = plan.entries.get(&id) {
            grouped.entry(entry.node.kind).or_default().push(id);
        }
    }
    for ids in grouped.values_mut() {
        ids.sort_unstable();
    }
    grouped
}

/// Wire shape of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
    /// Offending node ids, when the failure names any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_ids: Vec<NodeId>,
}

impl From<&RelocationError> for ErrorResponse {
    fn from(err: &RelocationError) -> Self {
        let node_ids = match err {
            RelocationError::NotFound { ids } => ids.clone(),
            RelocationError::ConstraintViolation {
                anchor_id,
                member_ids,
                ..
            } => std::iter::once(*anchor_id)
                .chain(member_ids.iter().copied())
                .collect(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind(),
            code: err.code(),
            message: err.to_string(),
            node_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorResponse;
    use crate::engine::error::RelocationError;
    use crate::model::link::BundleKind;

    #[test]
    fn constraint_violation_response_lists_anchor_then_members() {
        let err = RelocationError::ConstraintViolation {
            bundle: BundleKind::Fileset,
            anchor_id: 9,
            member_ids: vec![12],
        };
        let response = ErrorResponse::from(&err);
        assert_eq!(response.node_ids, vec![9, 12]);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "constraint_violation");
        assert_eq!(json["code"], "constraint_violation");
    }

    #[test]
    fn responses_without_ids_omit_the_field() {
        let response = ErrorResponse::from(&RelocationError::Cancelled);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], "cancelled");
        assert!(json.get("node_ids").is_none());
    }
}
