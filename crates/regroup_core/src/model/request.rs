//! Inbound command and session models.
//!
//! # Responsibility
//! - Define move/delete request envelopes and their per-type child options.
//! - Validate request shape before any storage access.
//!
//! # Invariants
//! - A request names at least one root id.
//! - Child options are unambiguous: one policy per type.
//! - Owner overrides are unambiguous: one target per source owner.

use crate::model::node::{ActorId, GroupId, NodeId, TypeTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Explicit per-type override of the default sharing heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludePolicy {
    /// Instances of the type follow the roots even when shared.
    Include,
    /// Instances of the type stay behind even when unshared.
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildOption {
    #[serde(rename = "type")]
    pub kind: TypeTag,
    pub policy: IncludePolicy,
}

/// Reassigns every moved object owned by `from_owner` to `to_owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerOverride {
    pub from_owner: ActorId,
    pub to_owner: ActorId,
}

/// Relocate a graph to another group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub root_type: TypeTag,
    pub root_ids: Vec<NodeId>,
    pub destination_group_id: GroupId,
    #[serde(default)]
    pub child_options: Vec<ChildOption>,
    #[serde(default)]
    pub owner_overrides: Vec<OwnerOverride>,
    #[serde(default)]
    pub dry_run: bool,
}

impl MoveRequest {
    pub fn new(root_type: TypeTag, root_ids: Vec<NodeId>, destination_group_id: GroupId) -> Self {
        Self {
            root_type,
            root_ids,
            destination_group_id,
            child_options: Vec::new(),
            owner_overrides: Vec::new(),
            dry_run: false,
        }
    }

    pub fn with_child_option(mut self, kind: TypeTag, policy: IncludePolicy) -> Self {
        self.child_options.push(ChildOption { kind, policy });
        self
    }

    pub fn with_owner_override(mut self, from_owner: ActorId, to_owner: ActorId) -> Self {
        self.owner_overrides.push(OwnerOverride {
            from_owner,
            to_owner,
        });
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Delete a graph, with the same closure and bundle rules as a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub root_type: TypeTag,
    pub root_ids: Vec<NodeId>,
    #[serde(default)]
    pub child_options: Vec<ChildOption>,
    #[serde(default)]
    pub dry_run: bool,
}

impl DeleteRequest {
    pub fn new(root_type: TypeTag, root_ids: Vec<NodeId>) -> Self {
        Self {
            root_type,
            root_ids,
            child_options: Vec::new(),
            dry_run: false,
        }
    }

    pub fn with_child_option(mut self, kind: TypeTag, policy: IncludePolicy) -> Self {
        self.child_options.push(ChildOption { kind, policy });
        self
    }
}

/// Group scope the session reads under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupContext {
    Group(GroupId),
    /// Every group the actor can read.
    All,
}

/// Explicit per-call session context; the engine keeps no session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub actor_id: ActorId,
    pub group_context: GroupContext,
}

impl SessionContext {
    pub fn in_group(actor_id: ActorId, group_id: GroupId) -> Self {
        Self {
            actor_id,
            group_context: GroupContext::Group(group_id),
        }
    }

    pub fn all_groups(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            group_context: GroupContext::All,
        }
    }
}

/// Request shape errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    EmptyRoots,
    ConflictingChildOption(TypeTag),
    ConflictingOwnerOverride(ActorId),
}

impl Display for RequestValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRoots => write!(f, "request must name at least one root id"),
            Self::ConflictingChildOption(kind) => {
                write!(f, "conflicting child options for type {}", kind.as_str())
            }
            Self::ConflictingOwnerOverride(owner) => {
                write!(f, "conflicting owner overrides for owner {owner}")
            }
        }
    }
}

impl Error for RequestValidationError {}

/// Normalized child options keyed by type.
pub type ChildOptionMap = BTreeMap<TypeTag, IncludePolicy>;

/// Deduplicates child options; repeated identical options are accepted.
pub fn child_option_map(options: &[ChildOption]) -> Result<ChildOptionMap, RequestValidationError> {
    let mut map = ChildOptionMap::new();
    for option in options {
        match map.insert(option.kind, option.policy) {
            Some(previous) if previous != option.policy => {
                return Err(RequestValidationError::ConflictingChildOption(option.kind));
            }
            _ => {}
        }
    }
    Ok(map)
}

/// Normalizes owner overrides into `from -> to`.
pub fn owner_override_map(
    overrides: &[OwnerOverride],
) -> Result<BTreeMap<ActorId, ActorId>, RequestValidationError> {
    let mut map = BTreeMap::new();
    for item in overrides {
        match map.insert(item.from_owner, item.to_owner) {
            Some(previous) if previous != item.to_owner => {
                return Err(RequestValidationError::ConflictingOwnerOverride(
                    item.from_owner,
                ));
            }
            _ => {}
        }
    }
    Ok(map)
}

/// Sorted, deduplicated root ids.
pub fn normalize_root_ids(root_ids: &[NodeId]) -> Result<Vec<NodeId>, RequestValidationError> {
    let mut ids = root_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Err(RequestValidationError::EmptyRoots);
    }
    Ok(ids)
}
