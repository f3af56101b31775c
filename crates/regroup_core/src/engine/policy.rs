//! Disposition policy tables.
//!
//! # Responsibility
//! - Decide MOVE / LEAVE / DELETE for one node from already-computed facts.
//! - Keep every rule a pure function so it can be corrected row by row.
//!
//! # Invariants
//! - Same inputs always yield the same disposition.
//! - An explicit `Exclude` child option always wins.
//! - A node linked from a composition parent that stays is left unless
//!   `Include` names its type; bundle membership never overrides this.
//! - An annotation still linked from an object that stays is never moved or
//!   deleted.

use crate::model::group::PermissionLevel;
use crate::model::node::AnnotationSharing;
use crate::model::request::IncludePolicy;
use serde::{Deserialize, Serialize};

/// Decided fate of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Move,
    Leave,
    Delete,
}

/// Why a disposition was chosen; carried in plans for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionReason {
    Root,
    Unshared,
    SharedExternally,
    ChildOption,
    Bundle,
    RenderingSettings,
    AnnotationPolicy,
}

/// Composition parent facts for one non-root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentState {
    /// At least one parent stays: outside the closure or decided LEAVE.
    pub held_outside: bool,
    /// At least one parent follows the roots.
    pub held_by_following: bool,
}

/// Structural rule for composition-reached nodes.
///
/// `follow` is the root disposition: `Move` for relocation, `Delete` for
/// graph deletion. `Include` lifts the sharing test only for a node that a
/// following parent already holds; it never pulls a node away from parents
/// that all stay.
pub fn structural_disposition(
    follow: Disposition,
    parents: ParentState,
    option: Option<IncludePolicy>,
) -> (Disposition, DispositionReason) {
    match option {
        Some(IncludePolicy::Exclude) => (Disposition::Leave, DispositionReason::ChildOption),
        Some(IncludePolicy::Include) if parents.held_by_following => {
            (follow, DispositionReason::ChildOption)
        }
        Some(IncludePolicy::Include) => (Disposition::Leave, DispositionReason::SharedExternally),
        None if parents.held_outside => (Disposition::Leave, DispositionReason::SharedExternally),
        None => (follow, DispositionReason::Unshared),
    }
}

/// Per-user rendering settings never survive a group change with their pixels.
pub fn rendering_settings_disposition(parents: ParentState) -> Disposition {
    if parents.held_by_following {
        Disposition::Delete
    } else {
        Disposition::Leave
    }
}

/// Relation of an annotation's owner to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationOwner {
    /// The actor, or the owner of an annotated object that follows.
    Mover,
    /// Someone else who is a member of the destination group.
    DestinationMember,
    /// Someone else who is not a member of the destination group.
    NonMember,
}

/// Every input of the annotation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationCase {
    pub sharing: AnnotationSharing,
    pub source_level: PermissionLevel,
    /// `None` when the operation deletes instead of moving.
    pub destination_level: Option<PermissionLevel>,
    pub owner: AnnotationOwner,
    pub option: Option<IncludePolicy>,
    /// Also linked from at least one object that does not follow the roots.
    pub linked_elsewhere: bool,
}

/// Annotation decision table.
pub fn annotation_disposition(case: &AnnotationCase) -> Disposition {
    if case.option == Some(IncludePolicy::Exclude) || case.linked_elsewhere {
        return Disposition::Leave;
    }

    let Some(destination_level) = case.destination_level else {
        return match (case.sharing, case.option) {
            (AnnotationSharing::Sharable, Some(IncludePolicy::Include)) => Disposition::Delete,
            (AnnotationSharing::Sharable, _) => Disposition::Leave,
            (AnnotationSharing::NonSharable, _) => Disposition::Delete,
        };
    };

    match case.sharing {
        AnnotationSharing::Sharable => match case.option {
            Some(IncludePolicy::Include) => Disposition::Move,
            _ => Disposition::Leave,
        },
        AnnotationSharing::NonSharable => non_sharable_on_move(
            case.owner,
            case.source_level,
            destination_level,
            case.option,
        ),
    }
}

fn non_sharable_on_move(
    owner: AnnotationOwner,
    source_level: PermissionLevel,
    destination_level: PermissionLevel,
    option: Option<IncludePolicy>,
) -> Disposition {
    use AnnotationOwner::{DestinationMember, Mover, NonMember};
    use PermissionLevel::{Private, ReadWrite};

    match (owner, destination_level, source_level, option) {
        (Mover, _, _, _) => Disposition::Move,
        (NonMember, _, _, _) => Disposition::Delete,
        // Others cannot annotate the mover's objects inside a private group.
        (DestinationMember, Private, _, _) => Disposition::Delete,
        // Collaborative-group annotations are not portable by default.
        (DestinationMember, _, ReadWrite, Some(IncludePolicy::Include)) => Disposition::Move,
        (DestinationMember, _, ReadWrite, _) => Disposition::Delete,
        (DestinationMember, _, _, _) => Disposition::Move,
    }
}
