//! Relocation pipeline stages.
//!
//! # Responsibility
//! - Compute the closure of a request, validate bundles, decide a
//!   disposition for every node, then apply the plan.
//! - Stay storage-agnostic: every stage talks to repository traits.
//!
//! # Invariants
//! - Stages run in order: closure, bundles, dispositions, execution.
//! - Nothing here opens or commits transactions.

pub mod bundle;
pub mod cancel;
pub mod closure;
pub mod disposition;
pub mod error;
pub mod executor;
pub mod policy;
pub mod report;
pub mod snapshot;

use crate::model::group::Group;
use crate::model::node::GroupId;
use policy::Disposition;
use serde::{Deserialize, Serialize};

pub use cancel::CancelToken;
pub use error::{ErrorKind, RelocationError, RelocationResult};
pub use report::{ErrorResponse, RelocationReport};

/// Which public operation a pipeline run serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Move,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Delete => "delete",
        }
    }
}

/// Where followed nodes end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Move { destination: Group },
    Delete,
}

impl Target {
    /// Disposition of roots and of every node that follows them.
    pub fn follow(&self) -> Disposition {
        match self {
            Self::Move { .. } => Disposition::Move,
            Self::Delete => Disposition::Delete,
        }
    }

    pub fn destination(&self) -> Option<&Group> {
        match self {
            Self::Move { destination } => Some(destination),
            Self::Delete => None,
        }
    }

    pub fn destination_id(&self) -> Option<GroupId> {
        self.destination().map(|group| group.id)
    }

    pub fn operation(&self) -> OperationKind {
        match self {
            Self::Move { .. } => OperationKind::Move,
            Self::Delete => OperationKind::Delete,
        }
    }
}
