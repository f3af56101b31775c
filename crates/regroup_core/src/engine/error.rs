//! Relocation error surface.
//!
//! # Responsibility
//! - Name every way a move or delete request can fail.
//! - Map each failure to a stable kind and wire code for callers.
//!
//! # Invariants
//! - Any error returned by the pipeline means nothing was committed.

use crate::model::link::BundleKind;
use crate::model::node::{ActorId, GroupId, NodeId};
use crate::model::request::RequestValidationError;
use crate::repo::graph_repo::RepoError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RelocationResult<T> = Result<T, RelocationError>;

/// Coarse failure categories exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    PermissionDenied,
    TooLarge,
    InvalidRequest,
    Cancelled,
    StorageFailure,
}

/// Failure of one relocation or graph-delete request.
#[derive(Debug)]
pub enum RelocationError {
    /// Roots that do not exist, have another type, or are not visible.
    NotFound { ids: Vec<NodeId> },
    UnknownGroup(GroupId),
    UnknownActor(ActorId),
    /// A bundle would end up split across groups.
    ConstraintViolation {
        bundle: BundleKind,
        anchor_id: NodeId,
        member_ids: Vec<NodeId>,
    },
    PermissionDenied { reason: String },
    TooLarge { limit: usize },
    InvalidRequest(RequestValidationError),
    Cancelled,
    StorageFailure(RepoError),
}

impl RelocationError {
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::UnknownGroup(_) => ErrorKind::NotFound,
            Self::UnknownActor(_) | Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Stable snake_case code for logs and wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::UnknownGroup(_) => "unknown_group",
            Self::UnknownActor(_) => "unknown_actor",
            Self::ConstraintViolation { .. } => "constraint_violation",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::TooLarge { .. } => "too_large",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Cancelled => "cancelled",
            Self::StorageFailure(_) => "storage_failure",
        }
    }
}

impl Display for RelocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { ids } => write!(f, "root objects not found: {ids:?}"),
            Self::UnknownGroup(id) => write!(f, "group not found: {id}"),
            Self::UnknownActor(id) => write!(f, "actor not found: {id}"),
            Self::ConstraintViolation {
                bundle,
                anchor_id,
                member_ids,
            } => write!(
                f,
                "{} {anchor_id} would be split; members not included: {member_ids:?}",
                bundle.as_str()
            ),
            Self::PermissionDenied { reason } => write!(f, "permission denied: {reason}"),
            Self::TooLarge { limit } => {
                write!(f, "closure exceeds the configured limit of {limit} nodes")
            }
            Self::InvalidRequest(err) => write!(f, "invalid request: {err}"),
            Self::Cancelled => write!(f, "request cancelled"),
            Self::StorageFailure(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for RelocationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRequest(err) => Some(err),
            Self::StorageFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RelocationError {
    fn from(value: RepoError) -> Self {
        Self::StorageFailure(value)
    }
}

impl From<rusqlite::Error> for RelocationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageFailure(RepoError::from(value))
    }
}

impl From<RequestValidationError> for RelocationError {
    fn from(value: RequestValidationError) -> Self {
        Self::InvalidRequest(value)
    }
}
