//! Security partition model: groups, actors and roles.
//!
//! # Invariants
//! - `PermissionLevel` ordering is monotonic in visibility to other members.
//! - `Role` ordering is monotonic in authority.

use crate::model::node::{ActorId, GroupId};
use serde::{Deserialize, Serialize};

/// Group permission level, from least to most collaborative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Members see only their own objects.
    Private,
    /// Members read each other's objects.
    ReadOnly,
    /// Members read and annotate each other's objects.
    ReadAnnotate,
    /// Members read and edit each other's objects.
    ReadWrite,
}

impl PermissionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::ReadOnly => "read_only",
            Self::ReadAnnotate => "read_annotate",
            Self::ReadWrite => "read_write",
        }
    }
}

pub fn parse_permission_level(value: &str) -> Option<PermissionLevel> {
    match value {
        "private" => Some(PermissionLevel::Private),
        "read_only" => Some(PermissionLevel::ReadOnly),
        "read_annotate" => Some(PermissionLevel::ReadAnnotate),
        "read_write" => Some(PermissionLevel::ReadWrite),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub permission_level: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    /// System administrator; holds `Role::Administrator` in every group.
    pub is_admin: bool,
}

/// Role an actor holds with respect to one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    GroupOwner,
    Administrator,
}
