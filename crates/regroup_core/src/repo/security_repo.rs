//! Security/session repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist groups, actors and group memberships.
//! - Answer the membership/role/access questions the relocation engine asks.
//!
//! # Invariants
//! - Administrators hold `Role::Administrator` in every group, member or not.
//! - A group owner is always also a member of that group.
//! - Write access is owner-based for plain members at every permission level.

use crate::db::migrations::latest_version;
use crate::db::schema::{table_exists, table_has_column, user_version};
use crate::model::group::{parse_permission_level, Actor, Group, PermissionLevel, Role};
use crate::model::node::{ActorId, GroupId, Node};
use crate::repo::graph_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Repository interface for the security partition.
pub trait SecurityRepository {
    fn create_group(&self, name: &str, level: PermissionLevel) -> RepoResult<Group>;
    fn create_actor(&self, name: &str, is_admin: bool) -> RepoResult<Actor>;
    /// Adds or updates one membership row.
    fn add_member(&self, group_id: GroupId, actor_id: ActorId, is_owner: bool) -> RepoResult<()>;
    fn load_group(&self, id: GroupId) -> RepoResult<Option<Group>>;
    fn load_actor(&self, id: ActorId) -> RepoResult<Option<Actor>>;
    fn is_member(&self, actor_id: ActorId, group_id: GroupId) -> RepoResult<bool>;
    /// Role of the actor in the group, `None` for outsiders.
    fn role_of(&self, actor_id: ActorId, group_id: GroupId) -> RepoResult<Option<Role>>;
    /// Whether the actor may relocate or delete this node.
    fn has_write_access(&self, actor_id: ActorId, node: &Node) -> RepoResult<bool> {
        let role = self.role_of(actor_id, node.group_id)?;
        Ok(write_allowed(role, actor_id, node))
    }
    /// Whether the actor may see this node at all, ignoring group context.
    fn has_read_access(&self, actor_id: ActorId, node: &Node) -> RepoResult<bool> {
        let role = self.role_of(actor_id, node.group_id)?;
        let Some(group) = self.load_group(node.group_id)? else {
            return Ok(false);
        };
        Ok(read_allowed(role, group.permission_level, actor_id, node))
    }
}

/// Write rule shared by every security backend.
pub fn write_allowed(role: Option<Role>, actor_id: ActorId, node: &Node) -> bool {
    match role {
        Some(Role::Administrator) | Some(Role::GroupOwner) => true,
        Some(Role::Member) => node.owner_id == actor_id,
        None => false,
    }
}

/// Read rule shared by every security backend.
pub fn read_allowed(
    role: Option<Role>,
    level: PermissionLevel,
    actor_id: ActorId,
    node: &Node,
) -> bool {
    match role {
        Some(Role::Administrator) | Some(Role::GroupOwner) => true,
        Some(Role::Member) => level != PermissionLevel::Private || node.owner_id == actor_id,
        None => false,
    }
}

/// SQLite-backed security repository.
pub struct SqliteSecurityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSecurityRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_security_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SecurityRepository for SqliteSecurityRepository<'_> {
    fn create_group(&self, name: &str, level: PermissionLevel) -> RepoResult<Group> {
        self.conn.execute(
            "INSERT INTO groups (name, permission_level) VALUES (?1, ?2);",
            params![name, level.as_str()],
        )?;
        Ok(Group {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            permission_level: level,
        })
    }

    fn create_actor(&self, name: &str, is_admin: bool) -> RepoResult<Actor> {
        self.conn.execute(
            "INSERT INTO actors (name, is_admin) VALUES (?1, ?2);",
            params![name, i64::from(is_admin)],
        )?;
        Ok(Actor {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            is_admin,
        })
    }

    fn add_member(&self, group_id: GroupId, actor_id: ActorId, is_owner: bool) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO group_members (group_id, actor_id, is_owner)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (group_id, actor_id) DO UPDATE SET is_owner = excluded.is_owner;",
            params![group_id, actor_id, i64::from(is_owner)],
        )?;
        Ok(())
    }

    fn load_group(&self, id: GroupId) -> RepoResult<Option<Group>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT name, permission_level FROM groups WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((name, level_text)) = row else {
            return Ok(None);
        };
        let permission_level = parse_permission_level(&level_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid permission level `{level_text}` in groups.permission_level"
            ))
        })?;
        Ok(Some(Group {
            id,
            name,
            permission_level,
        }))
    }

    fn load_actor(&self, id: ActorId) -> RepoResult<Option<Actor>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT name, is_admin FROM actors WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((name, is_admin)) = row else {
            return Ok(None);
        };
        Ok(Some(Actor {
            id,
            name,
            is_admin: parse_flag(is_admin, "actors.is_admin")?,
        }))
    }

    fn is_member(&self, actor_id: ActorId, group_id: GroupId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM group_members
                WHERE group_id = ?1
                  AND actor_id = ?2
            );",
            params![group_id, actor_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn role_of(&self, actor_id: ActorId, group_id: GroupId) -> RepoResult<Option<Role>> {
        let Some(actor) = self.load_actor(actor_id)? else {
            return Ok(None);
        };
        if actor.is_admin {
            return Ok(Some(Role::Administrator));
        }

        let is_owner: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_owner
                 FROM group_members
                 WHERE group_id = ?1
                   AND actor_id = ?2;",
                params![group_id, actor_id],
                |row| row.get(0),
            )
            .optional()?;

        match is_owner {
            None => Ok(None),
            Some(flag) if parse_flag(flag, "group_members.is_owner")? => Ok(Some(Role::GroupOwner)),
            Some(_) => Ok(Some(Role::Member)),
        }
    }
}

fn parse_flag(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn ensure_security_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 3] = [
        ("groups", &["id", "name", "permission_level"]),
        ("actors", &["id", "name", "is_admin"]),
        ("group_members", &["group_id", "actor_id", "is_owner"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}
