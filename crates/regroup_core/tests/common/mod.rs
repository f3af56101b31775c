#![allow(dead_code)]

use regroup_core::db::open_db_in_memory;
use regroup_core::{
    ActorId, EngineConfig, GraphRepository, GroupId, LinkKind, NodeId, PermissionLevel,
    RelocationService, SecurityRepository, SqliteGraphRepository, SqliteSecurityRepository,
    TypeTag,
};
use rusqlite::{Connection, OptionalExtension};

/// In-memory database with helpers for building object graphs.
pub struct Fixture {
    pub conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            conn: open_db_in_memory().unwrap(),
        }
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn graph(&self) -> SqliteGraphRepository<'_> {
        SqliteGraphRepository::try_new(&self.conn).unwrap()
    }

    pub fn security(&self) -> SqliteSecurityRepository<'_> {
        SqliteSecurityRepository::try_new(&self.conn).unwrap()
    }

    pub fn service(&mut self) -> RelocationService<'_> {
        RelocationService::new(&mut self.conn, EngineConfig::default())
    }

    pub fn service_with(&mut self, config: EngineConfig) -> RelocationService<'_> {
        RelocationService::new(&mut self.conn, config)
    }

    pub fn group(&self, name: &str, level: PermissionLevel) -> GroupId {
        self.security().create_group(name, level).unwrap().id
    }

    pub fn actor(&self, name: &str) -> ActorId {
        self.security().create_actor(name, false).unwrap().id
    }

    pub fn admin(&self, name: &str) -> ActorId {
        self.security().create_actor(name, true).unwrap().id
    }

    pub fn member(&self, group_id: GroupId, actor_id: ActorId) {
        self.security().add_member(group_id, actor_id, false).unwrap();
    }

    pub fn group_owner(&self, group_id: GroupId, actor_id: ActorId) {
        self.security().add_member(group_id, actor_id, true).unwrap();
    }

    pub fn node(&self, kind: TypeTag, group_id: GroupId, owner_id: ActorId) -> NodeId {
        self.graph()
            .create_node(kind, group_id, owner_id, kind.as_str())
            .unwrap()
            .id
    }

    /// Creates a node in the parent's group and links it under the parent.
    pub fn child(&self, parent_id: NodeId, kind: TypeTag, owner_id: ActorId) -> NodeId {
        let parent = self.graph().load_node(parent_id).unwrap().unwrap();
        let id = self.node(kind, parent.group_id, owner_id);
        self.compose(parent_id, id);
        id
    }

    pub fn compose(&self, parent_id: NodeId, child_id: NodeId) {
        self.link(LinkKind::Composition, parent_id, child_id);
    }

    pub fn bundle(&self, anchor_id: NodeId, member_id: NodeId) {
        self.link(LinkKind::Bundle, anchor_id, member_id);
    }

    pub fn annotate(&self, object_id: NodeId, annotation_id: NodeId) {
        self.link(LinkKind::Annotation, object_id, annotation_id);
    }

    fn link(&self, kind: LinkKind, parent_id: NodeId, child_id: NodeId) {
        let parent = self.graph().load_node(parent_id).unwrap().unwrap();
        self.graph()
            .create_link(kind, parent_id, child_id, parent.owner_id)
            .unwrap();
    }

    pub fn group_of(&self, id: NodeId) -> Option<GroupId> {
        self.conn
            .query_row("SELECT group_id FROM nodes WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .optional()
            .unwrap()
    }

    pub fn owner_of(&self, id: NodeId) -> Option<ActorId> {
        self.conn
            .query_row("SELECT owner_id FROM nodes WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .optional()
            .unwrap()
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.group_of(id).is_some()
    }

    pub fn linked(&self, kind: LinkKind, parent_id: NodeId, child_id: NodeId) -> bool {
        let exists: i64 = self
            .conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM links
                    WHERE kind = ?1 AND parent_id = ?2 AND child_id = ?3
                );",
                rusqlite::params![kind.as_str(), parent_id, child_id],
                |row| row.get(0),
            )
            .unwrap();
        exists == 1
    }

    pub fn node_count(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM nodes;", [], |row| row.get(0))
            .unwrap()
    }

    pub fn link_count(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM links;", [], |row| row.get(0))
            .unwrap()
    }

    /// `(id, group_id, owner_id)` for every node, ordered by id.
    pub fn node_rows(&self) -> Vec<(i64, i64, i64)> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, group_id, owner_id FROM nodes ORDER BY id;")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap();
        rows.map(Result::unwrap).collect()
    }
}

/// Two read-annotate groups and one user who belongs to both.
pub struct TwoGroups {
    pub fx: Fixture,
    pub source: GroupId,
    pub destination: GroupId,
    pub user: ActorId,
}

impl TwoGroups {
    pub fn new() -> Self {
        Self::with_levels(PermissionLevel::ReadAnnotate, PermissionLevel::ReadAnnotate)
    }

    pub fn with_levels(source_level: PermissionLevel, destination_level: PermissionLevel) -> Self {
        let fx = Fixture::new();
        let source = fx.group("source", source_level);
        let destination = fx.group("destination", destination_level);
        let user = fx.actor("user");
        fx.member(source, user);
        fx.member(destination, user);
        Self {
            fx,
            source,
            destination,
            user,
        }
    }
}
