//! Object graph repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide structural reads the relocation pipeline needs: node lookup,
//!   composition children/parents, bundle membership, annotation links.
//! - Provide the only mutations the engine performs: group/owner
//!   reassignment, node deletion and link severing.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Link writes must pass `validate_link()` before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Listings are deterministic: `ORDER BY id ASC`.
//! - This repository never opens transactions; callers own the boundary.

use crate::db::migrations::latest_version;
use crate::db::schema::{table_exists, table_has_column, user_version};
use crate::db::DbError;
use crate::model::link::{
    parse_link_kind, validate_link, Bundle, BundleKind, Link, LinkEnds, LinkId, LinkKind,
    LinkValidationError,
};
use crate::model::node::{parse_type_tag, ActorId, GroupId, Node, NodeId, TypeTag};
use rusqlite::{params, Connection, Params, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NODE_SELECT_SQL: &str = "SELECT
    n.id AS id,
    n.type AS type,
    n.group_id AS group_id,
    n.owner_id AS owner_id,
    n.name AS name
FROM nodes n";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for graph and security persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(LinkValidationError),
    NotFound { entity: &'static str, id: i64 },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted graph data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "graph repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "graph repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LinkValidationError> for RepoError {
    fn from(value: LinkValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One annotation link together with the annotation it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationLink {
    pub link: Link,
    pub annotation: Node,
}

/// Repository interface for the persistent object graph.
pub trait GraphRepository {
    /// Creates one node.
    fn create_node(
        &self,
        kind: TypeTag,
        group_id: GroupId,
        owner_id: ActorId,
        name: &str,
    ) -> RepoResult<Node>;
    /// Creates one typed link after shape validation.
    fn create_link(
        &self,
        kind: LinkKind,
        parent_id: NodeId,
        child_id: NodeId,
        owner_id: ActorId,
    ) -> RepoResult<Link>;
    /// Loads one node regardless of visibility.
    fn load_node(&self, id: NodeId) -> RepoResult<Option<Node>>;
    /// Lists direct composition children.
    fn composition_children(&self, id: NodeId) -> RepoResult<Vec<Node>>;
    /// Lists direct composition parents.
    fn composition_parents(&self, id: NodeId) -> RepoResult<Vec<Node>>;
    /// Lists every bundle the node anchors or belongs to.
    fn bundles_of(&self, id: NodeId) -> RepoResult<Vec<Bundle>>;
    /// Lists annotation links from one annotated object.
    fn annotation_links_of(&self, id: NodeId) -> RepoResult<Vec<AnnotationLink>>;
    /// Lists every object annotated by one annotation.
    fn annotated_objects(&self, annotation_id: NodeId) -> RepoResult<Vec<Node>>;
    /// Lists all links whose parent or child is `id`, with end groups.
    fn links_touching(&self, id: NodeId) -> RepoResult<Vec<LinkEnds>>;
    /// Removes one link row.
    fn delete_link(&self, link_id: LinkId) -> RepoResult<()>;
    /// Sets group and owner of one node.
    fn reassign_node(&self, id: NodeId, group_id: GroupId, owner_id: ActorId) -> RepoResult<()>;
    /// Hard-deletes one node; its links cascade.
    fn delete_node(&self, id: NodeId) -> RepoResult<()>;
    /// Number of distinct groups spanned by a bundle anchor and its members.
    fn bundle_group_count(&self, anchor_id: NodeId) -> RepoResult<usize>;
}

/// SQLite-backed graph repository.
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    ///
    /// Accepts a `Transaction` through deref so every pipeline read shares
    /// the caller's transaction boundary.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_graph_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_nodes<P: Params>(&self, sql: &str, params: P) -> RepoResult<Vec<Node>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    fn load_required_node(&self, id: NodeId) -> RepoResult<Node> {
        self.load_node(id)?
            .ok_or(RepoError::NotFound { entity: "node", id })
    }

    fn bundle_members(&self, anchor_id: NodeId) -> RepoResult<Vec<Node>> {
        self.query_nodes(
            &format!(
                "{NODE_SELECT_SQL}
                 INNER JOIN links l ON l.child_id = n.id
                 WHERE l.kind = 'bundle'
                   AND l.parent_id = ?1
                 ORDER BY n.id ASC;"
            ),
            [anchor_id],
        )
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn create_node(
        &self,
        kind: TypeTag,
        group_id: GroupId,
        owner_id: ActorId,
        name: &str,
    ) -> RepoResult<Node> {
        self.conn.execute(
            "INSERT INTO nodes (type, group_id, owner_id, name) VALUES (?1, ?2, ?3, ?4);",
            params![kind.as_str(), group_id, owner_id, name],
        )?;
        Ok(Node {
            id: self.conn.last_insert_rowid(),
            kind,
            group_id,
            owner_id,
            name: name.to_string(),
        })
    }

    fn create_link(
        &self,
        kind: LinkKind,
        parent_id: NodeId,
        child_id: NodeId,
        owner_id: ActorId,
    ) -> RepoResult<Link> {
        let parent = self.load_required_node(parent_id)?;
        let child = self.load_required_node(child_id)?;
        validate_link(kind, &parent, &child)?;

        self.conn.execute(
            "INSERT INTO links (kind, parent_id, child_id, owner_id) VALUES (?1, ?2, ?3, ?4);",
            params![kind.as_str(), parent_id, child_id, owner_id],
        )?;
        Ok(Link {
            id: self.conn.last_insert_rowid(),
            kind,
            parent_id,
            child_id,
            owner_id,
        })
    }

    fn load_node(&self, id: NodeId) -> RepoResult<Option<Node>> {
        let mut nodes = self.query_nodes(&format!("{NODE_SELECT_SQL} WHERE n.id = ?1;"), [id])?;
        Ok(nodes.pop())
    }

    fn composition_children(&self, id: NodeId) -> RepoResult<Vec<Node>> {
        self.query_nodes(
            &format!(
                "{NODE_SELECT_SQL}
                 INNER JOIN links l ON l.child_id = n.id
                 WHERE l.kind = 'composition'
                   AND l.parent_id = ?1
                 ORDER BY n.id ASC;"
            ),
            [id],
        )
    }

    fn composition_parents(&self, id: NodeId) -> RepoResult<Vec<Node>> {
        self.query_nodes(
            &format!(
                "{NODE_SELECT_SQL}
                 INNER JOIN links l ON l.parent_id = n.id
                 WHERE l.kind = 'composition'
                   AND l.child_id = ?1
                 ORDER BY n.id ASC;"
            ),
            [id],
        )
    }

    fn bundles_of(&self, id: NodeId) -> RepoResult<Vec<Bundle>> {
        let node = self.load_required_node(id)?;
        let mut anchors = Vec::new();
        if BundleKind::anchored_by(node.kind).is_some() {
            anchors.push(node);
        }
        anchors.extend(self.query_nodes(
            &format!(
                "{NODE_SELECT_SQL}
                 INNER JOIN links l ON l.parent_id = n.id
                 WHERE l.kind = 'bundle'
                   AND l.child_id = ?1
                 ORDER BY n.id ASC;"
            ),
            [id],
        )?);

        let mut bundles = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            let kind = BundleKind::anchored_by(anchor.kind).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "node {} of type {} is used as a bundle anchor",
                    anchor.id,
                    anchor.kind.as_str()
                ))
            })?;
            let members = self.bundle_members(anchor.id)?;
            bundles.push(Bundle {
                kind,
                anchor,
                members,
            });
        }
        Ok(bundles)
    }

    fn annotation_links_of(&self, id: NodeId) -> RepoResult<Vec<AnnotationLink>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                l.id AS link_id,
                l.kind AS link_kind,
                l.parent_id AS parent_id,
                l.child_id AS child_id,
                l.owner_id AS link_owner_id,
                n.id AS id,
                n.type AS type,
                n.group_id AS group_id,
                n.owner_id AS owner_id,
                n.name AS name
             FROM links l
             INNER JOIN nodes n ON n.id = l.child_id
             WHERE l.kind = 'annotation'
               AND l.parent_id = ?1
             ORDER BY l.id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(AnnotationLink {
                link: parse_link_row(row, "link_id", "link_kind", "link_owner_id")?,
                annotation: parse_node_row(row)?,
            });
        }
        Ok(links)
    }

    fn annotated_objects(&self, annotation_id: NodeId) -> RepoResult<Vec<Node>> {
        self.query_nodes(
            &format!(
                "{NODE_SELECT_SQL}
                 INNER JOIN links l ON l.parent_id = n.id
                 WHERE l.kind = 'annotation'
                   AND l.child_id = ?1
                 ORDER BY n.id ASC;"
            ),
            [annotation_id],
        )
    }

    fn links_touching(&self, id: NodeId) -> RepoResult<Vec<LinkEnds>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                l.id AS id,
                l.kind AS kind,
                l.parent_id AS parent_id,
                l.child_id AS child_id,
                l.owner_id AS owner_id,
                p.group_id AS parent_group_id,
                c.group_id AS child_group_id
             FROM links l
             INNER JOIN nodes p ON p.id = l.parent_id
             INNER JOIN nodes c ON c.id = l.child_id
             WHERE l.parent_id = ?1
                OR l.child_id = ?1
             ORDER BY l.id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(LinkEnds {
                link: parse_link_row(row, "id", "kind", "owner_id")?,
                parent_group_id: row.get("parent_group_id")?,
                child_group_id: row.get("child_group_id")?,
            });
        }
        Ok(links)
    }

    fn delete_link(&self, link_id: LinkId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM links WHERE id = ?1;", [link_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "link",
                id: link_id,
            });
        }
        Ok(())
    }

    fn reassign_node(&self, id: NodeId, group_id: GroupId, owner_id: ActorId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE nodes
             SET group_id = ?2,
                 owner_id = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, group_id, owner_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "node", id });
        }
        Ok(())
    }

    fn delete_node(&self, id: NodeId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM nodes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "node", id });
        }
        Ok(())
    }

    fn bundle_group_count(&self, anchor_id: NodeId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT group_id)
             FROM (
                SELECT group_id FROM nodes WHERE id = ?1
                UNION ALL
                SELECT n.group_id
                FROM links l
                INNER JOIN nodes n ON n.id = l.child_id
                WHERE l.kind = 'bundle'
                  AND l.parent_id = ?1
             );",
            [anchor_id],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative group count {count}")))
    }
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<Node> {
    let type_text: String = row.get("type")?;
    let kind = parse_type_tag(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid node type `{type_text}` in nodes.type"))
    })?;

    Ok(Node {
        id: row.get("id")?,
        kind,
        group_id: row.get("group_id")?,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
    })
}

fn parse_link_row(
    row: &Row<'_>,
    id_column: &str,
    kind_column: &str,
    owner_column: &str,
) -> RepoResult<Link> {
    let kind_text: String = row.get(kind_column)?;
    let kind = parse_link_kind(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid link kind `{kind_text}` in links.kind"))
    })?;

    Ok(Link {
        id: row.get(id_column)?,
        kind,
        parent_id: row.get("parent_id")?,
        child_id: row.get("child_id")?,
        owner_id: row.get(owner_column)?,
    })
}

/// Verifies schema version and required graph tables/columns.
pub(crate) fn ensure_graph_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        ("nodes", &["id", "type", "group_id", "owner_id", "name"]),
        (
            "links",
            &["id", "kind", "parent_id", "child_id", "owner_id"],
        ),
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
