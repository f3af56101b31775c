//! Core engine for relocating object graphs between security groups.
//! This crate is the single source of truth for graph and permission invariants.

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use engine::policy::Disposition;
pub use engine::report::UnlinkedLink;
pub use engine::{
    CancelToken, ErrorKind, ErrorResponse, OperationKind, RelocationError, RelocationReport,
    RelocationResult,
};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::group::{Actor, Group, PermissionLevel, Role};
pub use model::link::{Bundle, BundleKind, Link, LinkKind};
pub use model::node::{ActorId, GroupId, Node, NodeId, TypeTag};
pub use model::request::{
    ChildOption, DeleteRequest, GroupContext, IncludePolicy, MoveRequest, OwnerOverride,
    SessionContext,
};
pub use repo::graph_repo::{GraphRepository, RepoError, RepoResult, SqliteGraphRepository};
pub use repo::security_repo::{SecurityRepository, SqliteSecurityRepository};
pub use service::relocation_service::RelocationService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
