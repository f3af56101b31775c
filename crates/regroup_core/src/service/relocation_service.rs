//! Relocation use-case service.
//!
//! # Responsibility
//! - Run move and graph-delete requests end to end inside one
//!   `BEGIN IMMEDIATE` transaction.
//! - Log every request state transition with a per-request id.
//! - Provide visibility-checked node read-back.
//!
//! # Invariants
//! - A request either commits every mutation or none.
//! - Dry runs execute the full pipeline and always roll back.
//! - Concurrent requests on the same database serialize on the write lock.

use crate::config::EngineConfig;
use crate::engine::bundle::validate_bundles;
use crate::engine::closure::{build_closure, is_visible};
use crate::engine::disposition::{resolve_dispositions, PlanContext};
use crate::engine::executor::{check_preconditions, execute_plan};
use crate::engine::{CancelToken, RelocationError, RelocationReport, RelocationResult, Target};
use crate::model::node::{GroupId, Node, NodeId, TypeTag};
use crate::model::request::{
    child_option_map, normalize_root_ids, owner_override_map, ChildOption, DeleteRequest,
    MoveRequest, OwnerOverride, SessionContext,
};
use crate::repo::graph_repo::{GraphRepository, SqliteGraphRepository};
use crate::repo::security_repo::{SecurityRepository, SqliteSecurityRepository};
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;
use uuid::Uuid;

/// Request after envelope normalization, shared by move and delete.
struct Operation<'req> {
    root_type: TypeTag,
    root_ids: &'req [NodeId],
    destination_group_id: Option<GroupId>,
    child_options: &'req [ChildOption],
    owner_overrides: &'req [OwnerOverride],
    dry_run: bool,
}

impl<'req> From<&'req MoveRequest> for Operation<'req> {
    fn from(request: &'req MoveRequest) -> Self {
        Self {
            root_type: request.root_type,
            root_ids: &request.root_ids,
            destination_group_id: Some(request.destination_group_id),
            child_options: &request.child_options,
            owner_overrides: &request.owner_overrides,
            dry_run: request.dry_run,
        }
    }
}

impl<'req> From<&'req DeleteRequest> for Operation<'req> {
    fn from(request: &'req DeleteRequest) -> Self {
        Self {
            root_type: request.root_type,
            root_ids: &request.root_ids,
            destination_group_id: None,
            child_options: &request.child_options,
            owner_overrides: &[],
            dry_run: request.dry_run,
        }
    }
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        if self.destination_group_id.is_some() {
            "move"
        } else {
            "delete"
        }
    }
}

/// Service facade over one SQLite connection.
pub struct RelocationService<'conn> {
    conn: &'conn mut Connection,
    config: EngineConfig,
}

impl<'conn> RelocationService<'conn> {
    pub fn new(conn: &'conn mut Connection, config: EngineConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Moves the roots and everything that follows them to the destination.
    pub fn move_graph(
        &mut self,
        session: &SessionContext,
        request: &MoveRequest,
    ) -> RelocationResult<RelocationReport> {
        self.move_graph_cancellable(session, request, &CancelToken::new())
    }

    pub fn move_graph_cancellable(
        &mut self,
        session: &SessionContext,
        request: &MoveRequest,
        cancel: &CancelToken,
    ) -> RelocationResult<RelocationReport> {
        self.run(session, Operation::from(request), cancel)
    }

    /// Deletes the roots and everything that follows them.
    pub fn delete_graph(
        &mut self,
        session: &SessionContext,
        request: &DeleteRequest,
    ) -> RelocationResult<RelocationReport> {
        self.delete_graph_cancellable(session, request, &CancelToken::new())
    }

    pub fn delete_graph_cancellable(
        &mut self,
        session: &SessionContext,
        request: &DeleteRequest,
        cancel: &CancelToken,
    ) -> RelocationResult<RelocationReport> {
        self.run(session, Operation::from(request), cancel)
    }

    /// Loads one node the session may see.
    ///
    /// Invisible nodes are reported exactly like missing ones.
    pub fn find_node(&self, session: &SessionContext, id: NodeId) -> RelocationResult<Node> {
        let conn: &Connection = &*self.conn;
        let graph = SqliteGraphRepository::try_new(conn)?;
        let security = SqliteSecurityRepository::try_new(conn)?;
        if security.load_actor(session.actor_id)?.is_none() {
            return Err(RelocationError::UnknownActor(session.actor_id));
        }

        match graph.load_node(id)? {
            Some(node) if is_visible(&security, session, &node)? => Ok(node),
            _ => Err(RelocationError::NotFound { ids: vec![id] }),
        }
    }

    fn run(
        &mut self,
        session: &SessionContext,
        operation: Operation<'_>,
        cancel: &CancelToken,
    ) -> RelocationResult<RelocationReport> {
        let request_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=relocation_request module=service status=start request_id={} operation={} actor_id={} root_type={} roots={} dry_run={}",
            request_id,
            operation.name(),
            session.actor_id,
            operation.root_type.as_str(),
            operation.root_ids.len(),
            operation.dry_run
        );

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = run_pipeline(&tx, &self.config, session, &operation, cancel, request_id);

        match result {
            Ok(report) if operation.dry_run => {
                tx.rollback()?;
                log_state(request_id, "aborted", "dry_run");
                log_done(request_id, &report, started_at);
                Ok(report)
            }
            Ok(report) => {
                tx.commit()?;
                log_state(request_id, "committed", "ok");
                log_done(request_id, &report, started_at);
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=relocation_rollback module=service status=error request_id={} error={}",
                        request_id, rollback_err
                    );
                }
                log_state(request_id, "aborted", err.code());
                error!(
                    "event=relocation_request module=service status=error request_id={} code={} elapsed_ms={} error={}",
                    request_id,
                    err.code(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

fn run_pipeline(
    conn: &Connection,
    config: &EngineConfig,
    session: &SessionContext,
    operation: &Operation<'_>,
    cancel: &CancelToken,
    request_id: Uuid,
) -> RelocationResult<RelocationReport> {
    let graph = SqliteGraphRepository::try_new(conn)?;
    let security = SqliteSecurityRepository::try_new(conn)?;

    let actor = security
        .load_actor(session.actor_id)?
        .ok_or(RelocationError::UnknownActor(session.actor_id))?;
    let target = match operation.destination_group_id {
        Some(group_id) => Target::Move {
            destination: security
                .load_group(group_id)?
                .ok_or(RelocationError::UnknownGroup(group_id))?,
        },
        None => Target::Delete,
    };
    let root_ids = normalize_root_ids(operation.root_ids)?;
    let context = PlanContext {
        actor,
        target,
        child_options: child_option_map(operation.child_options)?,
        owner_overrides: owner_override_map(operation.owner_overrides)?,
        max_nodes: config.max_closure_nodes,
    };

    log_state(request_id, "planning", "ok");
    cancel.check()?;
    let closure = build_closure(
        &graph,
        &security,
        session,
        operation.root_type,
        &root_ids,
        config.max_closure_nodes,
    )?;
    cancel.check()?;
    let validated = validate_bundles(&graph, closure, &context.target)?;
    log_state(request_id, "validated", "ok");

    cancel.check()?;
    let plan = resolve_dispositions(&graph, &security, validated, context)?;
    cancel.check()?;
    check_preconditions(&security, &plan)?;
    let outcome = execute_plan(&graph, &plan)?;
    cancel.check()?;

    Ok(RelocationReport::new(
        request_id,
        operation.dry_run,
        &plan,
        &outcome,
    ))
}

fn log_state(request_id: Uuid, state: &str, detail: &str) {
    info!(
        "event=relocation_state module=service status=ok request_id={} state={} detail={}",
        request_id, state, detail
    );
}

fn log_done(request_id: Uuid, report: &RelocationReport, started_at: Instant) {
    info!(
        "event=relocation_request module=service status=ok request_id={} moved={} deleted={} unlinked={} dry_run={} elapsed_ms={}",
        request_id,
        report.moved_count(),
        report.deleted_count(),
        report.unlinked.len(),
        report.dry_run,
        started_at.elapsed().as_millis()
    );
}
