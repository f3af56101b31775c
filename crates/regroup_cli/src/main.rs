//! Command-line entry point for move and graph-delete requests.
//!
//! # Responsibility
//! - Parse arguments, load config and request JSON, run one request.
//! - Print the report, or the error response, as JSON on stdout.
//!
//! # Invariants
//! - Exit code is 0 only when the request succeeded.

use clap::{Parser, Subcommand};
use log::info;
use regroup_core::{
    init_logging_from_config, open_db, DeleteRequest, EngineConfig, ErrorResponse, GroupContext,
    MoveRequest, RelocationError, RelocationService, SessionContext,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "regroup", version, about = "Move or delete object graphs across security groups")]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    db: PathBuf,
    #[command(subcommand)]
    command: Command,
    /// Acting user id.
    #[arg(long, global = true)]
    actor: Option<i64>,
    /// Group context: a group id, or `all`.
    #[arg(long, global = true, default_value = "all")]
    group: String,
    /// JSON engine config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Move the roots of a request file to its destination group.
    Move { request: PathBuf },
    /// Delete the roots of a request file and everything that follows them.
    Delete { request: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(CliError::Relocation(err)) => {
            let response = ErrorResponse::from(&err);
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
        Err(CliError::Setup(message)) => {
            eprintln!("regroup: {message}");
            ExitCode::from(2)
        }
    }
}

enum CliError {
    Setup(String),
    Relocation(RelocationError),
}

impl From<RelocationError> for CliError {
    fn from(value: RelocationError) -> Self {
        Self::Relocation(value)
    }
}

fn setup<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> CliError + '_ {
    move |err| CliError::Setup(format!("{context}: {err}"))
}

fn run(cli: &Cli) -> Result<String, CliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).map_err(setup("config"))?,
        None => EngineConfig::default(),
    };
    if let Some(log_dir) = &cli.log_dir {
        init_logging_from_config(&config, log_dir).map_err(setup("logging"))?;
    }

    let actor_id = cli
        .actor
        .ok_or_else(|| CliError::Setup("--actor is required".to_string()))?;
    let session = SessionContext {
        actor_id,
        group_context: parse_group_context(&cli.group)?,
    };

    let mut conn = open_db(&cli.db).map_err(setup("database"))?;
    let mut service = RelocationService::new(&mut conn, config);
    let report = match &cli.command {
        Command::Move { request } => {
            let request: MoveRequest = read_request(request)?;
            service.move_graph(&session, &request)?
        }
        Command::Delete { request } => {
            let request: DeleteRequest = read_request(request)?;
            service.delete_graph(&session, &request)?
        }
    };
    info!(
        "event=cli_request module=cli status=ok request_id={} operation={}",
        report.request_id,
        report.operation.as_str()
    );

    serde_json::to_string_pretty(&report).map_err(setup("report"))
}

fn parse_group_context(raw: &str) -> Result<GroupContext, CliError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(GroupContext::All);
    }
    raw.parse::<i64>()
        .map(GroupContext::Group)
        .map_err(|_| CliError::Setup(format!("--group must be a group id or `all`, got `{raw}`")))
}

fn read_request<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(setup("request"))?;
    serde_json::from_str(&raw).map_err(setup("request"))
}
