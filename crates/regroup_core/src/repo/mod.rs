//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistent-store and security collaborators the relocation
//!   pipeline consumes.
//! - Isolate SQLite query details from engine/service orchestration.
//!
//! # Invariants
//! - Repositories never begin or commit transactions; the relocation service
//!   owns one transaction per request and hands it to both repositories.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod graph_repo;
pub mod security_repo;
