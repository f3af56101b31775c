//! Domain model for graph relocation.
//!
//! # Responsibility
//! - Define persistent nodes, typed links, security groups and actors.
//! - Define inbound request/session envelopes.
//!
//! # Invariants
//! - Every node is identified by a stable integer id.
//! - Composition is logical, not an ownership tree: a node may have many
//!   composition parents.

pub mod group;
pub mod link;
pub mod node;
pub mod request;
