//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine stages and repositories into request-level APIs.
//! - Own the transaction boundary for every request.

pub mod relocation_service;
