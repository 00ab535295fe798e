//! Core use-case services.
//!
//! # Responsibility
//! - Guard the Epic / User Story / Subtask hierarchy on every write.
//! - Orchestrate repository calls into transactional use-case APIs.
//! - Keep transports (CLI, sockets, HTTP) decoupled from storage details.

pub mod hierarchy;
pub(crate) mod mutation;
pub mod orphan_repair;
pub mod payload;
pub mod task_service;
