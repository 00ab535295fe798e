//! Domain model for projects, contributors and the task hierarchy.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Keep field-level couplings (status/completion, type/priority,
//!   estimate exclusivity) next to the data they constrain.
//!
//! # Invariants
//! - Records reference each other by id only; no live object graph.

pub mod project;
pub mod task;
pub mod view;
