//! Read-side helpers over already-loaded task lists.
//!
//! # Responsibility
//! - Assemble parent/child trees from flat rows.
//! - Compute completion figures from story-point totals.
//! - Slice lists into pages and compress page-number bars.
//!
//! Nothing here touches the database.

pub mod completion;
pub mod pagination;
pub mod tree;
