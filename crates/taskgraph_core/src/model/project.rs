//! Project and contributor records.

use crate::model::task::{ContributorId, ProjectId};
use serde::{Deserialize, Serialize};

/// Name of the sentinel project used when a task arrives without one.
pub const MISCELLANEOUS_PROJECT_NAME: &str = "Miscellaneous";

/// A project owning a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Unique across projects.
    pub name: String,
    pub description: Option<String>,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

/// A person that can be assigned to tasks.
///
/// Membership in projects is a separate many-to-many relation; assignment
/// to a task implies membership in the task's project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: ContributorId,
    pub name: String,
    /// Epoch ms.
    pub created_at: i64,
}
