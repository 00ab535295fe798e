//! Flat task projection handed to callers and notification payloads.

use crate::model::task::{
    ContributorId, EpicPriority, EstimateType, Priority, ProjectId, Task, TaskId, TaskStatus,
    TaskType,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when a task has no contributor.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Serialized task record.
///
/// `priority` is only populated for non-Epic tasks and `epic_priority` only
/// for Epics; timestamps are RFC 3339 UTC strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: Option<Priority>,
    pub epic_priority: Option<EpicPriority>,
    pub is_archived: bool,
    pub completed: bool,
    pub completed_date: Option<String>,
    pub parent_id: Option<TaskId>,
    pub project_id: ProjectId,
    pub project: Option<String>,
    pub contributor_id: Option<ContributorId>,
    pub contributor_name: String,
    pub estimate_type: EstimateType,
    pub story_points: i64,
    pub time_estimate: Option<i64>,
    pub status: TaskStatus,
    pub sort_order: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl TaskView {
    /// Builds the projection from a task row and its joined display names.
    pub fn from_parts(
        task: &Task,
        project_name: Option<String>,
        contributor_name: Option<String>,
    ) -> Self {
        let is_epic = task.task_type == TaskType::Epic;
        Self {
            id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            task_type: task.task_type,
            priority: if is_epic { None } else { task.priority },
            epic_priority: if is_epic { task.epic_priority } else { None },
            is_archived: task.is_archived,
            completed: task.completed,
            completed_date: task.completed_date.and_then(epoch_ms_to_iso),
            parent_id: task.parent_id,
            project_id: task.project_id,
            project: project_name,
            contributor_id: task.contributor_id,
            contributor_name: contributor_name.unwrap_or_else(|| UNASSIGNED_LABEL.to_string()),
            estimate_type: task.estimate_type,
            story_points: task.story_points.unwrap_or(0),
            time_estimate: task.time_estimate,
            status: task.status,
            sort_order: task.sort_order,
            created_at: epoch_ms_to_iso(task.created_at),
            updated_at: epoch_ms_to_iso(task.updated_at),
        }
    }
}

/// Formats epoch milliseconds as an RFC 3339 UTC string.
///
/// Returns `None` for values outside chrono's representable range.
pub fn epoch_ms_to_iso(value: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::epoch_ms_to_iso;

    #[test]
    fn epoch_ms_formats_as_utc_iso() {
        assert_eq!(
            epoch_ms_to_iso(1_700_000_000_123).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
    }
}
