//! "No Epic" bucket maintenance.
//!
//! # Responsibility
//! - Find or create the per-project sentinel Epic.
//! - Reattach parent-less User Stories to it.
//!
//! # Invariants
//! - At most one bucket per project; the partial unique index is the source
//!   of truth and a losing concurrent insert re-fetches the winner.
//! - Repair is idempotent: a second run finds nothing and writes nothing.
//! - Repaired stories are appended to the end of the bucket's children.

use crate::model::task::{
    default_priorities, EstimateType, ProjectId, Task, TaskId, TaskStatus, TaskType,
    NO_EPIC_BUCKET_NAME,
};
use crate::repo::task_repo::{SiblingScope, TaskRepository};
use crate::repo::RepoResult;
use log::{info, warn};

/// Returns the id of the project's "No Epic" bucket, creating it if needed.
pub fn ensure_no_epic_bucket(
    repo: &impl TaskRepository,
    project_id: ProjectId,
) -> RepoResult<TaskId> {
    if let Some(existing) = repo.find_no_epic_bucket(project_id)? {
        return Ok(existing.id);
    }

    match repo.insert_task(&bucket_template(project_id)) {
        Ok(bucket) => {
            info!(
                "event=no_epic_bucket_create module=orphan_repair status=ok project_id={} task_id={}",
                project_id, bucket.id
            );
            Ok(bucket.id)
        }
        Err(err) if err.is_constraint_violation() => {
            warn!(
                "event=no_epic_bucket_create module=orphan_repair status=conflict project_id={} error={}",
                project_id, err
            );
            match repo.find_no_epic_bucket(project_id)? {
                Some(winner) => Ok(winner.id),
                None => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}

/// Reparents every parent-less User Story of the project to the bucket.
///
/// Returns the ids that were moved, in sibling order.
pub fn repair_orphan_user_stories(
    repo: &impl TaskRepository,
    project_id: ProjectId,
) -> RepoResult<Vec<TaskId>> {
    let orphans = repo.list_orphan_user_stories(project_id)?;
    if orphans.is_empty() {
        return Ok(Vec::new());
    }

    let bucket_id = ensure_no_epic_bucket(repo, project_id)?;
    let mut repaired = Vec::with_capacity(orphans.len());
    for mut story in orphans {
        story.parent_id = Some(bucket_id);
        story.sort_order = repo.next_sort_order(SiblingScope::Parent(bucket_id))?;
        repo.update_task(&story)?;
        info!(
            "event=orphan_repair module=orphan_repair status=ok project_id={} task_id={} bucket_id={}",
            project_id, story.id, bucket_id
        );
        repaired.push(story.id);
    }
    Ok(repaired)
}

fn bucket_template(project_id: ProjectId) -> Task {
    let (priority, epic_priority) = default_priorities(TaskType::Epic);
    Task {
        id: 0,
        name: NO_EPIC_BUCKET_NAME.to_string(),
        description: None,
        task_type: TaskType::Epic,
        parent_id: None,
        project_id,
        contributor_id: None,
        estimate_type: EstimateType::default(),
        story_points: None,
        time_estimate: None,
        priority,
        epic_priority,
        status: TaskStatus::default(),
        completed: false,
        completed_date: None,
        is_archived: false,
        sort_order: 0,
        created_at: 0,
        updated_at: 0,
    }
}
