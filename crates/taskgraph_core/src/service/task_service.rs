//! Task mutation and query use-case service.
//!
//! # Responsibility
//! - Run every hierarchy-changing operation validate-then-write inside one
//!   IMMEDIATE SQLite transaction.
//! - Publish change events after commit.
//! - Serve task views, trees and completion figures.
//!
//! # Invariants
//! - Field helpers are dirty-checked: unchanged input writes nothing and
//!   publishes nothing.
//! - A notification failure never fails or rolls back the mutation.
//! - Hierarchical reads repair orphaned User Stories first.

use crate::config::ServiceConfig;
use crate::model::project::{Contributor, Project, MISCELLANEOUS_PROJECT_NAME};
use crate::model::task::{
    ContributorId, EpicPriority, EstimateType, Priority, ProjectId, Task, TaskId, TaskStatus,
    TaskType, TaskValidationError,
};
use crate::model::view::TaskView;
use crate::notify::{publish, NotificationSink, TaskEvent};
use crate::query::completion::completion_percentage;
use crate::query::tree::{build_hierarchy, TreeNode};
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskListQuery, TaskRepository};
use crate::repo::{EntityKind, RepoError};
use crate::service::hierarchy::{
    detect_cycle, valid_parent_types, HierarchyError, HierarchyLookup, TaskArena,
};
use crate::service::mutation::WriteScope;
use crate::service::payload::TaskPayload;
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type ServiceResult<T> = Result<T, TaskServiceError>;

/// Where a task should hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentTarget {
    /// Under an explicit task.
    Task(TaskId),
    /// Under the project's "No Epic" bucket (User Stories only).
    NoEpic,
    /// Detached (Epics, or User Stories pending repair).
    Root,
}

/// Result of a dirty-checked field update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub task: Task,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub task: Task,
    /// Clamped position the task ended up at.
    pub new_index: usize,
    pub changed: bool,
}

/// Summary of one maintenance sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationshipReport {
    pub projects_checked: usize,
    pub tasks_checked: usize,
    /// User Stories moved into a "No Epic" bucket.
    pub repaired: Vec<TaskId>,
}

/// Creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub name: String,
    pub task_type: TaskType,
    pub description: Option<String>,
    /// `None` files the task under the "Miscellaneous" project.
    pub project_id: Option<ProjectId>,
    pub parent: Option<ParentTarget>,
    pub contributor_id: Option<ContributorId>,
    pub priority: Option<Priority>,
    pub epic_priority: Option<EpicPriority>,
    pub status: Option<TaskStatus>,
    pub estimate_type: Option<EstimateType>,
    pub story_points: Option<i64>,
    pub time_estimate: Option<i64>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            name: name.into(),
            task_type,
            description: None,
            project_id: None,
            parent: None,
            contributor_id: None,
            priority: None,
            epic_priority: None,
            status: None,
            estimate_type: None,
            story_points: None,
            time_estimate: None,
        }
    }

    pub fn in_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn under(mut self, parent_id: TaskId) -> Self {
        self.parent = Some(ParentTarget::Task(parent_id));
        self
    }

    /// Builds a creation request; `name` and `task_type` are required.
    pub fn from_payload(payload: &TaskPayload) -> ServiceResult<Self> {
        let name = payload.name.clone().ok_or(TaskServiceError::Validation {
            field: "name",
            reason: "is required".to_string(),
        })?;
        let task_type = payload.task_type.ok_or(TaskServiceError::Validation {
            field: "task_type",
            reason: format!("is required; expected one of: {}", TaskType::allowed_labels()),
        })?;
        Ok(Self {
            name,
            task_type,
            description: payload.description.clone(),
            project_id: payload.project_id,
            parent: payload.parent,
            contributor_id: payload.contributor_id,
            priority: payload.priority,
            epic_priority: payload.epic_priority,
            status: payload.status,
            estimate_type: payload.estimate_type,
            story_points: payload.story_points,
            time_estimate: payload.time_estimate,
        })
    }
}

/// Errors surfaced by [`TaskService`].
#[derive(Debug)]
pub enum TaskServiceError {
    NotFound {
        entity: EntityKind,
        id: i64,
    },
    /// Bad enum label, blank or missing required value.
    Validation {
        field: &'static str,
        reason: String,
    },
    Hierarchy(HierarchyError),
    /// Delete blocked until the caller confirms cascading.
    HasChildren {
        task_id: TaskId,
        child_count: i64,
    },
    /// Store-level uniqueness or constraint rejection.
    Conflict(String),
    DuplicateTask {
        existing_id: TaskId,
    },
    /// First invariant breach found by `validate_all_relationships`.
    RelationshipViolation {
        task_id: TaskId,
        expected: String,
        actual: String,
    },
    Repo(RepoError),
}

impl TaskServiceError {
    /// Message safe to show to end users. Internal failures are reported
    /// generically; their detail only goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Repo(_) => "An internal error occurred. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation { field, reason } => write!(f, "invalid {field}: {reason}"),
            Self::Hierarchy(err) => write!(f, "{err}"),
            Self::HasChildren {
                task_id,
                child_count,
            } => write!(
                f,
                "task {task_id} has {child_count} child task(s); confirm cascading delete"
            ),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::DuplicateTask { existing_id } => {
                write!(f, "a task with this name and type already exists: {existing_id}")
            }
            Self::RelationshipViolation {
                task_id,
                expected,
                actual,
            } => write!(
                f,
                "task {task_id} violates hierarchy: expected {expected}, found {actual}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Hierarchy(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation {
                field: validation_field(&err),
                reason: err.to_string(),
            },
            err if err.is_constraint_violation() => Self::Conflict(err.to_string()),
            other => Self::Repo(other),
        }
    }
}

impl From<HierarchyError> for TaskServiceError {
    fn from(value: HierarchyError) -> Self {
        match value {
            HierarchyError::Lookup(err) => Self::from(err),
            other => Self::Hierarchy(other),
        }
    }
}

impl From<rusqlite::Error> for TaskServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(RepoError::from(value))
    }
}

fn validation_field(err: &TaskValidationError) -> &'static str {
    match err {
        TaskValidationError::BlankName => "name",
        TaskValidationError::EpicWithParent => "parent_id",
        TaskValidationError::PriorityOnEpic => "priority",
        TaskValidationError::EpicPriorityOnNonEpic => "epic_priority",
        TaskValidationError::CompletionMismatch => "status",
        TaskValidationError::EstimateConflict | TaskValidationError::NegativeEstimate(_) => {
            "estimate"
        }
    }
}

/// Task use-case facade over one connection.
///
/// Each request worker owns its own connection and service.
pub struct TaskService<'conn> {
    conn: &'conn Connection,
    sink: Arc<dyn NotificationSink>,
    config: ServiceConfig,
}

impl<'conn> TaskService<'conn> {
    pub fn new(conn: &'conn Connection, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_config(conn, sink, ServiceConfig::default())
    }

    pub fn with_config(
        conn: &'conn Connection,
        sink: Arc<dyn NotificationSink>,
        config: ServiceConfig,
    ) -> Self {
        Self { conn, sink, config }
    }

    pub fn config(&self) -> ServiceConfig {
        self.config
    }

    /// Runs one step in an IMMEDIATE transaction, commits, then publishes
    /// the buffered events.
    fn run<T>(
        &self,
        op: &'static str,
        subject_id: Option<i64>,
        step: impl FnOnce(&mut WriteScope<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let started_at = Instant::now();
        match self.run_in_transaction(step) {
            Ok((value, events)) => {
                info!(
                    "event={} module=service status=ok id={} events={} duration_ms={}",
                    op,
                    display_id(subject_id),
                    events.len(),
                    started_at.elapsed().as_millis()
                );
                for event in events {
                    publish(self.sink.as_ref(), event);
                }
                Ok(value)
            }
            Err(err) => {
                match &err {
                    TaskServiceError::Repo(_) => error!(
                        "event={} module=service status=error id={} error={:?}",
                        op,
                        display_id(subject_id),
                        err
                    ),
                    _ => warn!(
                        "event={} module=service status=rejected id={} error={}",
                        op,
                        display_id(subject_id),
                        err
                    ),
                }
                Err(err)
            }
        }
    }

    fn run_in_transaction<T>(
        &self,
        step: impl FnOnce(&mut WriteScope<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<(T, Vec<TaskEvent>)> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (value, events) = {
            let mut scope = WriteScope::new(&tx, self.config);
            let value = step(&mut scope)?;
            (value, scope.into_events())
        };
        tx.commit()?;
        Ok((value, events))
    }

    fn tasks(&self) -> SqliteTaskRepository<'conn> {
        SqliteTaskRepository::new(self.conn)
    }

    fn projects(&self) -> SqliteProjectRepository<'conn> {
        SqliteProjectRepository::new(self.conn)
    }

    /// Sets status and derives `completed`/`completed_date`.
    pub fn update_status(&self, task_id: TaskId, status: TaskStatus) -> ServiceResult<UpdateOutcome> {
        self.run("update_status", Some(task_id), |scope| {
            scope.set_status(task_id, status)
        })
    }

    /// Changes task type. The current parent and existing children must stay
    /// valid under the new type; nothing is reparented automatically.
    pub fn update_task_type(
        &self,
        task_id: TaskId,
        task_type: TaskType,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("update_task_type", Some(task_id), |scope| {
            scope.place(task_id, Some(task_type), None)
        })
    }

    /// Sets `priority`, or `epic_priority` when `is_epic_priority`, from its
    /// wire label.
    pub fn update_priority(
        &self,
        task_id: TaskId,
        value: &str,
        is_epic_priority: bool,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("update_priority", Some(task_id), |scope| {
            scope.set_priority(task_id, value, is_epic_priority)
        })
    }

    /// Assigns a contributor, adding project membership when missing.
    /// `None` is a no-op.
    pub fn update_contributor(
        &self,
        task_id: TaskId,
        contributor_id: Option<ContributorId>,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("update_contributor", Some(task_id), |scope| {
            scope.set_contributor(task_id, contributor_id)
        })
    }

    pub fn update_project(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("update_project", Some(task_id), |scope| {
            scope.move_to_project(task_id, project_id)
        })
    }

    pub fn update_estimate(
        &self,
        task_id: TaskId,
        value: i64,
        estimate_type: EstimateType,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("update_estimate", Some(task_id), |scope| {
            scope.set_estimate(task_id, value, estimate_type)
        })
    }

    pub fn update_name(&self, task_id: TaskId, name: &str) -> ServiceResult<UpdateOutcome> {
        self.run("update_name", Some(task_id), |scope| scope.rename(task_id, name))
    }

    pub fn update_description(
        &self,
        task_id: TaskId,
        description: Option<&str>,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("update_description", Some(task_id), |scope| {
            scope.set_description(task_id, description)
        })
    }

    /// Archives or restores the task and all of its descendants.
    pub fn set_archived(&self, task_id: TaskId, archived: bool) -> ServiceResult<UpdateOutcome> {
        self.run("set_archived", Some(task_id), |scope| {
            scope.set_archived(task_id, archived)
        })
    }

    /// Moves a task to `new_index` (clamped) inside its sibling scope.
    pub fn reorder(&self, task_id: TaskId, new_index: i64) -> ServiceResult<ReorderOutcome> {
        self.run("reorder", Some(task_id), |scope| scope.reorder(task_id, new_index))
    }

    /// Moves a task under another parent. The task is appended at the end of
    /// the destination scope; use [`Self::reorder`] to position it.
    pub fn reparent(&self, task_id: TaskId, target: ParentTarget) -> ServiceResult<UpdateOutcome> {
        self.run("reparent", Some(task_id), |scope| {
            scope.place(task_id, None, Some(target))
        })
    }

    pub fn has_children(&self, task_id: TaskId) -> ServiceResult<bool> {
        let tasks = self.tasks();
        tasks.require_task(task_id)?;
        Ok(tasks.count_children(task_id)? > 0)
    }

    /// Deletes a task. With children present, `cascade_children` must be
    /// set; the subtree is then removed deepest first.
    pub fn delete(&self, task_id: TaskId, cascade_children: bool) -> ServiceResult<Vec<TaskId>> {
        self.run("delete_task", Some(task_id), |scope| {
            scope.delete(task_id, cascade_children)
        })
    }

    pub fn create(&self, new_task: &NewTask) -> ServiceResult<Task> {
        self.run("create_task", new_task.project_id, |scope| scope.create(new_task))
    }

    /// Applies a partial payload atomically. `task_type` and `parent_id`
    /// arriving together are validated as one placement.
    pub fn apply_update(
        &self,
        task_id: TaskId,
        payload: &TaskPayload,
    ) -> ServiceResult<UpdateOutcome> {
        self.run("apply_update", Some(task_id), |scope| {
            scope.apply_payload(task_id, payload)
        })
    }

    pub fn create_project(&self, name: &str, description: Option<&str>) -> ServiceResult<Project> {
        self.run("create_project", None, |scope| {
            scope.create_project(name, description)
        })
    }

    /// Find-or-create of the "Miscellaneous" project.
    pub fn ensure_default_project(&self) -> ServiceResult<Project> {
        self.run("ensure_default_project", None, |scope| {
            scope.ensure_project(MISCELLANEOUS_PROJECT_NAME)
        })
    }

    /// Deletes a project with all its tasks. Returns deleted task count.
    pub fn delete_project(&self, project_id: ProjectId) -> ServiceResult<usize> {
        self.run("delete_project", Some(project_id), |scope| {
            scope.delete_project(project_id)
        })
    }

    pub fn create_contributor(&self, name: &str) -> ServiceResult<Contributor> {
        self.run("create_contributor", None, |scope| scope.create_contributor(name))
    }

    pub fn add_contributor_to_project(
        &self,
        project_id: ProjectId,
        contributor_id: ContributorId,
    ) -> ServiceResult<bool> {
        self.run("add_contributor", Some(project_id), |scope| {
            scope.require_project(project_id)?;
            let contributor = scope.require_contributor(contributor_id)?;
            scope.add_member(project_id, &contributor)
        })
    }

    pub fn list_projects(&self) -> ServiceResult<Vec<Project>> {
        Ok(self.projects().list_projects()?)
    }

    pub fn list_project_members(&self, project_id: ProjectId) -> ServiceResult<Vec<Contributor>> {
        self.require_project(project_id)?;
        Ok(self.projects().list_members(project_id)?)
    }

    pub fn get_task(&self, task_id: TaskId) -> ServiceResult<Task> {
        Ok(self.tasks().require_task(task_id)?)
    }

    pub fn get_task_view(&self, task_id: TaskId) -> ServiceResult<TaskView> {
        self.tasks()
            .get_task_view(task_id)?
            .ok_or(TaskServiceError::NotFound {
                entity: EntityKind::Task,
                id: task_id,
            })
    }

    pub fn list_tasks(&self, query: &TaskListQuery) -> ServiceResult<Vec<TaskView>> {
        Ok(self.tasks().list_task_views(query)?)
    }

    /// Moves the project's parent-less User Stories under its "No Epic"
    /// bucket. Returns the repaired ids; the bucket is created only when
    /// something needs it.
    pub fn repair_orphans(&self, project_id: ProjectId) -> ServiceResult<Vec<TaskId>> {
        self.require_project(project_id)?;
        self.run("repair_orphans", Some(project_id), |scope| {
            scope.repair_orphans(project_id)
        })
    }

    /// Repairs orphans, then returns the project's task forest.
    pub fn task_hierarchy(&self, project_id: ProjectId) -> ServiceResult<Vec<TreeNode<TaskView>>> {
        self.repair_orphans(project_id)?;
        let views = self
            .tasks()
            .list_task_views(&TaskListQuery::for_project(project_id))?;
        Ok(build_hierarchy(views))
    }

    /// Percentage of story points completed, rounded to two decimals.
    /// A project without points reports 0.
    pub fn completion_percentage(&self, project_id: ProjectId) -> ServiceResult<f64> {
        self.require_project(project_id)?;
        let totals = self.tasks().story_point_totals(project_id)?;
        Ok(completion_percentage(totals))
    }

    /// Maintenance sweep: repairs every project (one transaction each), then
    /// checks every task and fails on the first violation.
    pub fn validate_all_relationships(&self) -> ServiceResult<RelationshipReport> {
        let projects = self.projects().list_projects()?;
        let mut report = RelationshipReport {
            projects_checked: projects.len(),
            ..RelationshipReport::default()
        };
        for project in &projects {
            let repaired = self.run("repair_project", Some(project.id), |scope| {
                scope.repair_project(project.id)
            })?;
            report.repaired.extend(repaired);
        }

        let tasks = self.tasks().list_tasks(&TaskListQuery::default())?;
        let arena = TaskArena::from_tasks(&tasks);
        for task in &tasks {
            if let Err(err) = check_relationships(&arena, task) {
                warn!(
                    "event=validate_relationships module=service status=violation task_id={} error={}",
                    task.id, err
                );
                return Err(err);
            }
        }
        report.tasks_checked = tasks.len();
        info!(
            "event=validate_relationships module=service status=ok projects={} tasks={} repaired={}",
            report.projects_checked,
            report.tasks_checked,
            report.repaired.len()
        );
        Ok(report)
    }

    fn require_project(&self, project_id: ProjectId) -> ServiceResult<Project> {
        self.projects()
            .get_project(project_id)?
            .ok_or(TaskServiceError::NotFound {
                entity: EntityKind::Project,
                id: project_id,
            })
    }
}

fn display_id(id: Option<i64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

/// Checks one task against the full hierarchy invariant.
fn check_relationships(arena: &TaskArena, task: &Task) -> ServiceResult<()> {
    let violation = |expected: String, actual: String| TaskServiceError::RelationshipViolation {
        task_id: task.id,
        expected,
        actual,
    };

    let priority_ok = match task.task_type {
        TaskType::Epic => task.priority.is_none() && task.epic_priority.is_some(),
        TaskType::UserStory | TaskType::Subtask => {
            task.epic_priority.is_none() && task.priority.is_some()
        }
    };
    if !priority_ok {
        return Err(violation(
            format!("priority fields matching {}", task.task_type),
            format!(
                "priority={:?} epic_priority={:?}",
                task.priority, task.epic_priority
            ),
        ));
    }

    let allowed = valid_parent_types(task.task_type);
    let Some(parent_id) = task.parent_id else {
        return match task.task_type {
            TaskType::Epic => Ok(()),
            TaskType::UserStory | TaskType::Subtask => Err(violation(
                format!("{} parent", describe_types(allowed)),
                "no parent".to_string(),
            )),
        };
    };

    let parent = arena.node(parent_id)?.ok_or_else(|| {
        violation(
            format!("{} parent", describe_types(allowed)),
            format!("missing task {parent_id}"),
        )
    })?;
    if !allowed.contains(&parent.task_type) {
        return Err(violation(
            format!("{} parent", describe_types(allowed)),
            format!("{} parent {parent_id}", parent.task_type),
        ));
    }
    if parent.project_id != task.project_id {
        return Err(violation(
            format!("parent in project {}", task.project_id),
            format!("parent {parent_id} in project {}", parent.project_id),
        ));
    }
    if detect_cycle(arena, parent_id, task.id)? {
        return Err(violation(
            "acyclic ancestry".to_string(),
            format!("cycle through task {parent_id}"),
        ));
    }
    Ok(())
}

fn describe_types(types: &[TaskType]) -> String {
    if types.is_empty() {
        return "no".to_string();
    }
    types
        .iter()
        .map(|task_type| task_type.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::hierarchy::HierarchyNode;

    fn task(id: TaskId, task_type: TaskType, parent_id: Option<TaskId>) -> Task {
        let (priority, epic_priority) = crate::model::task::default_priorities(task_type);
        Task {
            id,
            name: format!("task {id}"),
            description: None,
            task_type,
            parent_id,
            project_id: 1,
            contributor_id: None,
            estimate_type: EstimateType::StoryPoints,
            story_points: None,
            time_estimate: None,
            priority,
            epic_priority,
            status: TaskStatus::NotStarted,
            completed: false,
            completed_date: None,
            is_archived: false,
            sort_order: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn relationship_check_reports_expected_and_actual_types() {
        let epic = task(1, TaskType::Epic, None);
        let subtask = task(2, TaskType::Subtask, Some(1));
        let arena = TaskArena::from_tasks([&epic, &subtask]);

        check_relationships(&arena, &epic).unwrap();
        match check_relationships(&arena, &subtask) {
            Err(TaskServiceError::RelationshipViolation {
                task_id,
                expected,
                actual,
            }) => {
                assert_eq!(task_id, 2);
                assert_eq!(expected, "User Story parent");
                assert_eq!(actual, "Epic parent 1");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn relationship_check_flags_orphans_and_cycles() {
        let orphan = task(3, TaskType::UserStory, None);
        let arena = TaskArena::from_tasks([&orphan]);
        assert!(check_relationships(&arena, &orphan).is_err());

        let mut arena = TaskArena::new();
        arena.insert(HierarchyNode {
            id: 10,
            task_type: TaskType::Epic,
            parent_id: Some(11),
            project_id: 1,
        });
        let story = task(11, TaskType::UserStory, Some(10));
        arena.insert(HierarchyNode::from(&story));
        let err = check_relationships(&arena, &story).unwrap_err();
        assert!(err.to_string().contains("acyclic"));
    }

    #[test]
    fn repo_errors_map_to_service_taxonomy() {
        let not_found = TaskServiceError::from(RepoError::NotFound {
            entity: EntityKind::Task,
            id: 9,
        });
        assert!(matches!(
            not_found,
            TaskServiceError::NotFound {
                entity: EntityKind::Task,
                id: 9
            }
        ));

        let invalid = TaskServiceError::from(RepoError::Validation(TaskValidationError::BlankName));
        assert!(matches!(
            invalid,
            TaskServiceError::Validation { field: "name", .. }
        ));

        let internal = TaskServiceError::from(RepoError::InvalidData("bad row".to_string()));
        assert_eq!(
            internal.user_message(),
            "An internal error occurred. Please try again."
        );
        assert!(!internal.user_message().contains("bad row"));
    }
}
