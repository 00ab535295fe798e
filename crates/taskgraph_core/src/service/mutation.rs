//! Mutation steps that run inside one write transaction.
//!
//! # Responsibility
//! - Re-read, validate and write tasks against a transaction connection.
//! - Buffer outbound events until the caller commits.
//!
//! # Invariants
//! - Every step validates before its first write; a failing step leaves
//!   the transaction to be rolled back by its owner.
//! - Field steps write and emit only when something actually changed.
//! - Events are never published from here.

use crate::config::{DuplicatePolicy, ServiceConfig};
use crate::model::project::{Contributor, Project, MISCELLANEOUS_PROJECT_NAME};
use crate::model::task::{
    completion_for, ContributorId, EpicPriority, EstimateType, Priority, ProjectId, Task,
    TaskId, TaskStatus, TaskType, NO_EPIC_BUCKET_NAME,
};
use crate::model::view::epoch_ms_to_iso;
use crate::notify::{EventName, TaskEvent};
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::task_repo::{SiblingScope, SqliteTaskRepository, TaskRepository};
use crate::repo::{now_epoch_ms, EntityKind, RepoError};
use crate::service::hierarchy::{
    validate_children_for_type, validate_parent_assignment, HierarchyError,
};
use crate::service::orphan_repair::{ensure_no_epic_bucket, repair_orphan_user_stories};
use crate::service::payload::TaskPayload;
use crate::service::task_service::{
    NewTask, ParentTarget, ReorderOutcome, ServiceResult, TaskServiceError, UpdateOutcome,
};
use log::{info, warn};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;

pub(crate) struct WriteScope<'tx> {
    conn: &'tx Connection,
    config: ServiceConfig,
    events: Vec<TaskEvent>,
}

impl<'tx> WriteScope<'tx> {
    pub(crate) fn new(conn: &'tx Connection, config: ServiceConfig) -> Self {
        Self {
            conn,
            config,
            events: Vec::new(),
        }
    }

    pub(crate) fn into_events(self) -> Vec<TaskEvent> {
        self.events
    }

    fn tasks(&self) -> SqliteTaskRepository<'tx> {
        SqliteTaskRepository::new(self.conn)
    }

    fn projects(&self) -> SqliteProjectRepository<'tx> {
        SqliteProjectRepository::new(self.conn)
    }

    fn emit(&mut self, name: EventName, payload: Value) {
        self.events.push(TaskEvent::new(name, payload));
    }

    fn emit_task_update(&mut self, task: &Task, changes: Value) {
        let mut payload = json!({
            "task_id": task.id,
            "project_id": task.project_id,
        });
        if let (Some(target), Value::Object(changes)) = (payload.as_object_mut(), changes) {
            target.extend(changes);
        }
        self.emit(EventName::UpdateTask, payload);
    }

    /// Loads the task, lets `apply` mutate it and persists it when `apply`
    /// reports a change.
    fn modify(
        &self,
        task_id: TaskId,
        apply: impl FnOnce(&Task) -> ServiceResult<Option<Task>>,
    ) -> ServiceResult<UpdateOutcome> {
        let tasks = self.tasks();
        let task = tasks.require_task(task_id)?;
        match apply(&task)? {
            Some(updated) => Ok(UpdateOutcome {
                task: tasks.update_task(&updated)?,
                changed: true,
            }),
            None => Ok(UpdateOutcome {
                task,
                changed: false,
            }),
        }
    }

    fn resolve_parent(
        &self,
        task_type: TaskType,
        project_id: ProjectId,
        target: ParentTarget,
    ) -> ServiceResult<Option<TaskId>> {
        match target {
            ParentTarget::Task(parent_id) => Ok(Some(parent_id)),
            ParentTarget::Root => Ok(None),
            ParentTarget::NoEpic => {
                if task_type != TaskType::UserStory {
                    return Err(TaskServiceError::Validation {
                        field: "parent_id",
                        reason: format!("only User Stories can join the No Epic bucket, not {task_type}"),
                    });
                }
                Ok(Some(ensure_no_epic_bucket(&self.tasks(), project_id)?))
            }
        }
    }

    pub(crate) fn set_status(
        &mut self,
        task_id: TaskId,
        status: TaskStatus,
    ) -> ServiceResult<UpdateOutcome> {
        let outcome = self.modify(task_id, |task| {
            let mut task = task.clone();
            Ok(task.apply_status(status, now_epoch_ms()).then_some(task))
        })?;
        if outcome.changed {
            let task = &outcome.task;
            self.emit_task_update(
                task,
                json!({
                    "status": task.status,
                    "completed": task.completed,
                    "completed_date": task.completed_date.and_then(epoch_ms_to_iso),
                }),
            );
        }
        Ok(outcome)
    }

    /// Changes type and/or parent as one validated step.
    ///
    /// `None` keeps the current value.
    pub(crate) fn place(
        &mut self,
        task_id: TaskId,
        task_type: Option<TaskType>,
        target: Option<ParentTarget>,
    ) -> ServiceResult<UpdateOutcome> {
        let tasks = self.tasks();
        let mut task = tasks.require_task(task_id)?;
        let new_type = task_type.unwrap_or(task.task_type);
        let new_parent = match target {
            Some(target) => self.resolve_parent(new_type, task.project_id, target)?,
            None => task.parent_id,
        };
        let type_changed = new_type != task.task_type;
        let parent_changed = new_parent != task.parent_id;
        if !type_changed && !parent_changed {
            return Ok(UpdateOutcome {
                task,
                changed: false,
            });
        }
        if type_changed && task.is_no_epic_bucket() {
            return Err(TaskServiceError::Validation {
                field: "task_type",
                reason: "the No Epic bucket must stay an Epic".to_string(),
            });
        }
        if type_changed {
            reject_reserved_epic_name(&task.name, new_type)?;
        }

        validate_parent_assignment(&tasks, Some(task.id), new_type, task.project_id, new_parent)?;
        if type_changed {
            validate_children_for_type(&tasks, task.id, new_type)?;
        }

        let old_scope = SiblingScope::of(&task);
        let old_parent = task.parent_id;
        task.apply_task_type(new_type);
        task.parent_id = new_parent;
        let new_scope = SiblingScope::of(&task);
        if new_scope != old_scope {
            task.sort_order = tasks.next_sort_order(new_scope)?;
        }
        let task = tasks.update_task(&task)?;

        if type_changed {
            self.emit_task_update(
                &task,
                json!({
                    "task_type": task.task_type,
                    "priority": task.priority,
                    "epic_priority": task.epic_priority,
                }),
            );
        }
        if parent_changed {
            self.emit(
                EventName::TaskParentUpdated,
                json!({
                    "task_id": task.id,
                    "parent_id": task.parent_id,
                    "old_parent_id": old_parent,
                    "project_id": task.project_id,
                }),
            );
        }
        Ok(UpdateOutcome {
            task,
            changed: true,
        })
    }

    pub(crate) fn set_priority(
        &mut self,
        task_id: TaskId,
        value: &str,
        is_epic_priority: bool,
    ) -> ServiceResult<UpdateOutcome> {
        let value = value.trim();
        let outcome = self.modify(task_id, |task| {
            let is_epic = task.task_type == TaskType::Epic;
            let mut task = task.clone();
            if is_epic_priority {
                if !is_epic {
                    return Err(TaskServiceError::Validation {
                        field: "epic_priority",
                        reason: format!("epic_priority is only valid for Epics, not {}", task.task_type),
                    });
                }
                let parsed = EpicPriority::parse(value).ok_or_else(|| {
                    invalid_label("epic_priority", value, EpicPriority::allowed_labels())
                })?;
                if task.epic_priority == Some(parsed) {
                    return Ok(None);
                }
                task.epic_priority = Some(parsed);
            } else {
                if is_epic {
                    return Err(TaskServiceError::Validation {
                        field: "priority",
                        reason: "Epics cannot have priority; use epic_priority".to_string(),
                    });
                }
                let parsed = Priority::parse(value)
                    .ok_or_else(|| invalid_label("priority", value, Priority::allowed_labels()))?;
                if task.priority == Some(parsed) {
                    return Ok(None);
                }
                task.priority = Some(parsed);
            }
            Ok(Some(task))
        })?;
        if outcome.changed {
            let task = &outcome.task;
            self.emit_task_update(
                task,
                json!({
                    "priority": task.priority,
                    "epic_priority": task.epic_priority,
                }),
            );
        }
        Ok(outcome)
    }

    pub(crate) fn set_contributor(
        &mut self,
        task_id: TaskId,
        contributor_id: Option<ContributorId>,
    ) -> ServiceResult<UpdateOutcome> {
        let tasks = self.tasks();
        let mut task = tasks.require_task(task_id)?;
        let Some(contributor_id) = contributor_id else {
            return Ok(UpdateOutcome {
                task,
                changed: false,
            });
        };
        if task.contributor_id == Some(contributor_id) {
            return Ok(UpdateOutcome {
                task,
                changed: false,
            });
        }
        let contributor = self.require_contributor(contributor_id)?;
        self.add_member(task.project_id, &contributor)?;

        task.contributor_id = Some(contributor_id);
        let task = tasks.update_task(&task)?;
        self.emit_task_update(
            &task,
            json!({
                "contributor_id": contributor.id,
                "contributor": contributor.name,
            }),
        );
        Ok(UpdateOutcome {
            task,
            changed: true,
        })
    }

    /// Moves a task and its descendants into another project.
    ///
    /// A moved User Story loses its Epic (it becomes an orphan of the target
    /// project). Subtasks only move together with their User Story.
    pub(crate) fn move_to_project(
        &mut self,
        task_id: TaskId,
        project_id: ProjectId,
    ) -> ServiceResult<UpdateOutcome> {
        let tasks = self.tasks();
        let task = tasks.require_task(task_id)?;
        if task.project_id == project_id {
            return Ok(UpdateOutcome {
                task,
                changed: false,
            });
        }
        self.require_project(project_id)?;
        if task.task_type == TaskType::Subtask {
            return Err(match task.parent_id {
                Some(parent_id) => HierarchyError::CrossProjectParent {
                    parent_id,
                    parent_project_id: task.project_id,
                    project_id,
                },
                None => HierarchyError::SubtaskRequiresParent,
            }
            .into());
        }
        if task.is_no_epic_bucket() {
            return Err(TaskServiceError::Validation {
                field: "project_id",
                reason: "the No Epic bucket cannot change project".to_string(),
            });
        }

        let old_parent = task.parent_id;
        let mut moved = Vec::new();
        for entry in tasks.list_subtree(task_id)? {
            let mut row = tasks.require_task(entry.id)?;
            row.project_id = project_id;
            if row.id == task_id {
                if row.task_type == TaskType::UserStory {
                    row.parent_id = None;
                }
                row.sort_order = tasks.next_sort_order(SiblingScope::of(&row))?;
            }
            tasks.update_task(&row)?;
            if let Some(contributor_id) = row.contributor_id {
                let contributor = self.require_contributor(contributor_id)?;
                self.add_member(project_id, &contributor)?;
            }
            moved.push(row.id);
        }

        let task = tasks.require_task(task_id)?;
        self.emit_task_update(
            &task,
            json!({
                "moved_task_ids": moved,
            }),
        );
        if task.parent_id != old_parent {
            self.emit(
                EventName::TaskParentUpdated,
                json!({
                    "task_id": task.id,
                    "parent_id": task.parent_id,
                    "old_parent_id": old_parent,
                    "project_id": task.project_id,
                }),
            );
        }
        Ok(UpdateOutcome {
            task,
            changed: true,
        })
    }

    pub(crate) fn set_estimate(
        &mut self,
        task_id: TaskId,
        value: i64,
        estimate_type: EstimateType,
    ) -> ServiceResult<UpdateOutcome> {
        ensure_non_negative(estimate_field(estimate_type), value)?;
        let outcome = self.modify(task_id, |task| {
            let mut task = task.clone();
            Ok(task.apply_estimate(estimate_type, value).then_some(task))
        })?;
        if outcome.changed {
            let task = &outcome.task;
            self.emit_task_update(
                task,
                json!({
                    "estimate_type": task.estimate_type,
                    "story_points": task.story_points,
                    "time_estimate": task.time_estimate,
                }),
            );
        }
        Ok(outcome)
    }

    pub(crate) fn rename(&mut self, task_id: TaskId, name: &str) -> ServiceResult<UpdateOutcome> {
        let name = normalize_name("name", name)?;
        let outcome = self.modify(task_id, |task| {
            if task.name == name {
                return Ok(None);
            }
            if task.is_no_epic_bucket() {
                return Err(TaskServiceError::Validation {
                    field: "name",
                    reason: "the No Epic bucket cannot be renamed".to_string(),
                });
            }
            reject_reserved_epic_name(&name, task.task_type)?;
            let mut task = task.clone();
            task.name = name.clone();
            Ok(Some(task))
        })?;
        if outcome.changed {
            let payload = json!({ "name": outcome.task.name });
            self.emit_task_update(&outcome.task, payload);
        }
        Ok(outcome)
    }

    pub(crate) fn set_description(
        &mut self,
        task_id: TaskId,
        description: Option<&str>,
    ) -> ServiceResult<UpdateOutcome> {
        let description = description
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string);
        let outcome = self.modify(task_id, |task| {
            if task.description == description {
                return Ok(None);
            }
            let mut task = task.clone();
            task.description = description.clone();
            Ok(Some(task))
        })?;
        if outcome.changed {
            let payload = json!({ "description": outcome.task.description });
            self.emit_task_update(&outcome.task, payload);
        }
        Ok(outcome)
    }

    /// Archives or restores a task together with its descendants.
    pub(crate) fn set_archived(
        &mut self,
        task_id: TaskId,
        archived: bool,
    ) -> ServiceResult<UpdateOutcome> {
        let tasks = self.tasks();
        tasks.require_task(task_id)?;
        let mut affected = Vec::new();
        for entry in tasks.list_subtree(task_id)? {
            let mut row = tasks.require_task(entry.id)?;
            if row.is_archived == archived {
                continue;
            }
            row.is_archived = archived;
            tasks.update_task(&row)?;
            affected.push(row.id);
        }
        let task = tasks.require_task(task_id)?;
        let changed = !affected.is_empty();
        if changed {
            self.emit_task_update(
                &task,
                json!({
                    "is_archived": archived,
                    "affected_task_ids": affected,
                }),
            );
        }
        Ok(UpdateOutcome { task, changed })
    }

    /// Moves a task to `new_index` among its siblings and renumbers the
    /// whole scope `0..n`.
    pub(crate) fn reorder(&mut self, task_id: TaskId, new_index: i64) -> ServiceResult<ReorderOutcome> {
        let tasks = self.tasks();
        let task = tasks.require_task(task_id)?;
        let scope = SiblingScope::of(&task);
        let siblings = tasks.list_scope(scope)?;
        let current: HashMap<TaskId, i64> = siblings
            .iter()
            .map(|sibling| (sibling.id, sibling.sort_order))
            .collect();

        let mut order: Vec<TaskId> = siblings
            .iter()
            .map(|sibling| sibling.id)
            .filter(|id| *id != task_id)
            .collect();
        let index = usize::try_from(new_index.max(0))
            .unwrap_or(usize::MAX)
            .min(order.len());
        order.insert(index, task_id);

        let mut changed = false;
        for (position, id) in order.iter().enumerate() {
            let position = i64::try_from(position).map_err(|_| TaskServiceError::Validation {
                field: "new_index",
                reason: "sibling scope too large".to_string(),
            })?;
            if current.get(id) != Some(&position) {
                tasks.set_sort_order(*id, position)?;
                changed = true;
            }
        }

        let task = tasks.require_task(task_id)?;
        if changed {
            self.emit(
                EventName::TaskSorted,
                json!({
                    "task_id": task.id,
                    "new_index": index,
                    "parent_id": scope.parent_id(),
                    "project_id": task.project_id,
                }),
            );
        }
        Ok(ReorderOutcome {
            task,
            new_index: index,
            changed,
        })
    }

    /// Deletes a task, or its whole subtree when `cascade_children` is set.
    /// Returns deleted ids, deepest first.
    pub(crate) fn delete(&mut self, task_id: TaskId, cascade_children: bool) -> ServiceResult<Vec<TaskId>> {
        let tasks = self.tasks();
        tasks.require_task(task_id)?;
        let child_count = tasks.count_children(task_id)?;
        if child_count > 0 && !cascade_children {
            return Err(TaskServiceError::HasChildren {
                task_id,
                child_count,
            });
        }

        let mut doomed = tasks.list_subtree(task_id)?;
        doomed.reverse();
        let mut deleted = Vec::with_capacity(doomed.len());
        for entry in doomed {
            tasks.delete_task(entry.id)?;
            deleted.push(entry.id);
        }
        Ok(deleted)
    }

    pub(crate) fn create(&mut self, new_task: &NewTask) -> ServiceResult<Task> {
        let name = normalize_name("name", &new_task.name)?;
        let task_type = new_task.task_type;
        reject_reserved_epic_name(&name, task_type)?;
        let project_id = match new_task.project_id {
            Some(project_id) => self.require_project(project_id)?.id,
            None => self.ensure_project(MISCELLANEOUS_PROJECT_NAME)?.id,
        };
        let parent_id = match new_task.parent {
            Some(target) => self.resolve_parent(task_type, project_id, target)?,
            None => None,
        };

        let tasks = self.tasks();
        validate_parent_assignment(&tasks, None, task_type, project_id, parent_id)?;
        let (priority, epic_priority) =
            initial_priorities(task_type, new_task.priority, new_task.epic_priority)?;
        let (estimate_type, story_points, time_estimate) = initial_estimate(new_task)?;
        let contributor = new_task
            .contributor_id
            .map(|contributor_id| self.require_contributor(contributor_id))
            .transpose()?;

        if let Some(existing) = tasks.find_by_identity(&name, project_id, task_type)? {
            match self.config.duplicate_policy {
                DuplicatePolicy::Reject => {
                    return Err(TaskServiceError::DuplicateTask {
                        existing_id: existing.id,
                    })
                }
                DuplicatePolicy::Warn => warn!(
                    "event=task_create module=service status=duplicate project_id={} task_type={} existing_id={}",
                    project_id, task_type, existing.id
                ),
                DuplicatePolicy::Allow => {}
            }
        }

        let status = new_task.status.unwrap_or_default();
        let (completed, completed_date) = completion_for(status, now_epoch_ms());
        let sort_order =
            tasks.next_sort_order(SiblingScope::for_placement(parent_id, project_id, task_type))?;
        let task = tasks.insert_task(&Task {
            id: 0,
            name,
            description: new_task
                .description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            task_type,
            parent_id,
            project_id,
            contributor_id: contributor.as_ref().map(|contributor| contributor.id),
            estimate_type,
            story_points,
            time_estimate,
            priority,
            epic_priority,
            status,
            completed,
            completed_date,
            is_archived: false,
            sort_order,
            created_at: 0,
            updated_at: 0,
        })?;

        if let Some(contributor) = &contributor {
            self.add_member(project_id, contributor)?;
        }
        let view = tasks.get_task_view(task.id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Task,
            id: task.id,
        })?;
        let payload = serde_json::to_value(&view)
            .map_err(|err| RepoError::InvalidData(format!("task view serialization: {err}")))?;
        self.emit(EventName::TaskCreated, payload);
        Ok(task)
    }

    /// Applies a partial payload as one change set.
    pub(crate) fn apply_payload(
        &mut self,
        task_id: TaskId,
        payload: &TaskPayload,
    ) -> ServiceResult<UpdateOutcome> {
        let mut changed = false;

        if let Some(project_id) = payload.project_id {
            changed |= self.move_to_project(task_id, project_id)?.changed;
        }
        if payload.task_type.is_some() || payload.parent.is_some() {
            changed |= self.place(task_id, payload.task_type, payload.parent)?.changed;
        }
        if let Some(name) = &payload.name {
            changed |= self.rename(task_id, name)?.changed;
        }
        if let Some(description) = &payload.description {
            changed |= self.set_description(task_id, Some(description))?.changed;
        }
        if let Some(status) = payload.status {
            changed |= self.set_status(task_id, status)?.changed;
        }
        if let Some(priority) = payload.priority {
            changed |= self.set_priority(task_id, priority.as_str(), false)?.changed;
        }
        if let Some(epic_priority) = payload.epic_priority {
            changed |= self.set_priority(task_id, epic_priority.as_str(), true)?.changed;
        }
        if let Some((estimate_type, value)) = self.payload_estimate(task_id, payload)? {
            changed |= self.set_estimate(task_id, value, estimate_type)?.changed;
        }
        if payload.contributor_id.is_some() {
            changed |= self.set_contributor(task_id, payload.contributor_id)?.changed;
        }
        if let Some(archived) = payload.is_archived {
            changed |= self.set_archived(task_id, archived)?.changed;
        }

        Ok(UpdateOutcome {
            task: self.tasks().require_task(task_id)?,
            changed,
        })
    }

    fn payload_estimate(
        &self,
        task_id: TaskId,
        payload: &TaskPayload,
    ) -> ServiceResult<Option<(EstimateType, i64)>> {
        let estimate = match payload.estimate_type {
            Some(estimate_type) => {
                let given = match estimate_type {
                    EstimateType::StoryPoints => payload.story_points,
                    EstimateType::Time => payload.time_estimate,
                };
                let value = match given {
                    Some(value) => value,
                    None => {
                        let task = self.tasks().require_task(task_id)?;
                        let current = match estimate_type {
                            EstimateType::StoryPoints => task.story_points,
                            EstimateType::Time => task.time_estimate,
                        };
                        current.unwrap_or(0)
                    }
                };
                Some((estimate_type, value))
            }
            None => payload
                .story_points
                .map(|value| (EstimateType::StoryPoints, value))
                .or_else(|| payload.time_estimate.map(|value| (EstimateType::Time, value))),
        };
        Ok(estimate)
    }

    /// Find-or-create by exact project name; a losing concurrent insert
    /// re-fetches the winner.
    pub(crate) fn ensure_project(&self, name: &str) -> ServiceResult<Project> {
        let projects = self.projects();
        if let Some(project) = projects.find_project_by_name(name)? {
            return Ok(project);
        }
        match projects.create_project(name, None) {
            Ok(project) => {
                info!(
                    "event=project_create module=service status=ok project_id={} sentinel=true",
                    project.id
                );
                Ok(project)
            }
            Err(err) if err.is_constraint_violation() => projects
                .find_project_by_name(name)?
                .ok_or_else(|| TaskServiceError::from(err)),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<Project> {
        let name = normalize_name("name", name)?;
        match self.projects().create_project(&name, description) {
            Ok(project) => Ok(project),
            Err(err) if err.is_constraint_violation() => Err(TaskServiceError::Conflict(format!(
                "project `{name}` already exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn delete_project(&self, project_id: ProjectId) -> ServiceResult<usize> {
        self.require_project(project_id)?;
        Ok(self.projects().delete_project(project_id)?)
    }

    pub(crate) fn create_contributor(&self, name: &str) -> ServiceResult<Contributor> {
        let name = normalize_name("name", name)?;
        Ok(self.projects().create_contributor(&name)?)
    }

    /// Adds membership and emits `update_contributors` when it is new.
    pub(crate) fn add_member(
        &mut self,
        project_id: ProjectId,
        contributor: &Contributor,
    ) -> ServiceResult<bool> {
        let added = self.projects().add_member(project_id, contributor.id)?;
        if added {
            self.emit(
                EventName::UpdateContributors,
                json!({
                    "project_id": project_id,
                    "contributor_id": contributor.id,
                    "contributor": contributor.name,
                }),
            );
        }
        Ok(added)
    }

    /// Ensures the bucket exists and reattaches orphaned User Stories.
    pub(crate) fn repair_project(&self, project_id: ProjectId) -> ServiceResult<Vec<TaskId>> {
        let tasks = self.tasks();
        ensure_no_epic_bucket(&tasks, project_id)?;
        Ok(repair_orphan_user_stories(&tasks, project_id)?)
    }

    /// Reattaches orphaned User Stories; creates the bucket only if needed.
    pub(crate) fn repair_orphans(&self, project_id: ProjectId) -> ServiceResult<Vec<TaskId>> {
        Ok(repair_orphan_user_stories(&self.tasks(), project_id)?)
    }

    pub(crate) fn require_project(&self, project_id: ProjectId) -> ServiceResult<Project> {
        self.projects()
            .get_project(project_id)?
            .ok_or(TaskServiceError::NotFound {
                entity: EntityKind::Project,
                id: project_id,
            })
    }

    pub(crate) fn require_contributor(
        &self,
        contributor_id: ContributorId,
    ) -> ServiceResult<Contributor> {
        self.projects()
            .get_contributor(contributor_id)?
            .ok_or(TaskServiceError::NotFound {
                entity: EntityKind::Contributor,
                id: contributor_id,
            })
    }
}

/// Trims a required name; blank is a validation error on `field`.
pub(crate) fn normalize_name(field: &'static str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskServiceError::Validation {
            field,
            reason: "must not be blank".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// The bucket name belongs to the sentinel; user Epics may not take it.
fn reject_reserved_epic_name(name: &str, task_type: TaskType) -> ServiceResult<()> {
    if task_type == TaskType::Epic && name == NO_EPIC_BUCKET_NAME {
        return Err(TaskServiceError::Validation {
            field: "name",
            reason: format!("`{NO_EPIC_BUCKET_NAME}` is reserved for the project's bucket"),
        });
    }
    Ok(())
}

fn invalid_label(field: &'static str, value: &str, allowed: String) -> TaskServiceError {
    TaskServiceError::Validation {
        field,
        reason: format!("`{value}` is not one of: {allowed}"),
    }
}

fn estimate_field(estimate_type: EstimateType) -> &'static str {
    match estimate_type {
        EstimateType::StoryPoints => "story_points",
        EstimateType::Time => "time_estimate",
    }
}

fn ensure_non_negative(field: &'static str, value: i64) -> ServiceResult<()> {
    if value < 0 {
        return Err(TaskServiceError::Validation {
            field,
            reason: format!("must not be negative, got {value}"),
        });
    }
    Ok(())
}

fn initial_priorities(
    task_type: TaskType,
    priority: Option<Priority>,
    epic_priority: Option<EpicPriority>,
) -> ServiceResult<(Option<Priority>, Option<EpicPriority>)> {
    match task_type {
        TaskType::Epic => {
            if priority.is_some() {
                return Err(TaskServiceError::Validation {
                    field: "priority",
                    reason: "Epics cannot have priority; use epic_priority".to_string(),
                });
            }
            Ok((None, Some(epic_priority.unwrap_or(EpicPriority::Unset))))
        }
        TaskType::UserStory | TaskType::Subtask => {
            if epic_priority.is_some() {
                return Err(TaskServiceError::Validation {
                    field: "epic_priority",
                    reason: format!("epic_priority is only valid for Epics, not {task_type}"),
                });
            }
            Ok((Some(priority.unwrap_or(Priority::Unset)), None))
        }
    }
}

fn initial_estimate(new_task: &NewTask) -> ServiceResult<(EstimateType, Option<i64>, Option<i64>)> {
    let estimate_type = new_task.estimate_type.unwrap_or(
        if new_task.time_estimate.is_some() && new_task.story_points.is_none() {
            EstimateType::Time
        } else {
            EstimateType::StoryPoints
        },
    );
    let (story_points, time_estimate) = match estimate_type {
        EstimateType::StoryPoints => (new_task.story_points, None),
        EstimateType::Time => (None, new_task.time_estimate),
    };
    for value in [story_points, time_estimate].into_iter().flatten() {
        ensure_non_negative(estimate_field(estimate_type), value)?;
    }
    Ok((estimate_type, story_points, time_estimate))
}
