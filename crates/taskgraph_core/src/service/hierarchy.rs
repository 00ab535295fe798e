//! Hierarchy validation rules.
//!
//! # Responsibility
//! - Decide whether a proposed parent/type assignment is legal.
//! - Detect parent-chain cycles without recursion.
//!
//! # Invariants
//! - Every function here is read-only. Callers commit changes only after a
//!   successful validation, inside the same transaction.
//! - Cycle walks terminate on corrupt data: a visited set bounds them.

use crate::model::task::{ProjectId, Task, TaskId, TaskType};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::{RepoError, RepoResult};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Columns of a task that hierarchy rules read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyNode {
    pub id: TaskId,
    pub task_type: TaskType,
    pub parent_id: Option<TaskId>,
    pub project_id: ProjectId,
}

impl From<&Task> for HierarchyNode {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            task_type: task.task_type,
            parent_id: task.parent_id,
            project_id: task.project_id,
        }
    }
}

/// Id-keyed read access to the task graph.
pub trait HierarchyLookup {
    fn node(&self, id: TaskId) -> RepoResult<Option<HierarchyNode>>;
    fn children(&self, id: TaskId) -> RepoResult<Vec<HierarchyNode>>;
}

impl HierarchyLookup for SqliteTaskRepository<'_> {
    fn node(&self, id: TaskId) -> RepoResult<Option<HierarchyNode>> {
        Ok(self
            .hierarchy_row(id)?
            .map(|(task_type, parent_id, project_id)| HierarchyNode {
                id,
                task_type,
                parent_id,
                project_id,
            }))
    }

    fn children(&self, id: TaskId) -> RepoResult<Vec<HierarchyNode>> {
        Ok(self
            .list_children(id)?
            .iter()
            .map(HierarchyNode::from)
            .collect())
    }
}

/// In-memory task graph keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TaskArena {
    nodes: HashMap<TaskId, HierarchyNode>,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut arena = Self::new();
        for task in tasks {
            arena.insert(HierarchyNode::from(task));
        }
        arena
    }

    /// Inserts or replaces one node.
    pub fn insert(&mut self, node: HierarchyNode) {
        self.nodes.insert(node.id, node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl HierarchyLookup for TaskArena {
    fn node(&self, id: TaskId) -> RepoResult<Option<HierarchyNode>> {
        Ok(self.nodes.get(&id).copied())
    }

    fn children(&self, id: TaskId) -> RepoResult<Vec<HierarchyNode>> {
        let mut children: Vec<_> = self
            .nodes
            .values()
            .filter(|node| node.parent_id == Some(id))
            .copied()
            .collect();
        children.sort_by_key(|node| node.id);
        Ok(children)
    }
}

/// Rule violations reported by the validator.
#[derive(Debug)]
pub enum HierarchyError {
    SelfParent {
        task_id: TaskId,
    },
    SubtaskRequiresParent,
    ParentNotFound(TaskId),
    InvalidParentType {
        task_type: TaskType,
        parent_type: TaskType,
    },
    CrossProjectParent {
        parent_id: TaskId,
        parent_project_id: ProjectId,
        project_id: ProjectId,
    },
    CircularReference {
        task_id: TaskId,
        parent_id: TaskId,
    },
    /// A retype would leave an existing child under an invalid parent.
    IncompatibleChild {
        child_id: TaskId,
        child_type: TaskType,
        new_type: TaskType,
    },
    Lookup(RepoError),
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfParent { task_id } => {
                write!(f, "task {task_id} cannot be its own parent")
            }
            Self::SubtaskRequiresParent => {
                write!(f, "Subtasks must have a User Story as a parent")
            }
            Self::ParentNotFound(id) => write!(f, "parent task not found: {id}"),
            Self::InvalidParentType {
                task_type,
                parent_type,
            } => match task_type {
                TaskType::Epic => write!(f, "Epics cannot have a parent task (got {parent_type})"),
                TaskType::UserStory => write!(
                    f,
                    "User Stories must have an Epic as a parent (got {parent_type})"
                ),
                TaskType::Subtask => write!(
                    f,
                    "Subtasks must have a User Story as a parent (got {parent_type})"
                ),
            },
            Self::CrossProjectParent {
                parent_id,
                parent_project_id,
                project_id,
            } => write!(
                f,
                "parent task {parent_id} belongs to project {parent_project_id}, not {project_id}"
            ),
            Self::CircularReference { task_id, parent_id } => write!(
                f,
                "circular reference: task {task_id} is an ancestor of {parent_id}"
            ),
            Self::IncompatibleChild {
                child_id,
                child_type,
                new_type,
            } => write!(
                f,
                "child task {child_id} ({child_type}) cannot stay under a {new_type}"
            ),
            Self::Lookup(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HierarchyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lookup(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for HierarchyError {
    fn from(value: RepoError) -> Self {
        Self::Lookup(value)
    }
}

/// Parent types a task of `task_type` may hang under.
pub fn valid_parent_types(task_type: TaskType) -> &'static [TaskType] {
    match task_type {
        TaskType::Epic => &[],
        TaskType::UserStory => &[TaskType::Epic],
        TaskType::Subtask => &[TaskType::UserStory],
    }
}

/// Checks a proposed parent for a task.
///
/// `task_id` is `None` for tasks not yet persisted.
pub fn validate_parent_assignment(
    lookup: &impl HierarchyLookup,
    task_id: Option<TaskId>,
    task_type: TaskType,
    project_id: ProjectId,
    candidate_parent_id: Option<TaskId>,
) -> HierarchyResult<()> {
    let Some(parent_id) = candidate_parent_id else {
        return match task_type {
            TaskType::Epic | TaskType::UserStory => Ok(()),
            TaskType::Subtask => Err(HierarchyError::SubtaskRequiresParent),
        };
    };
    if task_id == Some(parent_id) {
        return Err(HierarchyError::SelfParent { task_id: parent_id });
    }

    let parent = lookup
        .node(parent_id)?
        .ok_or(HierarchyError::ParentNotFound(parent_id))?;
    if !valid_parent_types(task_type).contains(&parent.task_type) {
        return Err(HierarchyError::InvalidParentType {
            task_type,
            parent_type: parent.task_type,
        });
    }
    if parent.project_id != project_id {
        return Err(HierarchyError::CrossProjectParent {
            parent_id,
            parent_project_id: parent.project_id,
            project_id,
        });
    }

    if let Some(task_id) = task_id {
        if detect_cycle(lookup, parent_id, task_id)? {
            return Err(HierarchyError::CircularReference { task_id, parent_id });
        }
    }
    Ok(())
}

/// Walks the parent chain from `start_parent_id`.
///
/// Returns `true` when the walk reaches `exclude_task_id` or revisits a
/// node. A missing node or a null parent ends the walk with `false`.
pub fn detect_cycle(
    lookup: &impl HierarchyLookup,
    start_parent_id: TaskId,
    exclude_task_id: TaskId,
) -> HierarchyResult<bool> {
    let mut visited = HashSet::new();
    let mut cursor = Some(start_parent_id);
    while let Some(current) = cursor {
        if current == exclude_task_id || !visited.insert(current) {
            return Ok(true);
        }
        cursor = match lookup.node(current)? {
            Some(node) => node.parent_id,
            None => None,
        };
    }
    Ok(false)
}

/// Checks that every existing child of `task_id` stays valid once the task
/// becomes `new_type`.
pub fn validate_children_for_type(
    lookup: &impl HierarchyLookup,
    task_id: TaskId,
    new_type: TaskType,
) -> HierarchyResult<()> {
    for child in lookup.children(task_id)? {
        if !valid_parent_types(child.task_type).contains(&new_type) {
            return Err(HierarchyError::IncompatibleChild {
                child_id: child.id,
                child_type: child.task_type,
                new_type,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: TaskId, task_type: TaskType, parent_id: Option<TaskId>) -> HierarchyNode {
        HierarchyNode {
            id,
            task_type,
            parent_id,
            project_id: 1,
        }
    }

    fn sample_arena() -> TaskArena {
        let mut arena = TaskArena::new();
        arena.insert(node(1, TaskType::Epic, None));
        arena.insert(node(2, TaskType::UserStory, Some(1)));
        arena.insert(node(3, TaskType::Subtask, Some(2)));
        arena.insert(node(4, TaskType::Epic, None));
        arena
    }

    #[test]
    fn arena_insert_replaces_by_id() {
        let mut arena = TaskArena::new();
        assert!(arena.is_empty());

        arena.insert(node(2, TaskType::UserStory, None));
        arena.insert(node(2, TaskType::UserStory, Some(1)));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.node(2).unwrap().unwrap().parent_id, Some(1));

        let mut arena = sample_arena();
        arena.insert(node(5, TaskType::UserStory, Some(4)));
        assert_eq!(arena.len(), 5);
        assert!(!arena.is_empty());
    }

    #[test]
    fn valid_parent_types_follow_levels() {
        assert!(valid_parent_types(TaskType::Epic).is_empty());
        assert_eq!(valid_parent_types(TaskType::UserStory), &[TaskType::Epic]);
        assert_eq!(valid_parent_types(TaskType::Subtask), &[TaskType::UserStory]);
    }

    #[test]
    fn subtask_under_epic_is_rejected_with_readable_reason() {
        let arena = sample_arena();
        let err = validate_parent_assignment(&arena, None, TaskType::Subtask, 1, Some(1))
            .unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::InvalidParentType {
                task_type: TaskType::Subtask,
                parent_type: TaskType::Epic
            }
        ));
        assert!(err
            .to_string()
            .contains("Subtasks must have a User Story as a parent"));

        validate_parent_assignment(&arena, None, TaskType::Subtask, 1, Some(2)).unwrap();
    }

    #[test]
    fn null_parent_depends_on_type() {
        let arena = sample_arena();
        validate_parent_assignment(&arena, None, TaskType::Epic, 1, None).unwrap();
        validate_parent_assignment(&arena, None, TaskType::UserStory, 1, None).unwrap();
        assert!(matches!(
            validate_parent_assignment(&arena, None, TaskType::Subtask, 1, None),
            Err(HierarchyError::SubtaskRequiresParent)
        ));
    }

    #[test]
    fn self_parent_and_missing_parent_are_rejected() {
        let arena = sample_arena();
        assert!(matches!(
            validate_parent_assignment(&arena, Some(2), TaskType::UserStory, 1, Some(2)),
            Err(HierarchyError::SelfParent { task_id: 2 })
        ));
        assert!(matches!(
            validate_parent_assignment(&arena, Some(2), TaskType::UserStory, 1, Some(99)),
            Err(HierarchyError::ParentNotFound(99))
        ));
    }

    #[test]
    fn epic_never_accepts_a_parent() {
        let arena = sample_arena();
        assert!(matches!(
            validate_parent_assignment(&arena, Some(4), TaskType::Epic, 1, Some(1)),
            Err(HierarchyError::InvalidParentType { .. })
        ));
    }

    #[test]
    fn parent_in_other_project_is_rejected() {
        let mut arena = sample_arena();
        arena.insert(HierarchyNode {
            id: 10,
            task_type: TaskType::Epic,
            parent_id: None,
            project_id: 2,
        });
        assert!(matches!(
            validate_parent_assignment(&arena, Some(2), TaskType::UserStory, 1, Some(10)),
            Err(HierarchyError::CrossProjectParent {
                parent_id: 10,
                parent_project_id: 2,
                project_id: 1
            })
        ));
    }

    #[test]
    fn ancestor_chain_reaching_task_is_circular() {
        // Only reachable through corrupt types, so the arena holds
        // user stories chained under each other.
        let mut arena = TaskArena::new();
        arena.insert(node(1, TaskType::Epic, Some(3)));
        arena.insert(node(2, TaskType::UserStory, Some(1)));
        arena.insert(node(3, TaskType::UserStory, Some(2)));
        assert!(detect_cycle(&arena, 1, 3).unwrap());
        assert!(matches!(
            validate_parent_assignment(&arena, Some(3), TaskType::UserStory, 1, Some(1)),
            Err(HierarchyError::CircularReference {
                task_id: 3,
                parent_id: 1
            })
        ));
    }

    #[test]
    fn corrupt_cycle_not_involving_task_terminates() {
        let mut arena = TaskArena::new();
        arena.insert(node(1, TaskType::Epic, Some(2)));
        arena.insert(node(2, TaskType::Epic, Some(1)));
        assert!(detect_cycle(&arena, 1, 42).unwrap());
    }

    #[test]
    fn chain_ending_at_root_or_missing_node_is_acyclic() {
        let arena = sample_arena();
        assert!(!detect_cycle(&arena, 2, 4).unwrap());
        assert!(!detect_cycle(&arena, 77, 4).unwrap());
    }

    #[test]
    fn retype_checks_existing_children() {
        let arena = sample_arena();
        validate_children_for_type(&arena, 2, TaskType::UserStory).unwrap();
        assert!(matches!(
            validate_children_for_type(&arena, 2, TaskType::Epic),
            Err(HierarchyError::IncompatibleChild {
                child_id: 3,
                child_type: TaskType::Subtask,
                new_type: TaskType::Epic
            })
        ));
        assert!(validate_children_for_type(&arena, 1, TaskType::Subtask).is_err());
        validate_children_for_type(&arena, 4, TaskType::Subtask).unwrap();
    }
}
