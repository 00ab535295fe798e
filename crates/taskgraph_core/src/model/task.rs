//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record and its closed value sets.
//! - Own the field-level couplings that every write path must preserve.
//!
//! # Invariants
//! - `status == Completed` <=> `completed` and `completed_date` is set.
//! - Epics carry `epic_priority` only; other types carry `priority` only.
//! - Exactly the estimate selected by `estimate_type` may be populated.
//! - Epics never have a parent.
//!
//! Tree-shape rules (valid parent types, acyclicity) need other rows and
//! live in `service::hierarchy`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable task identifier (SQLite rowid).
pub type TaskId = i64;
/// Stable project identifier (SQLite rowid).
pub type ProjectId = i64;
/// Stable contributor identifier (SQLite rowid).
pub type ContributorId = i64;

/// Name of the per-project sentinel Epic holding orphaned user stories.
pub const NO_EPIC_BUCKET_NAME: &str = "No Epic";

macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $label)] $variant,)+
        }

        impl $name {
            /// Every accepted value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Returns the persisted/wire label.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// Parses an exact wire label.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Comma separated list of accepted labels for error messages.
            pub fn allowed_labels() -> String {
                Self::ALL
                    .iter()
                    .map(|value| value.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labeled_enum! {
    /// Level of a task inside the Epic -> User Story -> Subtask tree.
    pub enum TaskType {
        /// Top-level grouping; never has a parent.
        Epic => "Epic",
        /// Mid-level item; parent is an Epic (or none, pending repair).
        UserStory => "User Story",
        /// Leaf item; parent is always a User Story.
        Subtask => "Subtask",
    }
}

labeled_enum! {
    /// Workflow status; drives `completed` and `completed_date`.
    pub enum TaskStatus {
        NotStarted => "Not Started",
        InProgress => "In Progress",
        Completed => "Completed",
        Archived => "Archived",
    }
}

labeled_enum! {
    /// Priority for User Stories and Subtasks.
    pub enum Priority {
        Unset => "Unset",
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
}

labeled_enum! {
    /// Priority for Epics.
    pub enum EpicPriority {
        Unset => "Unset",
        P0 => "P0",
        P1 => "P1",
        P2 => "P2",
        P3 => "P3",
        P4 => "P4",
    }
}

labeled_enum! {
    /// Which estimate field is authoritative for a task.
    pub enum EstimateType {
        StoryPoints => "story_points",
        Time => "time",
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl Default for EstimateType {
    fn default() -> Self {
        Self::StoryPoints
    }
}

/// Field-level invariant violations detected by [`Task::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    BlankName,
    EpicWithParent,
    PriorityOnEpic,
    EpicPriorityOnNonEpic,
    CompletionMismatch,
    EstimateConflict,
    NegativeEstimate(i64),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "task name must not be blank"),
            Self::EpicWithParent => write!(f, "Epics cannot have a parent task"),
            Self::PriorityOnEpic => write!(f, "Epics cannot have priority"),
            Self::EpicPriorityOnNonEpic => {
                write!(f, "epic_priority is only valid for Epics")
            }
            Self::CompletionMismatch => write!(
                f,
                "completed/completed_date must follow status (Completed only)"
            ),
            Self::EstimateConflict => write!(
                f,
                "only the estimate selected by estimate_type may be populated"
            ),
            Self::NegativeEstimate(value) => {
                write!(f, "estimate must not be negative, got {value}")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    /// `None` means top-level within the project.
    pub parent_id: Option<TaskId>,
    pub project_id: ProjectId,
    pub contributor_id: Option<ContributorId>,
    pub estimate_type: EstimateType,
    pub story_points: Option<i64>,
    /// Minutes.
    pub time_estimate: Option<i64>,
    pub priority: Option<Priority>,
    pub epic_priority: Option<EpicPriority>,
    pub status: TaskStatus,
    pub completed: bool,
    /// Epoch ms.
    pub completed_date: Option<i64>,
    pub is_archived: bool,
    /// Position inside the sibling scope.
    pub sort_order: i64,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

/// Returns the priority pair a freshly typed task starts with.
pub fn default_priorities(task_type: TaskType) -> (Option<Priority>, Option<EpicPriority>) {
    match task_type {
        TaskType::Epic => (None, Some(EpicPriority::Unset)),
        TaskType::UserStory | TaskType::Subtask => (Some(Priority::Unset), None),
    }
}

/// Derives `(completed, completed_date)` from a status.
pub fn completion_for(status: TaskStatus, now_ms: i64) -> (bool, Option<i64>) {
    match status {
        TaskStatus::Completed => (true, Some(now_ms)),
        _ => (false, None),
    }
}

impl Task {
    /// Sets status and the derived completion fields.
    ///
    /// Returns `false` without touching anything when status is unchanged,
    /// so an already-completed task keeps its original `completed_date`.
    pub fn apply_status(&mut self, status: TaskStatus, now_ms: i64) -> bool {
        if self.status == status {
            return false;
        }
        let (completed, completed_date) = completion_for(status, now_ms);
        self.status = status;
        self.completed = completed;
        self.completed_date = completed_date;
        true
    }

    /// Changes the task type and swaps the priority field to the one the
    /// new type uses. The previous priority value is dropped.
    pub fn apply_task_type(&mut self, task_type: TaskType) -> bool {
        if self.task_type == task_type {
            return false;
        }
        let was_epic = self.task_type == TaskType::Epic;
        let is_epic = task_type == TaskType::Epic;
        self.task_type = task_type;
        if was_epic != is_epic {
            let (priority, epic_priority) = default_priorities(task_type);
            self.priority = priority;
            self.epic_priority = epic_priority;
        }
        true
    }

    /// Selects one estimate field and clears the other.
    pub fn apply_estimate(&mut self, estimate_type: EstimateType, value: i64) -> bool {
        let current = match estimate_type {
            EstimateType::StoryPoints => self.story_points,
            EstimateType::Time => self.time_estimate,
        };
        if self.estimate_type == estimate_type && current == Some(value) {
            return false;
        }
        self.estimate_type = estimate_type;
        match estimate_type {
            EstimateType::StoryPoints => {
                self.story_points = Some(value);
                self.time_estimate = None;
            }
            EstimateType::Time => {
                self.time_estimate = Some(value);
                self.story_points = None;
            }
        }
        true
    }

    /// Checks field-level invariants. Write paths call this before SQL.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.name.trim().is_empty() {
            return Err(TaskValidationError::BlankName);
        }
        match self.task_type {
            TaskType::Epic => {
                if self.parent_id.is_some() {
                    return Err(TaskValidationError::EpicWithParent);
                }
                if self.priority.is_some() {
                    return Err(TaskValidationError::PriorityOnEpic);
                }
            }
            TaskType::UserStory | TaskType::Subtask => {
                if self.epic_priority.is_some() {
                    return Err(TaskValidationError::EpicPriorityOnNonEpic);
                }
            }
        }

        let completion_ok = match self.status {
            TaskStatus::Completed => self.completed && self.completed_date.is_some(),
            _ => !self.completed && self.completed_date.is_none(),
        };
        if !completion_ok {
            return Err(TaskValidationError::CompletionMismatch);
        }

        let estimate_ok = match self.estimate_type {
            EstimateType::StoryPoints => self.time_estimate.is_none(),
            EstimateType::Time => self.story_points.is_none(),
        };
        if !estimate_ok {
            return Err(TaskValidationError::EstimateConflict);
        }
        for value in [self.story_points, self.time_estimate].into_iter().flatten() {
            if value < 0 {
                return Err(TaskValidationError::NegativeEstimate(value));
            }
        }
        Ok(())
    }

    /// Returns whether this task is a project's "No Epic" bucket.
    pub fn is_no_epic_bucket(&self) -> bool {
        self.task_type == TaskType::Epic && self.name == NO_EPIC_BUCKET_NAME
    }
}
