//! Core domain logic for TaskGraph.
//! This crate is the single source of truth for task hierarchy invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, DuplicatePolicy, ServiceConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::project::{Contributor, Project, MISCELLANEOUS_PROJECT_NAME};
pub use model::task::{
    ContributorId, EpicPriority, EstimateType, Priority, ProjectId, Task, TaskId, TaskStatus,
    TaskType, TaskValidationError, NO_EPIC_BUCKET_NAME,
};
pub use model::view::TaskView;
pub use notify::{
    EventName, LogSink, MemorySink, NoopSink, NotificationSink, NotifyError, TaskEvent,
};
pub use query::completion::completion_percentage;
pub use query::pagination::{generate_page_numbers, paginate, Page, PageWindow};
pub use query::tree::{build_hierarchy, HierarchyItem, TreeNode};
pub use repo::project_repo::{ProjectRepository, SqliteProjectRepository};
pub use repo::task_repo::{
    CompletionFilter, SiblingScope, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
pub use repo::{EntityKind, RepoError, RepoResult};
pub use service::hierarchy::{HierarchyError, HierarchyLookup, TaskArena};
pub use service::payload::TaskPayload;
pub use service::task_service::{
    NewTask, ParentTarget, RelationshipReport, ReorderOutcome, ServiceResult, TaskService,
    TaskServiceError, UpdateOutcome,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
