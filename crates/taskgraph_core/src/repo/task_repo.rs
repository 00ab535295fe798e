//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for task rows and their sibling ordering.
//! - Provide the aggregate and joined reads the query layer needs.
//!
//! # Invariants
//! - Sibling listing is deterministic: `sort_order ASC, id ASC`.
//! - `insert_task`/`update_task` validate field-level couplings first.
//! - Subtree listing is iterative in SQL (recursive CTE) and tolerates
//!   corrupt cycles by bounding the walk depth.

use crate::model::task::{
    ContributorId, EpicPriority, EstimateType, Priority, ProjectId, Task, TaskId, TaskStatus,
    TaskType, NO_EPIC_BUCKET_NAME,
};
use crate::model::view::TaskView;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, now_epoch_ms, EntityKind, RepoError,
    RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const TASK_COLUMNS: &str = "t.id AS id,
    t.name AS name,
    t.description AS description,
    t.task_type AS task_type,
    t.parent_id AS parent_id,
    t.project_id AS project_id,
    t.contributor_id AS contributor_id,
    t.estimate_type AS estimate_type,
    t.story_points AS story_points,
    t.time_estimate AS time_estimate,
    t.priority AS priority,
    t.epic_priority AS epic_priority,
    t.status AS status,
    t.completed AS completed,
    t.completed_date AS completed_date,
    t.is_archived AS is_archived,
    t.sort_order AS sort_order,
    t.created_at AS created_at,
    t.updated_at AS updated_at";

/// Ordering context for `sort_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingScope {
    /// Children of one parent task.
    Parent(TaskId),
    /// Parent-less tasks of one type inside one project.
    TopLevel {
        project_id: ProjectId,
        task_type: TaskType,
    },
}

impl SiblingScope {
    /// Scope a task with the given placement belongs to.
    pub fn for_placement(
        parent_id: Option<TaskId>,
        project_id: ProjectId,
        task_type: TaskType,
    ) -> Self {
        match parent_id {
            Some(parent_id) => Self::Parent(parent_id),
            None => Self::TopLevel {
                project_id,
                task_type,
            },
        }
    }

    /// Scope the task currently belongs to.
    pub fn of(task: &Task) -> Self {
        Self::for_placement(task.parent_id, task.project_id, task.task_type)
    }

    /// Parent id carried in notifications; `None` for top-level scopes.
    pub fn parent_id(&self) -> Option<TaskId> {
        match self {
            Self::Parent(parent_id) => Some(*parent_id),
            Self::TopLevel { .. } => None,
        }
    }

    fn where_clause(&self) -> (&'static str, Vec<Value>) {
        match self {
            Self::Parent(parent_id) => ("t.parent_id = ?", vec![Value::Integer(*parent_id)]),
            Self::TopLevel {
                project_id,
                task_type,
            } => (
                "t.parent_id IS NULL AND t.project_id = ? AND t.task_type = ?",
                vec![
                    Value::Integer(*project_id),
                    Value::Text(task_type.as_str().to_string()),
                ],
            ),
        }
    }
}

/// Completion filter for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionFilter {
    Completed,
    Open,
}

/// Query options for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskListQuery {
    pub project_id: Option<ProjectId>,
    /// Empty means any type.
    pub task_types: Vec<TaskType>,
    pub is_archived: Option<bool>,
    pub completion: Option<CompletionFilter>,
    pub exclude_subtasks: bool,
}

impl TaskListQuery {
    /// All tasks of one project.
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            ..Self::default()
        }
    }
}

/// One row of a subtree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtreeEntry {
    pub id: TaskId,
    /// 0 for the root of the listing.
    pub depth: i64,
    pub contributor_id: Option<ContributorId>,
}

/// Story point sums for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoryPointTotals {
    pub total: i64,
    pub completed: i64,
}

/// Repository interface for task persistence.
pub trait TaskRepository {
    /// Loads one task by id.
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Loads one task or fails with `NotFound`.
    fn require_task(&self, id: TaskId) -> RepoResult<Task> {
        self.get_task(id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Task,
            id,
        })
    }
    /// Lists tasks matching filters, ordered by `sort_order, id`.
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Inserts one task. `id`, `created_at` and `updated_at` are assigned by
    /// the store and ignored on input.
    fn insert_task(&self, task: &Task) -> RepoResult<Task>;
    /// Persists every mutable column of an existing task.
    fn update_task(&self, task: &Task) -> RepoResult<Task>;
    /// Hard-deletes one task row.
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Number of direct children.
    fn count_children(&self, parent_id: TaskId) -> RepoResult<i64>;
    /// Direct children ordered by `sort_order, id`.
    fn list_children(&self, parent_id: TaskId) -> RepoResult<Vec<Task>>;
    /// The task and all descendants, shallowest first.
    fn list_subtree(&self, root_id: TaskId) -> RepoResult<Vec<SubtreeEntry>>;
    /// Siblings of one scope ordered by `sort_order, id`.
    fn list_scope(&self, scope: SiblingScope) -> RepoResult<Vec<Task>>;
    /// `max(sort_order) + 1` inside the scope, 0 when empty.
    fn next_sort_order(&self, scope: SiblingScope) -> RepoResult<i64>;
    /// Overwrites one task's `sort_order`.
    fn set_sort_order(&self, id: TaskId, sort_order: i64) -> RepoResult<()>;
    /// Finds a task by case-insensitive name, project and type.
    fn find_by_identity(
        &self,
        name: &str,
        project_id: ProjectId,
        task_type: TaskType,
    ) -> RepoResult<Option<Task>>;
    /// The project's "No Epic" bucket, matched on the exact sentinel name.
    fn find_no_epic_bucket(&self, project_id: ProjectId) -> RepoResult<Option<Task>>;
    /// Parent-less user stories of one project.
    fn list_orphan_user_stories(&self, project_id: ProjectId) -> RepoResult<Vec<Task>>;
    /// Story point sums for one project.
    fn story_point_totals(&self, project_id: ProjectId) -> RepoResult<StoryPointTotals>;
    /// Loads the joined projection for one task.
    fn get_task_view(&self, id: TaskId) -> RepoResult<Option<TaskView>>;
    /// Lists joined projections matching filters.
    fn list_task_views(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskView>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Wraps a connection or transaction without schema checks.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["tasks", "projects", "contributors"])?;
        Ok(Self { conn })
    }

    /// Reads only the columns hierarchy checks need.
    pub fn hierarchy_row(
        &self,
        id: TaskId,
    ) -> RepoResult<Option<(TaskType, Option<TaskId>, ProjectId)>> {
        let row: Option<(String, Option<TaskId>, ProjectId)> = self
            .conn
            .query_row(
                "SELECT task_type, parent_id, project_id FROM tasks WHERE id = ?1;",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((task_type, parent_id, project_id)) = row else {
            return Ok(None);
        };
        let task_type = parse_label(&task_type, TaskType::parse, "tasks.task_type")?;
        Ok(Some((task_type, parent_id, project_id)))
    }

    fn query_tasks(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1;");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let (filter_sql, bind_values) = build_list_filter(query);
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             WHERE 1 = 1{filter_sql}
             ORDER BY t.sort_order ASC, t.id ASC;"
        );
        self.query_tasks(&sql, bind_values)
    }

    fn insert_task(&self, task: &Task) -> RepoResult<Task> {
        task.validate()?;
        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO tasks (
                name,
                description,
                task_type,
                parent_id,
                project_id,
                contributor_id,
                estimate_type,
                story_points,
                time_estimate,
                priority,
                epic_priority,
                status,
                completed,
                completed_date,
                is_archived,
                sort_order,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17);",
            params![
                task.name.as_str(),
                task.description.as_deref(),
                task.task_type.as_str(),
                task.parent_id,
                task.project_id,
                task.contributor_id,
                task.estimate_type.as_str(),
                task.story_points,
                task.time_estimate,
                task.priority.map(Priority::as_str),
                task.epic_priority.map(EpicPriority::as_str),
                task.status.as_str(),
                bool_to_int(task.completed),
                task.completed_date,
                bool_to_int(task.is_archived),
                task.sort_order,
                now,
            ],
        )?;
        self.require_task(self.conn.last_insert_rowid())
    }

    fn update_task(&self, task: &Task) -> RepoResult<Task> {
        task.validate()?;
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                name = ?2,
                description = ?3,
                task_type = ?4,
                parent_id = ?5,
                project_id = ?6,
                contributor_id = ?7,
                estimate_type = ?8,
                story_points = ?9,
                time_estimate = ?10,
                priority = ?11,
                epic_priority = ?12,
                status = ?13,
                completed = ?14,
                completed_date = ?15,
                is_archived = ?16,
                sort_order = ?17,
                updated_at = ?18
             WHERE id = ?1;",
            params![
                task.id,
                task.name.as_str(),
                task.description.as_deref(),
                task.task_type.as_str(),
                task.parent_id,
                task.project_id,
                task.contributor_id,
                task.estimate_type.as_str(),
                task.story_points,
                task.time_estimate,
                task.priority.map(Priority::as_str),
                task.epic_priority.map(EpicPriority::as_str),
                task.status.as_str(),
                bool_to_int(task.completed),
                task.completed_date,
                bool_to_int(task.is_archived),
                task.sort_order,
                now_epoch_ms(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Task,
                id: task.id,
            });
        }
        self.require_task(task.id)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Task,
                id,
            });
        }
        Ok(())
    }

    fn count_children(&self, parent_id: TaskId) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE parent_id = ?1;",
            [parent_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_children(&self, parent_id: TaskId) -> RepoResult<Vec<Task>> {
        self.list_scope(SiblingScope::Parent(parent_id))
    }

    fn list_subtree(&self, root_id: TaskId) -> RepoResult<Vec<SubtreeEntry>> {
        // The depth bound keeps the walk finite if stored parent links are cyclic.
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(id, depth) AS (
                SELECT id, 0
                FROM tasks
                WHERE id = ?1
                UNION
                SELECT child.id, parent.depth + 1
                FROM tasks child
                INNER JOIN subtree parent ON child.parent_id = parent.id
                WHERE parent.depth < 64
            )
            SELECT t.id, MIN(s.depth) AS depth, t.contributor_id
            FROM subtree s
            INNER JOIN tasks t ON t.id = s.id
            GROUP BY t.id
            ORDER BY depth ASC, t.id ASC;",
        )?;
        let mut rows = stmt.query([root_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(SubtreeEntry {
                id: row.get(0)?,
                depth: row.get(1)?,
                contributor_id: row.get(2)?,
            });
        }
        Ok(entries)
    }

    fn list_scope(&self, scope: SiblingScope) -> RepoResult<Vec<Task>> {
        let (where_sql, bind_values) = scope.where_clause();
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             WHERE {where_sql}
             ORDER BY t.sort_order ASC, t.id ASC;"
        );
        self.query_tasks(&sql, bind_values)
    }

    fn next_sort_order(&self, scope: SiblingScope) -> RepoResult<i64> {
        let (where_sql, bind_values) = scope.where_clause();
        let sql = format!(
            "SELECT COALESCE(MAX(t.sort_order), -1) + 1
             FROM tasks t
             WHERE {where_sql};"
        );
        let next = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(next)
    }

    fn set_sort_order(&self, id: TaskId, sort_order: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET sort_order = ?2,
                 updated_at = ?3
             WHERE id = ?1;",
            params![id, sort_order, now_epoch_ms()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Task,
                id,
            });
        }
        Ok(())
    }

    fn find_by_identity(
        &self,
        name: &str,
        project_id: ProjectId,
        task_type: TaskType,
    ) -> RepoResult<Option<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             WHERE t.name = ?1 COLLATE NOCASE
               AND t.project_id = ?2
               AND t.task_type = ?3
             ORDER BY t.id ASC
             LIMIT 1;"
        );
        let tasks = self.query_tasks(
            &sql,
            vec![
                Value::Text(name.to_string()),
                Value::Integer(project_id),
                Value::Text(task_type.as_str().to_string()),
            ],
        )?;
        Ok(tasks.into_iter().next())
    }

    fn find_no_epic_bucket(&self, project_id: ProjectId) -> RepoResult<Option<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             WHERE t.name = ?1
               AND t.project_id = ?2
               AND t.task_type = 'Epic'
             ORDER BY t.id ASC
             LIMIT 1;"
        );
        let tasks = self.query_tasks(
            &sql,
            vec![
                Value::Text(NO_EPIC_BUCKET_NAME.to_string()),
                Value::Integer(project_id),
            ],
        )?;
        Ok(tasks.into_iter().next())
    }

    fn list_orphan_user_stories(&self, project_id: ProjectId) -> RepoResult<Vec<Task>> {
        self.list_scope(SiblingScope::TopLevel {
            project_id,
            task_type: TaskType::UserStory,
        })
    }

    fn story_point_totals(&self, project_id: ProjectId) -> RepoResult<StoryPointTotals> {
        let totals = self.conn.query_row(
            "SELECT
                COALESCE(SUM(story_points), 0),
                COALESCE(SUM(CASE WHEN completed = 1 THEN story_points ELSE 0 END), 0)
             FROM tasks
             WHERE project_id = ?1;",
            [project_id],
            |row| {
                Ok(StoryPointTotals {
                    total: row.get(0)?,
                    completed: row.get(1)?,
                })
            },
        )?;
        Ok(totals)
    }

    fn get_task_view(&self, id: TaskId) -> RepoResult<Option<TaskView>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS},
                p.name AS project_name,
                c.name AS contributor_name
             FROM tasks t
             LEFT JOIN projects p ON p.id = t.project_id
             LEFT JOIN contributors c ON c.id = t.contributor_id
             WHERE t.id = ?1;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_view_row(row)?));
        }
        Ok(None)
    }

    fn list_task_views(&self, query: &TaskListQuery) -> RepoResult<Vec<TaskView>> {
        let (filter_sql, bind_values) = build_list_filter(query);
        let sql = format!(
            "SELECT {TASK_COLUMNS},
                p.name AS project_name,
                c.name AS contributor_name
             FROM tasks t
             LEFT JOIN projects p ON p.id = t.project_id
             LEFT JOIN contributors c ON c.id = t.contributor_id
             WHERE 1 = 1{filter_sql}
             ORDER BY t.sort_order ASC, t.id ASC;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut views = Vec::new();
        while let Some(row) = rows.next()? {
            views.push(parse_view_row(row)?);
        }
        Ok(views)
    }
}

fn build_list_filter(query: &TaskListQuery) -> (String, Vec<Value>) {
    let mut sql = String::new();
    let mut bind_values = Vec::new();

    if let Some(project_id) = query.project_id {
        sql.push_str(" AND t.project_id = ?");
        bind_values.push(Value::Integer(project_id));
    }
    if !query.task_types.is_empty() {
        let placeholders = vec!["?"; query.task_types.len()].join(", ");
        sql.push_str(&format!(" AND t.task_type IN ({placeholders})"));
        for task_type in &query.task_types {
            bind_values.push(Value::Text(task_type.as_str().to_string()));
        }
    }
    if let Some(is_archived) = query.is_archived {
        sql.push_str(" AND t.is_archived = ?");
        bind_values.push(Value::Integer(bool_to_int(is_archived)));
    }
    if let Some(completion) = query.completion {
        sql.push_str(" AND t.completed = ?");
        bind_values.push(Value::Integer(bool_to_int(
            completion == CompletionFilter::Completed,
        )));
    }
    if query.exclude_subtasks {
        sql.push_str(" AND t.task_type <> 'Subtask'");
    }
    (sql, bind_values)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let task_type_text: String = row.get("task_type")?;
    let estimate_text: String = row.get("estimate_type")?;
    let status_text: String = row.get("status")?;

    let priority = row
        .get::<_, Option<String>>("priority")?
        .map(|value| parse_label(&value, Priority::parse, "tasks.priority"))
        .transpose()?;
    let epic_priority = row
        .get::<_, Option<String>>("epic_priority")?
        .map(|value| parse_label(&value, EpicPriority::parse, "tasks.epic_priority"))
        .transpose()?;

    let task = Task {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        task_type: parse_label(&task_type_text, TaskType::parse, "tasks.task_type")?,
        parent_id: row.get("parent_id")?,
        project_id: row.get("project_id")?,
        contributor_id: row.get("contributor_id")?,
        estimate_type: parse_label(&estimate_text, EstimateType::parse, "tasks.estimate_type")?,
        story_points: row.get("story_points")?,
        time_estimate: row.get("time_estimate")?,
        priority,
        epic_priority,
        status: parse_label(&status_text, TaskStatus::parse, "tasks.status")?,
        completed: int_to_bool(row.get("completed")?, "tasks.completed")?,
        completed_date: row.get("completed_date")?,
        is_archived: int_to_bool(row.get("is_archived")?, "tasks.is_archived")?,
        sort_order: row.get("sort_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    Ok(task)
}

fn parse_view_row(row: &Row<'_>) -> RepoResult<TaskView> {
    let task = parse_task_row(row)?;
    let project_name: Option<String> = row.get("project_name")?;
    let contributor_name: Option<String> = row.get("contributor_name")?;
    Ok(TaskView::from_parts(&task, project_name, contributor_name))
}

fn parse_label<T>(
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
    column: &'static str,
) -> RepoResult<T> {
    parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid value `{value}` in {column}")))
}
