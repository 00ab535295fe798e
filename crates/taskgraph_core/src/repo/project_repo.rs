//! Project, contributor and membership persistence.
//!
//! # Responsibility
//! - Provide CRUD over `projects` and `contributors`.
//! - Maintain the `project_contributors` membership relation.
//!
//! # Invariants
//! - Project names are unique; duplicate inserts surface as constraint
//!   violations for callers to resolve (find-or-create).
//! - Adding an existing membership is a no-op, never an error.

use crate::model::project::{Contributor, Project};
use crate::model::task::{ContributorId, ProjectId};
use crate::repo::{ensure_connection_ready, now_epoch_ms, EntityKind, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    created_at,
    updated_at
FROM projects";

/// Repository interface for projects and contributors.
pub trait ProjectRepository {
    fn create_project(&self, name: &str, description: Option<&str>) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn find_project_by_name(&self, name: &str) -> RepoResult<Option<Project>>;
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    /// Deletes the project and every task in it. Returns deleted task count.
    fn delete_project(&self, id: ProjectId) -> RepoResult<usize>;
    fn create_contributor(&self, name: &str) -> RepoResult<Contributor>;
    fn get_contributor(&self, id: ContributorId) -> RepoResult<Option<Contributor>>;
    /// Adds membership; returns `true` when a new row was written.
    fn add_member(&self, project_id: ProjectId, contributor_id: ContributorId)
        -> RepoResult<bool>;
    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<Contributor>>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Wraps a connection or transaction without schema checks.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["projects", "contributors", "project_contributors"])?;
        Ok(Self { conn })
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, name: &str, description: Option<&str>) -> RepoResult<Project> {
        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO projects (name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3);",
            params![name, description, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_project(id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Project,
            id,
        })
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_project_row,
            )
            .optional()?;
        Ok(project)
    }

    fn find_project_by_name(&self, name: &str) -> RepoResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("{PROJECT_SELECT_SQL} WHERE name = ?1;"),
                [name],
                parse_project_row,
            )
            .optional()?;
        Ok(project)
    }

    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<usize> {
        let deleted_tasks = self
            .conn
            .execute("DELETE FROM tasks WHERE project_id = ?1;", [id])?;
        let changed = self.conn.execute("DELETE FROM projects WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: EntityKind::Project,
                id,
            });
        }
        Ok(deleted_tasks)
    }

    fn create_contributor(&self, name: &str) -> RepoResult<Contributor> {
        self.conn.execute(
            "INSERT INTO contributors (name, created_at) VALUES (?1, ?2);",
            params![name, now_epoch_ms()],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_contributor(id)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Contributor,
            id,
        })
    }

    fn get_contributor(&self, id: ContributorId) -> RepoResult<Option<Contributor>> {
        let contributor = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM contributors WHERE id = ?1;",
                [id],
                parse_contributor_row,
            )
            .optional()?;
        Ok(contributor)
    }

    fn add_member(
        &self,
        project_id: ProjectId,
        contributor_id: ContributorId,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO project_contributors (project_id, contributor_id)
             VALUES (?1, ?2);",
            params![project_id, contributor_id],
        )?;
        Ok(changed == 1)
    }

    fn list_members(&self, project_id: ProjectId) -> RepoResult<Vec<Contributor>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.created_at
             FROM contributors c
             INNER JOIN project_contributors pc ON pc.contributor_id = c.id
             WHERE pc.project_id = ?1
             ORDER BY c.name ASC, c.id ASC;",
        )?;
        let mut rows = stmt.query([project_id])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_contributor_row(row)?);
        }
        Ok(members)
    }
}

fn parse_project_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_contributor_row(row: &Row<'_>) -> rusqlite::Result<Contributor> {
    Ok(Contributor {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}
