use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{millis_to_utc, now_millis, ProjectDb, Result, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectInfo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: millis_to_utc(row.get(2)?),
            updated_at: millis_to_utc(row.get(3)?),
        })
    }
}

impl ProjectDb {
    pub fn create_project(&self, title: &str) -> Result<ProjectInfo> {
        let id = Uuid::new_v4().to_string();
        self.ensure_project(&id, title)?;
        tracing::info!(target: "store", "created project {} ({})", title, id);
        self.require_project(&id)
    }

    /// Insert a project row if it does not exist yet. Existing titles are kept.
    pub fn ensure_project(&self, id: &str, title: &str) -> Result<()> {
        let now = now_millis();
        self.connection().execute(
            "INSERT OR IGNORE INTO projects(id, title, created_at, updated_at) VALUES(?1, ?2, ?3, ?3)",
            params![id, title, now],
        )?;
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectInfo>> {
        let project = self
            .connection()
            .query_row(
                "SELECT id, title, created_at, updated_at FROM projects WHERE id = ?1",
                params![id],
                ProjectInfo::from_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn require_project(&self, id: &str) -> Result<ProjectInfo> {
        self.get_project(id)?.ok_or_else(|| StoreError::NotFound {
            kind: "project",
            id: id.to_string(),
        })
    }

    /// Most recently touched first.
    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, title, created_at, updated_at FROM projects ORDER BY updated_at DESC, created_at DESC",
        )?;
        let rows = stmt.query_map([], ProjectInfo::from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn rename_project(&self, id: &str, title: &str) -> Result<()> {
        let changed = self.connection().execute(
            "UPDATE projects SET title = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, title, now_millis()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "project",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn touch_project(&self, id: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE projects SET updated_at = ?2 WHERE id = ?1",
            params![id, now_millis()],
        )?;
        Ok(())
    }

    /// Removes the project and its stage data. Version history is kept.
    pub fn delete_project(&self, id: &str) -> Result<bool> {
        let tx = self.begin_tx()?;
        tx.execute("DELETE FROM stage_data WHERE project_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}
