use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{millis_to_utc, now_millis, ProjectDb, Result, StoreError};

/// Address of one stage artifact: `[project, stage, type]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageKey {
    pub project_id: String,
    pub stage: String,
    pub kind: String,
}

impl StageKey {
    pub fn new(project_id: impl Into<String>, stage: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            stage: stage.into(),
            kind: kind.into(),
        }
    }

    pub fn parts(&self) -> [&str; 3] {
        [self.project_id.as_str(), self.stage.as_str(), self.kind.as_str()]
    }

    /// Stage content of type `json` must be a JSON value.
    pub fn holds_json(&self) -> bool {
        self.kind == "json"
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project_id, self.stage, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatus {
    pub key: StageKey,
    pub exists: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub bytes: usize,
}

impl ProjectDb {
    pub fn get_stage_data(&self, key: &StageKey) -> Result<Option<String>> {
        let content = self
            .connection()
            .query_row(
                "SELECT content FROM stage_data WHERE project_id = ?1 AND stage = ?2 AND kind = ?3",
                params![key.project_id, key.stage, key.kind],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    pub fn require_stage_data(&self, key: &StageKey) -> Result<String> {
        self.get_stage_data(key)?.ok_or_else(|| StoreError::NotFound {
            kind: "stage data",
            id: key.to_string(),
        })
    }

    pub fn put_stage_data(&self, key: &StageKey, content: &str) -> Result<()> {
        if key.holds_json() {
            serde_json::from_str::<serde_json::Value>(content)?;
        }
        let now = now_millis();
        self.connection().execute(
            "INSERT INTO stage_data(project_id, stage, kind, content, updated_at) VALUES(?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id, stage, kind) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
            params![key.project_id, key.stage, key.kind, content, now],
        )?;
        self.touch_project(&key.project_id)?;
        tracing::debug!(target: "store", "stage data {} updated ({} bytes)", key, content.len());
        Ok(())
    }

    pub fn stage_status(&self, key: &StageKey) -> Result<StageStatus> {
        let row: Option<(i64, i64)> = self
            .connection()
            .query_row(
                "SELECT updated_at, length(content) FROM stage_data WHERE project_id = ?1 AND stage = ?2 AND kind = ?3",
                params![key.project_id, key.stage, key.kind],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((updated, len)) => StageStatus {
                key: key.clone(),
                exists: true,
                updated_at: Some(millis_to_utc(updated)),
                bytes: len.max(0) as usize,
            },
            None => StageStatus {
                key: key.clone(),
                exists: false,
                updated_at: None,
                bytes: 0,
            },
        })
    }

    /// Every stored stage artifact of a project, ordered by stage then type.
    pub fn list_stage_status(&self, project_id: &str) -> Result<Vec<StageStatus>> {
        let mut stmt = self.connection().prepare(
            "SELECT stage, kind, updated_at, length(content) FROM stage_data WHERE project_id = ?1 ORDER BY stage, kind",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok(StageStatus {
                key: StageKey::new(project_id, row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                exists: true,
                updated_at: Some(millis_to_utc(row.get(2)?)),
                bytes: row.get::<_, i64>(3)?.max(0) as usize,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
