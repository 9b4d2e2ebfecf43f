//! Append-only snapshot history for any addressable artifact.
//!
//! History rows are keyed by `(target_type, target_id)`. Recording a snapshot
//! never touches the live artifact, and writing the live artifact never touches
//! history.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{millis_to_utc, now_millis, GlobalSettings, ProjectDb, PromptScope, Result, StageKey, StoreError};

pub const DEFAULT_SNAPSHOT_LABEL: &str = "Auto Save";

/// Separator used when a compound target id is stored as one string.
///
/// Ids whose parts themselves contain `_` can collide; keys are still compared
/// on the full joined string.
pub const TARGET_ID_SEPARATOR: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    GlobalSettings,
    SystemPrompts,
    StageData,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::GlobalSettings => "global_settings",
            TargetType::SystemPrompts => "system_prompts",
            TargetType::StageData => "stage_data",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned artifact and where its live copy lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    Settings,
    Prompt(PromptScope),
    Stage(StageKey),
}

impl ArtifactKey {
    pub fn target_type(&self) -> TargetType {
        match self {
            ArtifactKey::Settings => TargetType::GlobalSettings,
            ArtifactKey::Prompt(_) => TargetType::SystemPrompts,
            ArtifactKey::Stage(_) => TargetType::StageData,
        }
    }

    /// Normalized target id; compound stage keys are joined with `_`.
    pub fn target_id(&self) -> String {
        match self {
            ArtifactKey::Settings => crate::SETTINGS_ID.to_string(),
            ArtifactKey::Prompt(scope) => scope.id().to_string(),
            ArtifactKey::Stage(key) => key.parts().join(TARGET_ID_SEPARATOR),
        }
    }

    /// Content to use when the live artifact has never been written.
    pub fn default_content(&self) -> Result<String> {
        Ok(match self {
            ArtifactKey::Settings => GlobalSettings::default().to_json_pretty()?,
            ArtifactKey::Prompt(scope) => scope.fallback().to_string(),
            ArtifactKey::Stage(_) => String::new(),
        })
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        match self {
            ArtifactKey::Settings => {
                GlobalSettings::from_json(content)?;
            }
            ArtifactKey::Stage(key) if key.holds_json() => {
                serde_json::from_str::<serde_json::Value>(content)?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKey::Settings => f.write_str("settings"),
            ArtifactKey::Prompt(scope) => write!(f, "prompt:{}", scope),
            ArtifactKey::Stage(key) => write!(f, "stage:{}", key),
        }
    }
}

impl FromStr for ArtifactKey {
    type Err = StoreError;

    /// `settings`, `prompt:<scope>` or `stage:<project>:<stage>:<type>`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            ["settings"] => Ok(ArtifactKey::Settings),
            ["prompt", scope] => Ok(ArtifactKey::Prompt(scope.parse()?)),
            ["stage", project, stage, kind] if !project.is_empty() && !stage.is_empty() && !kind.is_empty() => {
                Ok(ArtifactKey::Stage(StageKey::new(*project, *stage, *kind)))
            }
            _ => Err(StoreError::InvalidKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: i64,
    pub target_type: String,
    pub target_id: String,
    pub content: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl VersionEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            target_type: row.get(1)?,
            target_id: row.get(2)?,
            content: row.get(3)?,
            label: row.get(4)?,
            timestamp: millis_to_utc(row.get(5)?),
        })
    }
}

/// A history entry with its display number; the newest entry is numbered highest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberedVersion<'a> {
    pub number: usize,
    pub entry: &'a VersionEntry,
}

impl NumberedVersion<'_> {
    pub fn display_label(&self) -> String {
        format!(
            "v{} - {} ({})",
            self.number,
            self.entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.entry.label
        )
    }
}

/// Newest first, numbered `len..=1`, given entries in insertion order.
pub fn numbered_newest_first(entries: &[VersionEntry]) -> Vec<NumberedVersion<'_>> {
    entries
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, entry)| NumberedVersion {
            number: idx + 1,
            entry,
        })
        .collect()
}

const ENTRY_COLUMNS: &str = "id, target_type, target_id, content, label, timestamp";

impl ProjectDb {
    /// Append a snapshot of `content` for `key`. Live state is not touched.
    ///
    /// Timestamps never go backwards within one key even if the wall clock does.
    pub fn record_snapshot(&self, key: &ArtifactKey, content: &str, label: Option<&str>) -> Result<VersionEntry> {
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_SNAPSHOT_LABEL);
        let target_type = key.target_type();
        let target_id = key.target_id();

        let tx = self.begin_tx()?;
        let last: Option<i64> = tx
            .query_row(
                "SELECT MAX(timestamp) FROM version_history WHERE target_type = ?1 AND target_id = ?2",
                params![target_type.as_str(), target_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let timestamp = last.map_or(now_millis(), |last| now_millis().max(last));
        tx.execute(
            "INSERT INTO version_history(target_type, target_id, content, label, timestamp) VALUES(?1, ?2, ?3, ?4, ?5)",
            params![target_type.as_str(), target_id, content, label, timestamp],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(target: "versions", "snapshot #{} recorded for {} ({})", id, key, label);
        Ok(VersionEntry {
            id,
            target_type: target_type.as_str().to_string(),
            target_id,
            content: content.to_string(),
            label: label.to_string(),
            timestamp: millis_to_utc(timestamp),
        })
    }

    /// Every snapshot of `key` in insertion order.
    pub fn list_snapshots(&self, key: &ArtifactKey) -> Result<Vec<VersionEntry>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM version_history WHERE target_type = ?1 AND target_id = ?2 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(
            params![key.target_type().as_str(), key.target_id()],
            VersionEntry::from_row,
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Looks a snapshot up within `key` only; an id from another key is not found.
    pub fn find_snapshot(&self, key: &ArtifactKey, id: i64) -> Result<Option<VersionEntry>> {
        let entry = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM version_history WHERE id = ?1 AND target_type = ?2 AND target_id = ?3"
                ),
                params![id, key.target_type().as_str(), key.target_id()],
                VersionEntry::from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn require_snapshot(&self, key: &ArtifactKey, id: i64) -> Result<VersionEntry> {
        self.find_snapshot(key, id)?.ok_or_else(|| StoreError::NotFound {
            kind: "snapshot",
            id: format!("{key}#{id}"),
        })
    }

    /// Current live content of the artifact, if it has ever been written.
    pub fn load_live(&self, key: &ArtifactKey) -> Result<Option<String>> {
        match key {
            ArtifactKey::Settings => self.load_settings_raw(),
            ArtifactKey::Prompt(scope) => self.load_prompt(*scope),
            ArtifactKey::Stage(stage) => self.get_stage_data(stage),
        }
    }

    /// Persist `content` as the artifact's live copy. History is not touched.
    pub fn apply_live(&self, key: &ArtifactKey, content: &str) -> Result<()> {
        key.validate_content(content)?;
        match key {
            ArtifactKey::Settings => self.write_settings_raw(content)?,
            ArtifactKey::Prompt(scope) => self.save_prompt(*scope, content)?,
            ArtifactKey::Stage(stage) => self.put_stage_data(stage, content)?,
        }
        tracing::info!(target: "versions", "applied live content for {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parsing_and_normalization() {
        let key: ArtifactKey = "stage:p1:s2:json".parse().unwrap();
        assert_eq!(key.target_type(), TargetType::StageData);
        assert_eq!(key.target_id(), "p1_s2_json");
        assert_eq!(key.to_string(), "stage:p1:s2:json");

        let key: ArtifactKey = "prompt:style".parse().unwrap();
        assert_eq!(key.target_id(), "style");
        assert_eq!("settings".parse::<ArtifactKey>().unwrap().target_id(), "main_config");

        assert!("stage:p1:s2".parse::<ArtifactKey>().is_err());
        assert!("bogus".parse::<ArtifactKey>().is_err());
    }

    #[test]
    fn blank_label_defaults_to_auto_save() {
        let db = ProjectDb::open_in_memory().unwrap();
        let key = ArtifactKey::Prompt(PromptScope::General);
        let a = db.record_snapshot(&key, "one", None).unwrap();
        let b = db.record_snapshot(&key, "two", Some("  ")).unwrap();
        assert_eq!(a.label, DEFAULT_SNAPSHOT_LABEL);
        assert_eq!(b.label, DEFAULT_SNAPSHOT_LABEL);
        assert!(b.id > a.id);
        assert!(b.timestamp >= a.timestamp);
    }

    #[test]
    fn snapshots_are_scoped_by_full_key() {
        let db = ProjectDb::open_in_memory().unwrap();
        let general = ArtifactKey::Prompt(PromptScope::General);
        let style = ArtifactKey::Prompt(PromptScope::Style);
        let entry = db.record_snapshot(&general, "g", Some("g1")).unwrap();
        db.record_snapshot(&style, "s", Some("s1")).unwrap();

        assert_eq!(db.list_snapshots(&general).unwrap().len(), 1);
        assert!(db.find_snapshot(&style, entry.id).unwrap().is_none());
        assert!(matches!(
            db.require_snapshot(&style, entry.id),
            Err(StoreError::NotFound { kind: "snapshot", .. })
        ));
    }

    #[test]
    fn recording_does_not_touch_live_state() {
        let db = ProjectDb::open_in_memory().unwrap();
        let key = ArtifactKey::Prompt(PromptScope::Style);
        db.record_snapshot(&key, "cinematic", None).unwrap();
        assert!(db.load_live(&key).unwrap().is_none());
    }

    #[test]
    fn apply_live_validates_settings() {
        let db = ProjectDb::open_in_memory().unwrap();
        let before = db.load_live(&ArtifactKey::Settings).unwrap();
        assert!(db.apply_live(&ArtifactKey::Settings, "not json").is_err());
        assert_eq!(db.load_live(&ArtifactKey::Settings).unwrap(), before);
        assert!(db.list_snapshots(&ArtifactKey::Settings).unwrap().is_empty());
    }

    #[test]
    fn numbering_puts_newest_first() {
        let db = ProjectDb::open_in_memory().unwrap();
        let key = ArtifactKey::Settings;
        for label in ["v1", "v2", "v3"] {
            db.record_snapshot(&key, "{}", Some(label)).unwrap();
        }
        let entries = db.list_snapshots(&key).unwrap();
        let numbered = numbered_newest_first(&entries);
        assert_eq!(numbered[0].number, 3);
        assert_eq!(numbered[0].entry.label, "v3");
        assert_eq!(numbered[2].number, 1);
        assert!(numbered[0].display_label().starts_with("v3 - "));
    }
}
