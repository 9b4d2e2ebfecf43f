use crate::{ArtifactKey, ProjectDb, Result, VersionEntry};

/// In-memory live copy of one artifact as an editor holds it.
///
/// Restoring a snapshot only replaces the in-memory content; nothing reaches
/// the store until [`WorkingCopy::apply_live`] succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingCopy {
    key: ArtifactKey,
    content: String,
    based_on: Option<i64>,
    dirty: bool,
}

impl WorkingCopy {
    pub fn open(db: &ProjectDb, key: ArtifactKey) -> Result<Self> {
        let content = match db.load_live(&key)? {
            Some(content) => content,
            None => key.default_content()?,
        };
        Ok(Self {
            key,
            content,
            based_on: None,
            dirty: false,
        })
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Snapshot id the content was last restored from, if any.
    pub fn based_on(&self) -> Option<i64> {
        self.based_on
    }

    /// True when the content differs from what was last loaded or applied.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn edit(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.dirty = true;
    }

    /// Copy a snapshot's content into the working copy. History is unchanged
    /// and no new snapshot is created.
    pub fn restore_snapshot(&mut self, db: &ProjectDb, id: i64) -> Result<VersionEntry> {
        let entry = db.require_snapshot(&self.key, id)?;
        self.content = entry.content.clone();
        self.based_on = Some(entry.id);
        self.dirty = true;
        tracing::info!(target: "versions", "restored {} from snapshot #{}", self.key, id);
        Ok(entry)
    }

    pub fn record_snapshot(&self, db: &ProjectDb, label: Option<&str>) -> Result<VersionEntry> {
        db.record_snapshot(&self.key, &self.content, label)
    }

    /// Write the content to the live location. On failure the working copy
    /// keeps its content and stays dirty.
    pub fn apply_live(&mut self, db: &ProjectDb) -> Result<()> {
        db.apply_live(&self.key, &self.content)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PromptScope, StageKey, StoreError};

    #[test]
    fn open_uses_defaults_when_never_written() {
        let db = ProjectDb::open_in_memory().unwrap();
        let copy = WorkingCopy::open(&db, ArtifactKey::Prompt(PromptScope::General)).unwrap();
        assert_eq!(copy.content(), "You are a creative director.");
        assert!(!copy.is_dirty());
    }

    #[test]
    fn restore_only_changes_memory() {
        let db = ProjectDb::open_in_memory().unwrap();
        let key = ArtifactKey::Prompt(PromptScope::Style);
        db.apply_live(&key, "live text").unwrap();
        let snap = db.record_snapshot(&key, "old text", Some("old")).unwrap();

        let mut copy = WorkingCopy::open(&db, key.clone()).unwrap();
        copy.restore_snapshot(&db, snap.id).unwrap();
        assert_eq!(copy.content(), "old text");
        assert_eq!(copy.based_on(), Some(snap.id));
        assert_eq!(db.load_live(&key).unwrap().as_deref(), Some("live text"));
        assert_eq!(db.list_snapshots(&key).unwrap().len(), 1);

        copy.apply_live(&db).unwrap();
        assert_eq!(db.load_live(&key).unwrap().as_deref(), Some("old text"));
        assert!(!copy.is_dirty());
    }

    #[test]
    fn restoring_unknown_snapshot_fails() {
        let db = ProjectDb::open_in_memory().unwrap();
        let mut copy = WorkingCopy::open(&db, ArtifactKey::Settings).unwrap();
        let before = copy.clone();
        assert!(matches!(copy.restore_snapshot(&db, 42), Err(StoreError::NotFound { .. })));
        assert_eq!(copy, before);
    }

    #[test]
    fn failed_apply_keeps_working_copy() {
        let db = ProjectDb::open_in_memory().unwrap();
        let key = ArtifactKey::Stage(StageKey::new("missing-project", "s2", "json"));
        let mut copy = WorkingCopy::open(&db, key).unwrap();
        copy.edit("{\"sequences\": []}");
        assert!(copy.apply_live(&db).is_err());
        assert_eq!(copy.content(), "{\"sequences\": []}");
        assert!(copy.is_dirty());
    }
}
