use timeline::{backfill_document, DirectorDocument};

use crate::{ProjectDb, Result, StageKey};

/// Stage that holds the director document.
pub const DIRECTOR_STAGE: &str = "s2";
pub const DIRECTOR_KIND: &str = "json";

impl StageKey {
    pub fn director(project_id: impl Into<String>) -> Self {
        StageKey::new(project_id, DIRECTOR_STAGE, DIRECTOR_KIND)
    }
}

impl ProjectDb {
    /// Load, backfill and (only if backfill changed something) persist the
    /// project's director document.
    pub fn load_director_document(&self, project_id: &str) -> Result<DirectorDocument> {
        let key = StageKey::director(project_id);
        let raw = self.require_stage_data(&key)?;
        let mut doc = DirectorDocument::from_json(&raw)?;
        let touched = backfill_document(&mut doc);
        if touched > 0 {
            self.save_director_document(project_id, &doc)?;
            tracing::info!(
                target: "store",
                "director document for {} backfilled ({} scene(s))",
                project_id,
                touched
            );
        }
        Ok(doc)
    }

    pub fn save_director_document(&self, project_id: &str, doc: &DirectorDocument) -> Result<()> {
        let content = doc.to_json_pretty()?;
        self.put_stage_data(&StageKey::director(project_id), &content)
    }

    /// Store raw director JSON after checking it parses as a document.
    pub fn import_director_document(&self, project_id: &str, raw: &str) -> Result<DirectorDocument> {
        let doc = DirectorDocument::from_json(raw)?;
        self.put_stage_data(&StageKey::director(project_id), raw)?;
        tracing::info!(
            target: "store",
            "imported director document for {}: {} sequence(s), {} scene(s)",
            project_id,
            doc.sequences.len(),
            doc.scene_count()
        );
        Ok(doc)
    }
}
