use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// The project and scene an operator is working on, passed explicitly to
/// every workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleContext {
    pub project_id: Option<String>,
    pub scene_id: Option<String>,
}

impl ConsoleContext {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            scene_id: None,
        }
    }

    pub fn with_scene(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = Some(scene_id.into());
        self
    }

    /// Switching projects drops the selected scene.
    pub fn select_project(&mut self, project_id: impl Into<String>) {
        self.project_id = Some(project_id.into());
        self.scene_id = None;
    }

    pub fn select_scene(&mut self, scene_id: impl Into<String>) {
        self.scene_id = Some(scene_id.into());
    }

    pub fn project(&self) -> Result<&str> {
        self.project_id.as_deref().ok_or(StoreError::NoActiveProject)
    }

    pub fn scene(&self) -> Result<&str> {
        self.scene_id.as_deref().ok_or(StoreError::NoActiveScene)
    }
}
