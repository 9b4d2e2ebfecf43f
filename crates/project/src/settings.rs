use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{now_millis, ProjectDb, Result};

/// Row id of the singleton settings document.
pub const SETTINGS_ID: &str = "main_config";

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "GPT-5.2-pro";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_THEME: &str = "dark";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default)]
    pub ai_config: AiConfig,
    #[serde(default)]
    pub github_config: GithubConfig,
    #[serde(default)]
    pub ui_config: UiConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GlobalSettings {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub local_path: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo_owner: String::new(),
            repo_name: String::new(),
            branch: default_branch(),
            token: String::new(),
            local_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl ProjectDb {
    pub(crate) fn ensure_default_settings(&self) -> Result<()> {
        let content = GlobalSettings::default().to_json_pretty()?;
        self.connection().execute(
            "INSERT OR IGNORE INTO global_settings(id, content, updated_at) VALUES(?1, ?2, ?3)",
            params![SETTINGS_ID, content, now_millis()],
        )?;
        Ok(())
    }

    pub(crate) fn load_settings_raw(&self) -> Result<Option<String>> {
        let raw = self
            .connection()
            .query_row(
                "SELECT content FROM global_settings WHERE id = ?1",
                params![SETTINGS_ID],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw)
    }

    /// Current live settings; a missing row reads as defaults.
    pub fn load_settings(&self) -> Result<GlobalSettings> {
        match self.load_settings_raw()? {
            Some(raw) => GlobalSettings::from_json(&raw),
            None => Ok(GlobalSettings::default()),
        }
    }

    pub fn save_settings(&self, settings: &GlobalSettings) -> Result<()> {
        let content = settings.to_json_pretty()?;
        self.write_settings_raw(&content)
    }

    pub(crate) fn write_settings_raw(&self, content: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO global_settings(id, content, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
            params![SETTINGS_ID, content, now_millis()],
        )?;
        tracing::info!(target: "store", "global settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_creates_default_settings() {
        let db = ProjectDb::open_in_memory().unwrap();
        let settings = db.load_settings().unwrap();
        assert_eq!(settings.ai_config.model, DEFAULT_MODEL);
        assert_eq!(settings.ai_config.provider, DEFAULT_PROVIDER);
        assert_eq!(settings.github_config.branch, DEFAULT_BRANCH);
        assert_eq!(settings.ui_config.theme, DEFAULT_THEME);
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let raw = json!({ "ai_config": { "api_key": "sk-test" }, "custom_flag": true }).to_string();
        let settings = GlobalSettings::from_json(&raw).unwrap();
        assert_eq!(settings.ai_config.api_key, "sk-test");
        assert_eq!(settings.ai_config.model, DEFAULT_MODEL);
        assert_eq!(settings.github_config.branch, "main");
        assert_eq!(settings.extra["custom_flag"], true);
    }

    #[test]
    fn save_and_reload() {
        let db = ProjectDb::open_in_memory().unwrap();
        let mut settings = db.load_settings().unwrap();
        settings.github_config.repo_name = "scripts".into();
        db.save_settings(&settings).unwrap();
        assert_eq!(db.load_settings().unwrap().github_config.repo_name, "scripts");
    }
}
