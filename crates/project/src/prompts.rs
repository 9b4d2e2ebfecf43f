use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use timeline::Mode;

use crate::{now_millis, ProjectDb, Result, StoreError};

/// Which editable system prompt a text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptScope {
    General,
    Experience,
    Style,
}

impl PromptScope {
    pub const ALL: [PromptScope; 3] = [PromptScope::General, PromptScope::Experience, PromptScope::Style];

    /// Storage id of the prompt row.
    pub fn id(&self) -> &'static str {
        match self {
            PromptScope::General => "master_general",
            PromptScope::Experience => "master_exp",
            PromptScope::Style => "style",
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::General => PromptScope::General,
            Mode::Experience => PromptScope::Experience,
        }
    }

    /// Text used when nothing has been saved for this scope.
    pub fn fallback(&self) -> &'static str {
        match self {
            PromptScope::General => "You are a creative director.",
            PromptScope::Experience => "You are an interaction designer.",
            PromptScope::Style => "",
        }
    }
}

impl fmt::Display for PromptScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PromptScope {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "master_general" => Ok(PromptScope::General),
            "experience" | "exp" | "master_exp" => Ok(PromptScope::Experience),
            "style" => Ok(PromptScope::Style),
            other => Err(StoreError::InvalidKey(format!("unknown prompt scope '{other}'"))),
        }
    }
}

/// Prompts handed to the directing service for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSet {
    pub master_general: Option<String>,
    pub master_exp: Option<String>,
    pub style: Option<String>,
}

impl PromptSet {
    /// Master prompt for the mode, falling back to the built-in persona.
    pub fn master_for(&self, mode: Mode) -> &str {
        let stored = match mode {
            Mode::General => self.master_general.as_deref(),
            Mode::Experience => self.master_exp.as_deref(),
        };
        stored
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| PromptScope::for_mode(mode).fallback())
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl ProjectDb {
    pub fn load_prompt(&self, scope: PromptScope) -> Result<Option<String>> {
        let content = self
            .connection()
            .query_row(
                "SELECT content FROM system_prompts WHERE id = ?1",
                params![scope.id()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    pub fn save_prompt(&self, scope: PromptScope, content: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO system_prompts(id, content, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
            params![scope.id(), content, now_millis()],
        )?;
        tracing::info!(target: "store", "prompt '{}' saved ({} chars)", scope, content.chars().count());
        Ok(())
    }

    pub fn load_prompts(&self) -> Result<PromptSet> {
        Ok(PromptSet {
            master_general: self.load_prompt(PromptScope::General)?,
            master_exp: self.load_prompt(PromptScope::Experience)?,
            style: self.load_prompt(PromptScope::Style)?,
        })
    }
}
