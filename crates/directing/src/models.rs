use project::{AiConfig, PromptSet};
use serde::{Deserialize, Serialize};
use timeline::{ExperienceTrack, Mode, Scene, VisualPlan};

use crate::DirectingError;

/// Persona used when a request carries no master prompt.
pub const DEFAULT_MASTER_PROMPT: &str = "You are a creative director.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

impl From<&AiConfig> for CustomConfig {
    fn from(config: &AiConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomPrompts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Everything the directing service needs for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectingRequest {
    pub formatted_id: String,
    #[serde(default)]
    pub narrations: Vec<String>,
    #[serde(default)]
    pub visual_plans: Vec<VisualPlan>,
    #[serde(default)]
    pub experience_track: Option<ExperienceTrack>,
    #[serde(rename = "customConfig", default)]
    pub custom_config: CustomConfig,
    #[serde(rename = "customPrompts", default)]
    pub custom_prompts: CustomPrompts,
    #[serde(rename = "isExperienceMode", default)]
    pub is_experience_mode: bool,
}

/// Scene payload sent to the model as the user message.
#[derive(Debug, Serialize)]
pub struct SceneData<'a> {
    pub id: &'a str,
    pub narration: &'a [String],
    pub visual_plans: &'a [VisualPlan],
    pub experience: Option<&'a ExperienceTrack>,
}

impl DirectingRequest {
    pub fn for_scene(scene: &Scene, mode: Mode, prompts: &PromptSet, config: &AiConfig) -> Self {
        Self {
            formatted_id: scene.formatted_id.clone(),
            narrations: scene.narrations.clone(),
            visual_plans: scene.visual_plans.clone(),
            experience_track: scene.experience_track.clone(),
            custom_config: CustomConfig::from(config),
            custom_prompts: CustomPrompts {
                master: Some(prompts.master_for(mode).to_string()),
                style: prompts.style().map(str::to_string),
            },
            is_experience_mode: mode == Mode::Experience,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.is_experience_mode {
            Mode::Experience
        } else {
            Mode::General
        }
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = self
            .custom_prompts
            .master
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_MASTER_PROMPT)
            .to_string();
        if let Some(style) = self.custom_prompts.style.as_deref() {
            if !style.trim().is_empty() {
                prompt.push_str(&format!("\n\n[Style Guideline]\n{style}"));
            }
        }
        prompt
    }

    /// The experience track is only sent in experience mode.
    pub fn scene_data(&self) -> SceneData<'_> {
        SceneData {
            id: &self.formatted_id,
            narration: &self.narrations,
            visual_plans: &self.visual_plans,
            experience: if self.is_experience_mode {
                self.experience_track.as_ref()
            } else {
                None
            },
        }
    }

    pub fn user_content(&self) -> Result<String, DirectingError> {
        serde_json::to_string_pretty(&self.scene_data())
            .map_err(|err| DirectingError::configuration(format!("Failed to encode scene data: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn scene() -> Scene {
        let mut scene = Scene::new("S1-02").with_narrations(["데이터가 쌓입니다"]);
        scene.set_experience(true);
        if let Some(track) = scene.experience_track.as_mut() {
            track.title = "Drag the blocks".into();
        }
        scene
    }

    #[test]
    fn wire_names_match_external_interface() {
        let req = DirectingRequest::for_scene(&scene(), Mode::Experience, &PromptSet::default(), &AiConfig::default());
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["formatted_id"], "S1-02");
        assert_eq!(wire["isExperienceMode"], true);
        assert_eq!(wire["customConfig"]["model"], "GPT-5.2-pro");
        assert_eq!(wire["customPrompts"]["master"], "You are an interaction designer.");
        assert!(wire["customPrompts"].get("style").is_none());
    }

    #[test]
    fn system_prompt_appends_style_section() {
        let prompts = PromptSet {
            style: Some("Warm, hand-drawn".into()),
            ..Default::default()
        };
        let req = DirectingRequest::for_scene(&scene(), Mode::General, &prompts, &AiConfig::default());
        assert_eq!(
            req.system_prompt(),
            "You are a creative director.\n\n[Style Guideline]\nWarm, hand-drawn"
        );
    }

    #[test]
    fn blank_master_falls_back_to_default_persona() {
        let mut req = DirectingRequest::for_scene(&scene(), Mode::General, &PromptSet::default(), &AiConfig::default());
        req.custom_prompts.master = Some("  ".into());
        assert_eq!(req.system_prompt(), DEFAULT_MASTER_PROMPT);
    }

    #[test]
    fn experience_only_sent_in_experience_mode() {
        let general = DirectingRequest::for_scene(&scene(), Mode::General, &PromptSet::default(), &AiConfig::default());
        let content: Value = serde_json::from_str(&general.user_content().unwrap()).unwrap();
        assert_eq!(content["experience"], Value::Null);
        assert_eq!(content["id"], "S1-02");
        assert_eq!(content["narration"], json!(["데이터가 쌓입니다"]));

        let exp = DirectingRequest::for_scene(&scene(), Mode::Experience, &PromptSet::default(), &AiConfig::default());
        let content: Value = serde_json::from_str(&exp.user_content().unwrap()).unwrap();
        assert_eq!(content["experience"]["title"], "Drag the blocks");
        assert_eq!(exp.mode(), Mode::Experience);
    }
}
