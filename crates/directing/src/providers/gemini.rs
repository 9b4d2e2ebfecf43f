use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

use super::{build_agent, post_json};
use crate::{parse_directing_response, DirectingError, DirectingRequest, DirectingService, ProviderKind};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-pro".to_string(),
            api_base: GEMINI_API_BASE.to_string(),
        }
    }
}

pub struct GeminiProvider {
    config: GeminiConfig,
    agent: ureq::Agent,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, DirectingError> {
        if config.api_key.trim().is_empty() {
            return Err(DirectingError::configuration("Gemini API key is required."));
        }
        if config.model.trim().is_empty() {
            return Err(DirectingError::configuration("Gemini model name is required."));
        }
        Ok(Self {
            config,
            agent: build_agent(),
        })
    }

    /// The key travels in the `X-Goog-Api-Key` header, never in the URL.
    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            urlencoding::encode(self.config.model.trim())
        )
    }

    /// Gemini gets the persona and the scene as one user turn.
    pub(crate) fn payload(request: &DirectingRequest) -> Result<Value, DirectingError> {
        let prompt = format!(
            "{}\n\nRespond in JSON only.\n\n[Scene Data]\n{}",
            request.system_prompt(),
            request.user_content()?
        );
        Ok(json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" },
        }))
    }

    pub(crate) fn candidate_text(body: &str) -> Result<String, DirectingError> {
        let parsed: GeminiResponse = serde_json::from_str(body).map_err(|err| {
            DirectingError::malformed(format!("Invalid Gemini response JSON: {err}"))
        })?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| DirectingError::malformed("Gemini response had no candidates."))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(DirectingError::malformed("Gemini candidate had no text."));
        }
        Ok(text)
    }
}

impl DirectingService for GeminiProvider {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn generate(&self, request: &DirectingRequest) -> Result<Value, DirectingError> {
        let payload = Self::payload(request)?;
        let start = Instant::now();
        tracing::info!(
            target: "directing",
            "Gemini request start: model={}, scene={}",
            self.config.model,
            request.formatted_id
        );
        let http = self
            .agent
            .post(&self.endpoint())
            .set("X-Goog-Api-Key", self.config.api_key.trim());
        let body = post_json(http, &payload, "Gemini")?;
        let text = Self::candidate_text(&body)?;
        tracing::info!(
            target: "directing",
            "Gemini request completed in {:.2?}",
            start.elapsed()
        );
        parse_directing_response(&text)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}
