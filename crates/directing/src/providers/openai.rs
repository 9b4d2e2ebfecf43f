use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

use super::{build_agent, post_json};
use crate::{parse_directing_response, DirectingError, DirectingRequest, DirectingService, ProviderKind};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub organization: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            organization: None,
        }
    }
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
    agent: ureq::Agent,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, DirectingError> {
        if config.api_key.trim().is_empty() {
            return Err(DirectingError::configuration("OpenAI API key is required."));
        }
        if config.model.trim().is_empty() {
            return Err(DirectingError::configuration("OpenAI model name is required."));
        }
        Ok(Self {
            config,
            agent: build_agent(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{CHAT_COMPLETIONS_PATH}",
            self.config.api_base.trim_end_matches('/')
        )
    }

    pub(crate) fn payload(model: &str, request: &DirectingRequest) -> Result<Value, DirectingError> {
        let user = format!(
            "Analyze this scene and generate JSON directing:\n{}",
            request.user_content()?
        );
        Ok(json!({
            "model": model,
            "messages": [
                { "role": "system", "content": request.system_prompt() },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
        }))
    }

    /// Message text of the first choice.
    pub(crate) fn completion_text(body: &str) -> Result<String, DirectingError> {
        let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|err| {
            DirectingError::malformed(format!("Invalid OpenAI response JSON: {err}"))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DirectingError::malformed("OpenAI response had no message content."))
    }
}

impl DirectingService for OpenAiProvider {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn generate(&self, request: &DirectingRequest) -> Result<Value, DirectingError> {
        let payload = Self::payload(&self.config.model, request)?;
        let start = Instant::now();
        tracing::info!(
            target: "directing",
            "OpenAI request start: model={}, scene={}",
            self.config.model,
            request.formatted_id
        );
        let mut http = self
            .agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {}", self.config.api_key.trim()));
        if let Some(org) = self.config.organization.as_deref() {
            if !org.trim().is_empty() {
                http = http.set("OpenAI-Organization", org.trim());
            }
        }
        let body = post_json(http, &payload, "OpenAI")?;
        let text = Self::completion_text(&body)?;
        tracing::info!(
            target: "directing",
            "OpenAI request completed in {:.2?}",
            start.elapsed()
        );
        parse_directing_response(&text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}
