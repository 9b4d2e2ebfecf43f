use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use crate::providers::ProviderConfig;
use crate::{provider_for_model, resolve_model_id, DirectingError, DirectingRequest, ProviderKind};

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Converts one scene request into an opaque plan object.
pub trait DirectingService: Send + Sync {
    fn provider_kind(&self) -> ProviderKind;
    fn model_name(&self) -> &str;
    fn generate(&self, request: &DirectingRequest) -> Result<Value, DirectingError>;
}

pub trait DirectingProviderFactory: Send + Sync {
    fn build(&self, config: ProviderConfig) -> Result<Arc<dyn DirectingService>, DirectingError>;
}

/// Strip markdown code fences and parse the model output.
///
/// Anything other than a JSON object is rejected.
pub fn parse_directing_response(text: &str) -> Result<Value, DirectingError> {
    let clean = text.replace("```json", "").replace("```", "");
    let clean = clean.trim();
    let value: Value = serde_json::from_str(clean).map_err(|err| {
        tracing::warn!(target: "directing", "unparseable directing output: {}", text);
        DirectingError::malformed(format!("response is not valid JSON: {err}"))
    })?;
    if !value.is_object() {
        return Err(DirectingError::malformed("response JSON is not an object"));
    }
    Ok(value)
}

/// First non-empty key from settings, then `OPENAI_API_KEY`, then `GEMINI_API_KEY`.
pub fn resolve_api_key_with<F>(configured: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let configured = configured.trim();
    if !configured.is_empty() {
        return Some(configured.to_string());
    }
    [ENV_OPENAI_API_KEY, ENV_GEMINI_API_KEY]
        .iter()
        .filter_map(|name| lookup(*name))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

pub fn resolve_api_key(configured: &str) -> Option<String> {
    resolve_api_key_with(configured, |name| std::env::var(name).ok())
}

/// Safe-to-log summary of a key: the first three characters only.
pub fn key_status(key: Option<&str>) -> String {
    match key {
        Some(key) => format!("Loaded ({}...)", key.chars().take(3).collect::<String>()),
        None => "MISSING".to_string(),
    }
}

/// Picks provider, model and key from each request and forwards it.
pub struct RoutingService<F: DirectingProviderFactory> {
    factory: F,
    env: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    last: Mutex<Option<(ProviderKind, String)>>,
}

impl<F: DirectingProviderFactory> RoutingService<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            env: Box::new(|name: &str| std::env::var(name).ok()),
            last: Mutex::new(None),
        }
    }

    pub fn with_env<E>(mut self, env: E) -> Self
    where
        E: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    pub fn provider_config(&self, request: &DirectingRequest) -> Result<ProviderConfig, DirectingError> {
        let display_model = match request.custom_config.model.trim() {
            "" => project::DEFAULT_MODEL,
            model => model,
        };
        let api_key = resolve_api_key_with(&request.custom_config.api_key, &self.env);
        let provider = provider_for_model(display_model);
        tracing::info!(
            target: "directing",
            "AI request: [{}] model={}, key={}",
            provider,
            display_model,
            key_status(api_key.as_deref())
        );
        let api_key = api_key.ok_or_else(|| {
            DirectingError::configuration(
                "API key is missing. Add it in Settings or set OPENAI_API_KEY / GEMINI_API_KEY.",
            )
        })?;
        let model = resolve_model_id(display_model).to_string();
        Ok(match provider {
            ProviderKind::Google => ProviderConfig::Gemini(crate::GeminiConfig {
                api_key,
                model,
                ..Default::default()
            }),
            _ => ProviderConfig::OpenAi(crate::OpenAiConfig {
                api_key,
                model,
                ..Default::default()
            }),
        })
    }
}

impl<F: DirectingProviderFactory> DirectingService for RoutingService<F> {
    /// Provider of the most recent request; OpenAI before any request.
    fn provider_kind(&self) -> ProviderKind {
        self.last
            .lock()
            .as_ref()
            .map(|(kind, _)| *kind)
            .unwrap_or(ProviderKind::OpenAi)
    }

    fn model_name(&self) -> &str {
        "auto"
    }

    fn generate(&self, request: &DirectingRequest) -> Result<Value, DirectingError> {
        let config = self.provider_config(request)?;
        let provider = self.factory.build(config)?;
        *self.last.lock() = Some((provider.provider_kind(), provider.model_name().to_string()));
        provider.generate(request)
    }
}

impl<F: DirectingProviderFactory> RoutingService<F> {
    /// Provider model id used by the most recent request.
    pub fn last_model(&self) -> Option<String> {
        self.last.lock().as_ref().map(|(_, model)| model.clone())
    }
}

/// Builds real HTTP providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProviderFactory;

impl DirectingProviderFactory for HttpProviderFactory {
    fn build(&self, config: ProviderConfig) -> Result<Arc<dyn DirectingService>, DirectingError> {
        Ok(match config {
            ProviderConfig::OpenAi(cfg) => Arc::new(crate::OpenAiProvider::new(cfg)?),
            ProviderConfig::Gemini(cfg) => Arc::new(crate::GeminiProvider::new(cfg)?),
            ProviderConfig::Mock(cfg) => Arc::new(crate::MockDirectingProvider::new(cfg)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockConfig;
    use project::{AiConfig, PromptSet};
    use timeline::{Mode, Scene};

    #[test]
    fn fences_are_stripped() {
        let value = parse_directing_response("```json\n{\"shot\": \"wide\"}\n```").unwrap();
        assert_eq!(value["shot"], "wide");
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_directing_response("Sure! Here is your plan."),
            Err(DirectingError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_directing_response("[1, 2]"),
            Err(DirectingError::MalformedResponse(_))
        ));
    }

    #[test]
    fn api_key_resolution_order() {
        let env = |name: &str| match name {
            ENV_OPENAI_API_KEY => Some("sk-env".to_string()),
            ENV_GEMINI_API_KEY => Some("gm-env".to_string()),
            _ => None,
        };
        assert_eq!(resolve_api_key_with("sk-config", env).as_deref(), Some("sk-config"));
        assert_eq!(resolve_api_key_with("  ", env).as_deref(), Some("sk-env"));
        let only_gemini = |name: &str| (name == ENV_GEMINI_API_KEY).then(|| "gm-env".to_string());
        assert_eq!(resolve_api_key_with("", only_gemini).as_deref(), Some("gm-env"));
        assert_eq!(resolve_api_key_with("", |_| None), None);
    }

    #[test]
    fn key_status_shows_prefix_only() {
        assert_eq!(key_status(Some("sk-abcdef")), "Loaded (sk-...)");
        assert_eq!(key_status(None), "MISSING");
    }

    struct MockFactory;

    impl DirectingProviderFactory for MockFactory {
        fn build(&self, config: ProviderConfig) -> Result<Arc<dyn DirectingService>, DirectingError> {
            let model = match &config {
                ProviderConfig::OpenAi(c) => c.model.clone(),
                ProviderConfig::Gemini(c) => c.model.clone(),
                ProviderConfig::Mock(c) => c.model.clone(),
            };
            Ok(Arc::new(crate::MockDirectingProvider::new(MockConfig {
                model,
                ..Default::default()
            })))
        }
    }

    fn request(model: &str, key: &str) -> DirectingRequest {
        let config = AiConfig {
            model: model.into(),
            api_key: key.into(),
            ..Default::default()
        };
        DirectingRequest::for_scene(&Scene::new("S1-01"), Mode::General, &PromptSet::default(), &config)
    }

    #[test]
    fn router_maps_display_model_and_provider() {
        let router = RoutingService::new(MockFactory).with_env(|_| None);
        match router.provider_config(&request("Gemini-3-pro", "k")).unwrap() {
            ProviderConfig::Gemini(cfg) => assert_eq!(cfg.model, "gemini-1.5-pro"),
            other => panic!("unexpected provider {:?}", other),
        }
        router.generate(&request("GPT-5.1", "k")).unwrap();
        assert_eq!(router.last_model().as_deref(), Some("gpt-3.5-turbo"));
    }

    #[test]
    fn router_without_key_is_configuration_error() {
        let router = RoutingService::new(MockFactory).with_env(|_| None);
        assert!(matches!(
            router.generate(&request("GPT-5.2", "")),
            Err(DirectingError::Configuration(_))
        ));
    }
}
