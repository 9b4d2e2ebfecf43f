use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Google,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model as offered in the settings picker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSpec {
    pub id: &'static str,
    pub provider: ProviderKind,
    pub name: &'static str,
    pub description: &'static str,
    pub price: &'static str,
}

pub const MODEL_SPECS: &[ModelSpec] = &[
    ModelSpec {
        id: "GPT-5.2-pro",
        provider: ProviderKind::OpenAi,
        name: "GPT-5.2 Pro",
        description: "Top-tier reasoning and coding (High Cost)",
        price: "₩200 / 10k chars",
    },
    ModelSpec {
        id: "GPT-5.2",
        provider: ProviderKind::OpenAi,
        name: "GPT-5.2",
        description: "Balanced model (Standard)",
        price: "₩60 / 10k chars",
    },
    ModelSpec {
        id: "GPT-5.1",
        provider: ProviderKind::OpenAi,
        name: "GPT-5.1",
        description: "Fast and cheap (Cost Efficient)",
        price: "₩40 / 10k chars",
    },
    ModelSpec {
        id: "Gemini-3-pro",
        provider: ProviderKind::Google,
        name: "Gemini 3 Pro",
        description: "Complex reasoning, long context (Premium)",
        price: "₩180 / 10k chars",
    },
    ModelSpec {
        id: "Gemini-2.5-pro",
        provider: ProviderKind::Google,
        name: "Gemini 2.5 Pro",
        description: "Best value",
        price: "₩110 / 10k chars",
    },
    ModelSpec {
        id: "Gemini-2.5-flash",
        provider: ProviderKind::Google,
        name: "Gemini 2.5 Flash",
        description: "Low latency",
        price: "₩20 / 10k chars",
    },
];

/// Display model ids and the provider model each one is served by.
const MODEL_MAP: &[(&str, &str)] = &[
    ("GPT-5.2-pro", "gpt-4o"),
    ("GPT-5.2", "gpt-4-turbo"),
    ("GPT-5.1", "gpt-3.5-turbo"),
    ("Gemini-3-pro", "gemini-1.5-pro"),
    ("Gemini-3-bison", "gemini-1.5-flash"),
    ("Gemini-2.5-pro", "gemini-1.0-pro"),
];

pub fn find_model_spec(id: &str) -> Option<&'static ModelSpec> {
    MODEL_SPECS.iter().find(|spec| spec.id == id)
}

/// Provider model id for a display id; unknown ids pass through unchanged.
pub fn resolve_model_id(display_id: &str) -> &str {
    MODEL_MAP
        .iter()
        .find(|(ui, _)| *ui == display_id)
        .map(|(_, real)| *real)
        .unwrap_or(display_id)
}

pub fn provider_for_model(display_id: &str) -> ProviderKind {
    if display_id.to_ascii_lowercase().contains("gemini") {
        ProviderKind::Google
    } else {
        ProviderKind::OpenAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_ids_map_to_provider_models() {
        assert_eq!(resolve_model_id("GPT-5.2-pro"), "gpt-4o");
        assert_eq!(resolve_model_id("Gemini-3-pro"), "gemini-1.5-pro");
        assert_eq!(resolve_model_id("gpt-4o-mini"), "gpt-4o-mini");
    }

    #[test]
    fn provider_is_inferred_from_name() {
        assert_eq!(provider_for_model("Gemini-2.5-flash"), ProviderKind::Google);
        assert_eq!(provider_for_model("GPT-5.1"), ProviderKind::OpenAi);
        assert_eq!(provider_for_model("my-gemini-proxy"), ProviderKind::Google);
    }

    #[test]
    fn catalog_providers_agree_with_inference() {
        for spec in MODEL_SPECS {
            assert_eq!(provider_for_model(spec.id), spec.provider, "{}", spec.id);
        }
        assert!(find_model_spec("GPT-5.2").is_some());
        assert!(find_model_spec("Gemini-3-bison").is_none());
    }
}
