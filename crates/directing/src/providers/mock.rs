use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use timeline::Mode;

use crate::{parse_directing_response, DirectingError, DirectingRequest, DirectingService, ProviderKind};

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    pub model: String,
    /// Raw responses returned in order before falling back to a generated plan.
    pub scripted: Vec<String>,
    pub latency: Option<Duration>,
}

/// Offline provider producing deterministic plans.
pub struct MockDirectingProvider {
    model: String,
    remaining: Mutex<VecDeque<String>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl MockDirectingProvider {
    pub fn new(config: MockConfig) -> Self {
        let model = if config.model.trim().is_empty() {
            "sft-mock-director".to_string()
        } else {
            config.model
        };
        Self {
            model,
            remaining: Mutex::new(VecDeque::from(config.scripted)),
            latency: config.latency,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn generated_plan(&self, request: &DirectingRequest) -> Value {
        let shots: Vec<Value> = request
            .visual_plans
            .iter()
            .map(|plan| {
                json!({
                    "plan": plan.name,
                    "camera": "medium shot",
                    "note": plan.description,
                })
            })
            .collect();
        let mut plan = json!({
            "scene_id": request.formatted_id,
            "mode": request.mode().as_str(),
            "model": self.model,
            "narration_lines": request.narrations.len(),
            "shots": shots,
        });
        if request.mode() == Mode::Experience {
            plan["interaction"] = json!({
                "title": request.experience_track.as_ref().map(|t| t.title.clone()).unwrap_or_default(),
                "steps": ["present", "interact", "reveal"],
            });
        }
        plan
    }
}

impl DirectingService for MockDirectingProvider {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &DirectingRequest) -> Result<Value, DirectingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.latency {
            std::thread::sleep(delay);
        }
        match self.remaining.lock().pop_front() {
            Some(raw) => parse_directing_response(&raw),
            None => Ok(self.generated_plan(request)),
        }
    }
}

/// Provider that always fails as if the network were down.
pub struct FailingProvider {
    message: String,
}

impl FailingProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl DirectingService for FailingProvider {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn model_name(&self) -> &str {
        "failing"
    }

    fn generate(&self, _request: &DirectingRequest) -> Result<Value, DirectingError> {
        Err(DirectingError::unavailable(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use project::{AiConfig, PromptSet};
    use timeline::Scene;

    fn request() -> DirectingRequest {
        let mut scene = Scene::new("S1-01");
        scene.visual_plans = timeline::default_visual_plans();
        DirectingRequest::for_scene(&scene, Mode::General, &PromptSet::default(), &AiConfig::default())
    }

    #[test]
    fn scripted_responses_come_first() {
        let provider = MockDirectingProvider::new(MockConfig {
            scripted: vec!["```json\n{\"take\": 1}\n```".into(), "oops".into()],
            ..Default::default()
        });
        assert_eq!(provider.generate(&request()).unwrap()["take"], 1);
        assert!(matches!(
            provider.generate(&request()),
            Err(DirectingError::MalformedResponse(_))
        ));
        let generated = provider.generate(&request()).unwrap();
        assert_eq!(generated["scene_id"], "S1-01");
        assert_eq!(generated["shots"].as_array().unwrap().len(), 2);
        assert_eq!(provider.call_count(), 3);
    }

    #[test]
    fn failing_provider_reports_unavailable() {
        let provider = FailingProvider::new("connection refused");
        assert!(matches!(
            provider.generate(&request()),
            Err(DirectingError::ServiceUnavailable(msg)) if msg == "connection refused"
        ));
    }
}
