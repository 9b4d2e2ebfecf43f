use chrono::Utc;
use parking_lot::Mutex;
use project::{AiConfig, PromptSet};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use timeline::{AiPlanRecord, Mode, Scene};

use crate::{record_model_label, record_plan, DirectingError, DirectingRequest, DirectingService, SINGLE_MODEL_LABEL};

type InFlightKey = (String, Mode);

/// Front door for directing calls.
///
/// Allows at most one call per (scene, mode) at a time; a second request for
/// the same pair fails fast with [`DirectingError::AlreadyInFlight`].
pub struct DirectingDesk {
    service: Arc<dyn DirectingService>,
    in_flight: Arc<Mutex<HashSet<InFlightKey>>>,
}

/// Held while a directing call runs. Dropping it frees the (scene, mode) slot.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct InFlightGuard {
    key: InFlightKey,
    set: Arc<Mutex<HashSet<InFlightKey>>>,
}

impl InFlightGuard {
    pub fn scene_id(&self) -> &str {
        &self.key.0
    }

    pub fn mode(&self) -> Mode {
        self.key.1
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

impl DirectingDesk {
    pub fn new(service: Arc<dyn DirectingService>) -> Self {
        Self {
            service,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn service(&self) -> &Arc<dyn DirectingService> {
        &self.service
    }

    pub fn try_begin(&self, scene_id: &str, mode: Mode) -> Result<InFlightGuard, DirectingError> {
        let key = (scene_id.to_string(), mode);
        let mut set = self.in_flight.lock();
        if !set.insert(key.clone()) {
            return Err(DirectingError::AlreadyInFlight {
                scene: key.0,
                mode,
            });
        }
        Ok(InFlightGuard {
            key,
            set: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_in_flight(&self, scene_id: &str, mode: Mode) -> bool {
        self.in_flight.lock().contains(&(scene_id.to_string(), mode))
    }

    /// Call the service for one request while holding its slot.
    pub fn direct(&self, request: &DirectingRequest) -> Result<Value, DirectingError> {
        let _guard = self.try_begin(&request.formatted_id, request.mode())?;
        let start = Instant::now();
        let result = self.service.generate(request);
        match &result {
            Ok(_) => tracing::info!(
                target: "directing",
                "directed {} ({}) in {:.2?}",
                request.formatted_id,
                request.mode(),
                start.elapsed()
            ),
            Err(err) => tracing::warn!(
                target: "directing",
                "directing {} ({}) failed: {}",
                request.formatted_id,
                request.mode(),
                err
            ),
        }
        result
    }

    /// Direct one scene and record the plan on success.
    ///
    /// On any failure the scene is left exactly as it was.
    pub fn request_directing(
        &self,
        scene: &mut Scene,
        mode: Mode,
        prompts: &PromptSet,
        config: &AiConfig,
    ) -> Result<AiPlanRecord, DirectingError> {
        self.request_with_label(scene, mode, prompts, config, SINGLE_MODEL_LABEL)
    }

    pub(crate) fn request_with_label(
        &self,
        scene: &mut Scene,
        mode: Mode,
        prompts: &PromptSet,
        config: &AiConfig,
        fallback_label: &str,
    ) -> Result<AiPlanRecord, DirectingError> {
        let request = DirectingRequest::for_scene(scene, mode, prompts, config);
        let data = self.direct(&request)?;
        let model = record_model_label(&config.model, fallback_label);
        Ok(record_plan(scene, mode, &model, data, Utc::now()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FailingProvider, MockConfig, MockDirectingProvider};

    fn desk() -> DirectingDesk {
        DirectingDesk::new(Arc::new(MockDirectingProvider::new(MockConfig::default())))
    }

    #[test]
    fn second_begin_for_same_pair_is_rejected() {
        let desk = desk();
        let guard = desk.try_begin("S1-01", Mode::General).unwrap();
        assert!(matches!(
            desk.try_begin("S1-01", Mode::General),
            Err(DirectingError::AlreadyInFlight { .. })
        ));
        // Other mode and other scene are independent.
        let _exp = desk.try_begin("S1-01", Mode::Experience).unwrap();
        let _other = desk.try_begin("S1-02", Mode::General).unwrap();
        drop(guard);
        assert!(!desk.is_in_flight("S1-01", Mode::General));
        assert!(desk.try_begin("S1-01", Mode::General).is_ok());
    }

    #[test]
    fn direct_is_refused_while_slot_held() {
        let desk = desk();
        let scene = Scene::new("S1-01");
        let request = DirectingRequest::for_scene(&scene, Mode::General, &PromptSet::default(), &AiConfig::default());
        let _guard = desk.try_begin("S1-01", Mode::General).unwrap();
        assert!(desk.direct(&request).is_err());
    }

    #[test]
    fn success_records_plan_with_configured_model() {
        let desk = desk();
        let mut scene = Scene::new("S1-01").with_narrations(["hello"]);
        let config = AiConfig {
            model: "GPT-5.2".into(),
            ..Default::default()
        };
        let record = desk
            .request_directing(&mut scene, Mode::General, &PromptSet::default(), &config)
            .unwrap();
        assert_eq!(record.model, "GPT-5.2");
        assert_eq!(scene.ai_history.len(), 1);
        assert_eq!(scene.ai_planning.as_ref(), Some(&record.data));
        assert!(!desk.is_in_flight("S1-01", Mode::General));
    }

    #[test]
    fn blank_model_records_single_label() {
        let desk = desk();
        let mut scene = Scene::new("S1-01");
        let config = AiConfig {
            model: String::new(),
            ..Default::default()
        };
        let record = desk
            .request_directing(&mut scene, Mode::Experience, &PromptSet::default(), &config)
            .unwrap();
        assert_eq!(record.model, SINGLE_MODEL_LABEL);
        assert_eq!(scene.ai_history_exp.len(), 1);
    }

    #[test]
    fn failure_leaves_scene_untouched() {
        let desk = DirectingDesk::new(Arc::new(FailingProvider::new("offline")));
        let mut scene = Scene::new("S1-01");
        let before = scene.clone();
        let err = desk
            .request_directing(&mut scene, Mode::General, &PromptSet::default(), &AiConfig::default())
            .unwrap_err();
        assert!(matches!(err, DirectingError::ServiceUnavailable(_)));
        assert_eq!(scene, before);
        assert!(!desk.is_in_flight("S1-01", Mode::General));
    }
}
