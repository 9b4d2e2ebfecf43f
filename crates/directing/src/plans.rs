//! Current/history plan pair per scene and mode.

use chrono::{DateTime, Utc};
use serde_json::Value;
use timeline::{AiPlanRecord, DirectorDocument, Mode, Scene};

use crate::DirectingError;

/// Model label used for batch runs when settings name no model.
pub const BATCH_MODEL_LABEL: &str = "Batch-AI";
/// Model label used for single-scene runs when settings name no model.
pub const SINGLE_MODEL_LABEL: &str = "Single-AI";

/// Append a plan to the mode's history and make it current.
///
/// Record ids are strictly increasing within one history even when several
/// plans land in the same millisecond.
pub fn record_plan<'a>(
    scene: &'a mut Scene,
    mode: Mode,
    model: &str,
    data: Value,
    now: DateTime<Utc>,
) -> &'a AiPlanRecord {
    let slot = scene.plan_slot_mut(mode);
    let last_id = slot.history.iter().map(|r| r.id).max();
    let now_ms = now.timestamp_millis();
    let id = match last_id {
        Some(last) if last >= now_ms => last + 1,
        _ => now_ms,
    };
    *slot.current = Some(data.clone());
    slot.history.push(AiPlanRecord {
        id,
        timestamp: now,
        model: model.to_string(),
        data,
    });
    let history = slot.history;
    &history[history.len() - 1]
}

/// Make a past plan current again. History is left as it is.
pub fn restore_version(scene: &mut Scene, mode: Mode, history_id: i64) -> Result<&Value, DirectingError> {
    let scene_id = scene.formatted_id.clone();
    let slot = scene.plan_slot_mut(mode);
    let data = slot
        .history
        .iter()
        .find(|r| r.id == history_id)
        .map(|r| r.data.clone())
        .ok_or(DirectingError::HistoryNotFound {
            scene: scene_id,
            mode,
            id: history_id,
        })?;
    Ok(slot.current.insert(data))
}

/// Replace the current plan with hand-edited JSON. History is not touched.
pub fn set_current_plan(scene: &mut Scene, mode: Mode, raw: &str) -> Result<(), DirectingError> {
    let value: Value = serde_json::from_str(raw).map_err(DirectingError::InvalidPlan)?;
    *scene.plan_slot_mut(mode).current = Some(value);
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLabel {
    pub id: i64,
    pub number: usize,
    pub label: String,
}

/// Newest first, labelled `v{n} - {time} ({model})` with the newest numbered highest.
pub fn history_labels(scene: &Scene, mode: Mode) -> Vec<HistoryLabel> {
    let history = scene.plan_slot(mode).history;
    history
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, record)| HistoryLabel {
            id: record.id,
            number: idx + 1,
            label: format!(
                "v{} - {} ({})",
                idx + 1,
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.model
            ),
        })
        .collect()
}

/// Scenes a "generate all" run should visit, in timeline order.
///
/// General runs skip screen recordings; experience runs only visit scenes
/// with an experience track switched on.
pub fn batch_targets(doc: &DirectorDocument, mode: Mode) -> Vec<String> {
    doc.scenes()
        .filter(|scene| match mode {
            Mode::General => !scene.is_screen_rec,
            Mode::Experience => scene.has_experience(),
        })
        .map(|scene| scene.formatted_id.clone())
        .collect()
}

/// Model label stored with a plan: the configured model, else a fixed label.
pub fn record_model_label(configured: &str, fallback: &str) -> String {
    match configured.trim() {
        "" => fallback.to_string(),
        model => model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use timeline::Sequence;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn record_sets_current_and_appends() {
        let mut scene = Scene::new("S1-01");
        record_plan(&mut scene, Mode::General, "GPT-5.2", json!({"v": 1}), at(1_000));
        let rec = record_plan(&mut scene, Mode::General, "GPT-5.2", json!({"v": 2}), at(2_000)).clone();
        assert_eq!(rec.id, 2_000);
        assert_eq!(scene.ai_history.len(), 2);
        assert_eq!(scene.ai_planning, Some(json!({"v": 2})));
        assert!(scene.ai_history_exp.is_empty());
    }

    #[test]
    fn ids_increase_within_same_millisecond() {
        let mut scene = Scene::new("S1-01");
        let a = record_plan(&mut scene, Mode::Experience, "m", json!({}), at(5_000)).id;
        let b = record_plan(&mut scene, Mode::Experience, "m", json!({}), at(5_000)).id;
        let c = record_plan(&mut scene, Mode::Experience, "m", json!({}), at(4_000)).id;
        assert!(a < b && b < c);
    }

    #[test]
    fn restore_leaves_history_identical() {
        let mut scene = Scene::new("S1-01");
        let first = record_plan(&mut scene, Mode::General, "m", json!({"v": 1}), at(1_000)).id;
        record_plan(&mut scene, Mode::General, "m", json!({"v": 2}), at(2_000));
        let before = scene.ai_history.clone();

        let restored = restore_version(&mut scene, Mode::General, first).unwrap().clone();
        assert_eq!(restored, json!({"v": 1}));
        assert_eq!(scene.ai_planning, Some(json!({"v": 1})));
        assert_eq!(scene.ai_history, before);
    }

    #[test]
    fn restore_unknown_id_keeps_current() {
        let mut scene = Scene::new("S1-01");
        record_plan(&mut scene, Mode::General, "m", json!({"v": 1}), at(1_000));
        let err = restore_version(&mut scene, Mode::General, 42).unwrap_err();
        assert!(matches!(err, DirectingError::HistoryNotFound { id: 42, .. }));
        assert_eq!(scene.ai_planning, Some(json!({"v": 1})));
        // An id from the other mode's history is not visible here.
        assert!(restore_version(&mut scene, Mode::Experience, 1_000).is_err());
    }

    #[test]
    fn hand_edit_requires_json() {
        let mut scene = Scene::new("S1-01");
        assert!(matches!(
            set_current_plan(&mut scene, Mode::General, "{broken"),
            Err(DirectingError::InvalidPlan(_))
        ));
        assert!(scene.ai_planning.is_none());
        set_current_plan(&mut scene, Mode::General, r#"{"shot":"close"}"#).unwrap();
        assert_eq!(scene.ai_planning, Some(json!({"shot": "close"})));
        assert!(scene.ai_history.is_empty());
    }

    #[test]
    fn labels_are_newest_first() {
        let mut scene = Scene::new("S1-01");
        record_plan(&mut scene, Mode::General, "GPT-5.1", json!({}), at(1_000));
        record_plan(&mut scene, Mode::General, "Gemini-3-pro", json!({}), at(2_000));
        let labels = history_labels(&scene, Mode::General);
        assert_eq!(labels[0].number, 2);
        assert!(labels[0].label.starts_with("v2 - "));
        assert!(labels[0].label.ends_with("(Gemini-3-pro)"));
        assert_eq!(labels[1].id, 1_000);
    }

    #[test]
    fn general_batch_skips_screen_recordings() {
        let mut rec = Scene::new("S1-02");
        rec.is_screen_rec = true;
        let mut exp = Scene::new("S1-03");
        exp.set_experience(true);
        let doc = DirectorDocument {
            sequences: vec![Sequence {
                title: "S1".into(),
                scenes: vec![Scene::new("S1-01"), rec, exp],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(batch_targets(&doc, Mode::General), vec!["S1-01", "S1-03"]);
        assert_eq!(batch_targets(&doc, Mode::Experience), vec!["S1-03"]);
    }

    #[test]
    fn model_label_falls_back() {
        assert_eq!(record_model_label("", BATCH_MODEL_LABEL), "Batch-AI");
        assert_eq!(record_model_label("GPT-5.2", SINGLE_MODEL_LABEL), "GPT-5.2");
    }
}
