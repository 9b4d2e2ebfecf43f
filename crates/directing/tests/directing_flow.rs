use std::sync::Arc;

use directing::{
    history_labels, restore_version, run_batch, set_current_plan, DirectingDesk, MockConfig, MockDirectingProvider,
};
use project::{AiConfig, ProjectDb, PromptScope};
use serde_json::json;
use timeline::Mode;

fn director_json() -> String {
    json!({
        "sequences": [{
            "title": "Intro",
            "scenes": [
                { "formatted_id": "S1-01", "narrations": ["오늘은 데이터 분석을 설명합니다"] },
                { "formatted_id": "S1-02", "narrations": ["화면을 보세요"], "is_screen_rec": true },
                {
                    "formatted_id": "S1-03",
                    "narrations": ["직접 만져보세요"],
                    "experience_track": { "has_experience": true, "title": "Try it" }
                }
            ]
        }]
    })
    .to_string()
}

#[test]
fn batch_results_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("console.sqlite3");

    {
        let db = ProjectDb::open_or_create(&path).unwrap();
        db.ensure_project("p1", "Pilot").unwrap();
        db.import_director_document("p1", &director_json()).unwrap();
        db.save_prompt(PromptScope::Style, "Flat pastel").unwrap();

        let mut doc = db.load_director_document("p1").unwrap();
        let prompts = db.load_prompts().unwrap();
        let settings = db.load_settings().unwrap();
        let desk = DirectingDesk::new(Arc::new(MockDirectingProvider::new(MockConfig::default())));

        let general = run_batch(&desk, &mut doc, Mode::General, &prompts, &settings.ai_config, None);
        assert_eq!((general.success, general.failed), (2, 0));
        let exp = run_batch(&desk, &mut doc, Mode::Experience, &prompts, &settings.ai_config, None);
        assert_eq!((exp.success, exp.failed), (1, 0));

        db.save_director_document("p1", &doc).unwrap();
    }

    let db = ProjectDb::open_or_create(&path).unwrap();
    let doc = db.load_director_document("p1").unwrap();
    let first = doc.scene("S1-01").unwrap();
    assert_eq!(first.ai_history.len(), 1);
    assert_eq!(first.ai_history[0].model, "GPT-5.2-pro");
    assert!(doc.scene("S1-02").unwrap().ai_planning.is_none());
    let exp = doc.scene("S1-03").unwrap().current_plan(Mode::Experience).unwrap();
    assert_eq!(exp["interaction"]["title"], "Try it");
}

#[test]
fn restore_and_hand_edit_keep_history() {
    let db = ProjectDb::open_in_memory().unwrap();
    db.ensure_project("p1", "Pilot").unwrap();
    db.import_director_document("p1", &director_json()).unwrap();
    let mut doc = db.load_director_document("p1").unwrap();

    let desk = DirectingDesk::new(Arc::new(MockDirectingProvider::new(MockConfig {
        scripted: vec![r#"{"take": 1}"#.into(), r#"{"take": 2}"#.into()],
        ..Default::default()
    })));
    let config = AiConfig {
        model: "Gemini-3-pro".into(),
        ..Default::default()
    };
    let prompts = db.load_prompts().unwrap();
    let scene = doc.scene_mut("S1-01").unwrap();
    let first = desk.request_directing(scene, Mode::General, &prompts, &config).unwrap();
    desk.request_directing(scene, Mode::General, &prompts, &config).unwrap();
    assert_eq!(scene.ai_planning, Some(json!({"take": 2})));

    restore_version(scene, Mode::General, first.id).unwrap();
    assert_eq!(scene.ai_planning, Some(json!({"take": 1})));
    set_current_plan(scene, Mode::General, r#"{"take": "edited"}"#).unwrap();

    let labels = history_labels(scene, Mode::General);
    assert_eq!(labels.len(), 2);
    assert!(labels[0].label.starts_with("v2 - "));
    assert!(labels[1].label.ends_with("(Gemini-3-pro)"));

    db.save_director_document("p1", &doc).unwrap();
    let reloaded = db.load_director_document("p1").unwrap();
    assert_eq!(
        reloaded.scene("S1-01").unwrap().ai_planning,
        Some(json!({"take": "edited"}))
    );
}
