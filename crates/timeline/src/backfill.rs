//! Deterministic defaults for scenes that arrive without control data.
//!
//! A missing `scene_control`, `tool_control` or empty `visual_plans` is not an
//! error: the loader fills it in from narration keywords and records where the
//! value came from in the `source` field.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{DirectorDocument, RankedTool, Scene, SceneControl, SceneVector, ToolControl, VisualPlan};

pub const VECTOR_SOURCE_FALLBACK: &str = "fallback_auto";
pub const TOOLS_SOURCE_FALLBACK: &str = "auto_rule_fallback";
pub const TOOLS_SOURCE_DEFAULT: &str = "default";

const VECTOR_MIN: f64 = 0.1;
const VECTOR_MAX: f64 = 0.9;
const MAX_SUGGESTED_TOOLS: usize = 2;

/// Template catalog in suggestion priority order.
const TOOL_CATALOG: &[(&str, &str)] = &[
    ("roadmap", "스텝|단계|과정|흐름|로드맵|순서|따라"),
    ("list", "첫째|둘째|셋째|목록|리스트|가지|나열"),
    ("table", "비교|대조|표|vs|차이|장단점"),
    ("chart_line", "변화|추이|상승|하락|증가|감소|선|연도|흐름|급격"),
    ("chart_bar", "막대|그래프|차트|비교|높|낮|순위|가장|vs"),
    ("chart_pie", "비율|퍼센트|%|점유율|원형|비중|구성|차지"),
    ("definition", "정의|뜻|개념|이란|용어"),
    ("speech_bubble", "질문|생각|대사|말|혹시"),
    ("split_3", "세 가지|3가지|3개|분류"),
    ("split_5", "다섯|5가지|5개|요소"),
    ("display_explain", "화면|디스플레이|자료|영상"),
    ("card_hierarchy", "카드|그룹|종류|포함"),
    ("action_animation", "행동|움직|변화|애니메이션"),
    ("pictogram", "아이콘|그림|상징|모양"),
    ("callout", "여기|주목|강조|부분|포인트"),
    ("prompt_input", "입력|타이핑|검색|치면|작성"),
    ("big_title", "주제|제목|시작|인트로|오늘"),
    ("mid_title", "챕터|섹션|다음|넘어|이어서"),
];

static TOOL_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .filter_map(|(id, pattern)| Regex::new(pattern).ok().map(|re| (*id, re)))
        .collect()
});

static EXPLANATION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("원리|구조|정의|개념|학습|설명").ok());
static GREETING: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("안녕하세요|반갑습니다|환영합니다").ok());
static EMPHASIS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("놀랍|중요|핵심|기억|위험").ok());
static TEMPO: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("빠르게|순식간|바로|자,|그럼").ok());

fn matches(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
}

fn narration_text(narrations: &[String]) -> String {
    narrations.join(" ")
}

fn clamp_axis(value: f64) -> f64 {
    let clamped = value.clamp(VECTOR_MIN, VECTOR_MAX);
    (clamped * 100.0).round() / 100.0
}

/// Tone vector inferred from narration keywords.
pub fn default_vector(narrations: &[String]) -> SceneVector {
    let text = narration_text(narrations);
    let mut vec = SceneVector {
        emotion: 0.3,
        pace: 0.5,
        information: 0.4,
    };

    if matches(&EXPLANATION, &text) {
        vec.information += 0.4;
    }
    if matches(&GREETING, &text) {
        vec = SceneVector {
            emotion: 0.2,
            pace: 0.4,
            information: 0.2,
        };
    }
    if matches(&EMPHASIS, &text) {
        vec.emotion += 0.4;
    }
    if matches(&TEMPO, &text) {
        vec.pace += 0.3;
    }

    SceneVector {
        emotion: clamp_axis(vec.emotion),
        pace: clamp_axis(vec.pace),
        information: clamp_axis(vec.information),
    }
}

/// Up to two catalog templates whose keywords appear in the narration.
pub fn default_tools(narrations: &[String]) -> ToolControl {
    let text = narration_text(narrations);
    let ranked_tools: Vec<RankedTool> = TOOL_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&text))
        .take(MAX_SUGGESTED_TOOLS)
        .enumerate()
        .map(|(idx, (id, _))| RankedTool {
            tool_id: (*id).to_string(),
            rank: idx as u32 + 1,
            reason: "Keyword Match".to_string(),
        })
        .collect();
    ToolControl {
        source: if ranked_tools.is_empty() {
            TOOLS_SOURCE_DEFAULT.to_string()
        } else {
            TOOLS_SOURCE_FALLBACK.to_string()
        },
        ranked_tools,
        notes: String::new(),
        extra: Default::default(),
    }
}

pub fn default_visual_plans() -> Vec<VisualPlan> {
    ["Plan A", "Plan B"]
        .iter()
        .enumerate()
        .map(|(idx, name)| VisualPlan {
            priority: Some(idx as u32 + 1),
            name: (*name).to_string(),
            description: "No description yet.".to_string(),
            extra: Default::default(),
        })
        .collect()
}

/// Fill missing control data on one scene. Returns true if anything changed.
///
/// Screen-recording scenes are left alone.
pub fn backfill_scene(scene: &mut Scene) -> bool {
    if scene.is_screen_rec {
        return false;
    }
    let mut modified = false;

    if scene.scene_control.is_none() {
        scene.scene_control = Some(SceneControl {
            vector: default_vector(&scene.narrations),
            source: Some(VECTOR_SOURCE_FALLBACK.to_string()),
            extra: Default::default(),
        });
        modified = true;
    }

    if scene.tool_control.is_none() {
        scene.tool_control = Some(default_tools(&scene.narrations));
        tracing::debug!(target: "backfill", "fallback tools for [{}]", scene.formatted_id);
        modified = true;
    }

    if scene.visual_plans.is_empty() {
        scene.visual_plans = default_visual_plans();
        modified = true;
    }

    modified
}

/// Backfill every scene in the document; returns the number of scenes touched.
pub fn backfill_document(doc: &mut DirectorDocument) -> usize {
    let touched = doc
        .scenes_mut()
        .map(backfill_scene)
        .filter(|modified| *modified)
        .count();
    if touched > 0 {
        tracing::info!(target: "backfill", "filled missing control data on {} scene(s)", touched);
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn every_catalog_pattern_compiles() {
        assert_eq!(TOOL_PATTERNS.len(), TOOL_CATALOG.len());
        for pattern in [&EXPLANATION, &GREETING, &EMPHASIS, &TEMPO] {
            assert!(pattern.is_some());
        }
    }

    #[test]
    fn neutral_narration_gets_base_vector() {
        let vec = default_vector(&lines(&["plain words"]));
        assert_eq!(vec.emotion, 0.3);
        assert_eq!(vec.pace, 0.5);
        assert_eq!(vec.information, 0.4);
    }

    #[test]
    fn greeting_resets_vector() {
        let vec = default_vector(&lines(&["안녕하세요 반갑습니다"]));
        assert_eq!(vec.emotion, 0.2);
        assert_eq!(vec.pace, 0.4);
        assert_eq!(vec.information, 0.2);
    }

    #[test]
    fn vector_axes_are_clamped() {
        let vec = default_vector(&lines(&["핵심 원리를 빠르게 설명합니다"]));
        assert_eq!(vec.information, 0.8);
        assert_eq!(vec.emotion, 0.7);
        assert_eq!(vec.pace, 0.8);

        let vec = default_vector(&lines(&["핵심", "원리", "그럼 바로"]));
        assert!(vec.information <= 0.9 && vec.emotion <= 0.9 && vec.pace <= 0.9);
    }

    #[test]
    fn tools_take_first_two_matches_in_catalog_order() {
        let tools = default_tools(&lines(&["세 단계를 비교하는 표"]));
        assert_eq!(tools.source, TOOLS_SOURCE_FALLBACK);
        let ids: Vec<_> = tools.ranked_tools.iter().map(|t| t.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["roadmap", "table"]);
        assert_eq!(tools.ranked_tools[1].rank, 2);
    }

    #[test]
    fn no_match_yields_default_source() {
        let tools = default_tools(&lines(&["xyz"]));
        assert_eq!(tools.source, TOOLS_SOURCE_DEFAULT);
        assert!(tools.ranked_tools.is_empty());
    }

    #[test]
    fn backfill_skips_screen_recordings_and_is_idempotent() {
        let mut doc = DirectorDocument::default();
        doc.sequences.push(crate::Sequence {
            title: "S1".into(),
            scenes: vec![
                Scene::new("S1-01").with_narrations(["오늘의 주제"]),
                Scene {
                    is_screen_rec: true,
                    ..Scene::new("S1-02")
                },
            ],
            ..Default::default()
        });

        assert_eq!(backfill_document(&mut doc), 1);
        let first = &doc.sequences[0].scenes[0];
        assert_eq!(
            first.scene_control.as_ref().unwrap().source.as_deref(),
            Some(VECTOR_SOURCE_FALLBACK)
        );
        assert_eq!(first.visual_plans.len(), 2);
        assert_eq!(first.visual_plans[0].name, "Plan A");
        let rec = &doc.sequences[0].scenes[1];
        assert!(rec.scene_control.is_none() && rec.visual_plans.is_empty());

        assert_eq!(backfill_document(&mut doc), 0);
    }
}
