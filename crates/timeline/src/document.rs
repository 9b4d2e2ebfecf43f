use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

use crate::TimelineError;

/// Planning mode. Every mode-specific field on a [`Scene`] is reached through
/// [`Scene::plan_slot`] / [`Scene::plan_slot_mut`] keyed by this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    General,
    Experience,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::General, Mode::Experience];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Experience => "experience",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = TimelineError;

    // Older documents and payloads spell the modes several ways.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "normal" | "all" | "std" => Ok(Mode::General),
            "experience" | "exp" => Ok(Mode::Experience),
            other => Err(TimelineError::UnknownMode(other.to_string())),
        }
    }
}

/// The hierarchical sequences → scenes document rendered by the timeline.
///
/// Unknown keys are preserved in `extra` so a load/save cycle never drops
/// data the console does not model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DirectorDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sequences: Vec<Sequence>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DirectorDocument {
    pub fn from_json(raw: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, TimelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// All scenes in timeline order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.sequences.iter().flat_map(|seq| seq.scenes.iter())
    }

    pub fn scenes_mut(&mut self) -> impl Iterator<Item = &mut Scene> {
        self.sequences.iter_mut().flat_map(|seq| seq.scenes.iter_mut())
    }

    pub fn scene(&self, formatted_id: &str) -> Option<&Scene> {
        self.scenes().find(|s| s.formatted_id == formatted_id)
    }

    pub fn scene_mut(&mut self, formatted_id: &str) -> Option<&mut Scene> {
        self.scenes_mut().find(|s| s.formatted_id == formatted_id)
    }

    pub fn require_scene_mut(&mut self, formatted_id: &str) -> Result<&mut Scene, TimelineError> {
        self.scene_mut(formatted_id)
            .ok_or_else(|| TimelineError::SceneNotFound(formatted_id.to_string()))
    }

    pub fn scene_count(&self) -> usize {
        self.sequences.iter().map(|seq| seq.scenes.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Sequence {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_popup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scenes: Vec<Scene>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sequence {
    /// Text shown under the sequence bracket: popup, then description, then synopsis.
    pub fn caption(&self) -> &str {
        [&self.plot_popup, &self.description, &self.synopsis]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    pub formatted_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub narrations: Vec<String>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub total_char_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_screen_rec: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub visual_plans: Vec<VisualPlan>,
    #[serde(default, deserialize_with = "lenient_index")]
    pub selected_plan: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_control: Option<SceneControl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_control: Option<ToolControl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_track: Option<ExperienceTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_planning: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_history: Vec<AiPlanRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_planning_exp: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_history_exp: Vec<AiPlanRecord>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub keyword_emphasis: Vec<KeywordEmphasis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_advice: Option<AssetAdvice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Borrowed view of one mode's current plan and history.
#[derive(Debug, Clone, Copy)]
pub struct PlanSlot<'a> {
    pub current: Option<&'a Value>,
    pub history: &'a [AiPlanRecord],
}

#[derive(Debug)]
pub struct PlanSlotMut<'a> {
    pub current: &'a mut Option<Value>,
    pub history: &'a mut Vec<AiPlanRecord>,
}

impl Scene {
    pub fn new(formatted_id: impl Into<String>) -> Self {
        Self {
            formatted_id: formatted_id.into(),
            ..Default::default()
        }
    }

    pub fn with_narrations<I, S>(mut self, narrations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.narrations = narrations.into_iter().map(Into::into).collect();
        self
    }

    pub fn plan_slot(&self, mode: Mode) -> PlanSlot<'_> {
        match mode {
            Mode::General => PlanSlot {
                current: self.ai_planning.as_ref(),
                history: &self.ai_history,
            },
            Mode::Experience => PlanSlot {
                current: self.ai_planning_exp.as_ref(),
                history: &self.ai_history_exp,
            },
        }
    }

    pub fn plan_slot_mut(&mut self, mode: Mode) -> PlanSlotMut<'_> {
        match mode {
            Mode::General => PlanSlotMut {
                current: &mut self.ai_planning,
                history: &mut self.ai_history,
            },
            Mode::Experience => PlanSlotMut {
                current: &mut self.ai_planning_exp,
                history: &mut self.ai_history_exp,
            },
        }
    }

    pub fn current_plan(&self, mode: Mode) -> Option<&Value> {
        self.plan_slot(mode).current
    }

    pub fn has_experience(&self) -> bool {
        self.experience_track
            .as_ref()
            .map(|exp| exp.has_experience)
            .unwrap_or(false)
    }

    /// Toggle the experience track. Turning it off clears the track entirely.
    pub fn set_experience(&mut self, enabled: bool) {
        if enabled {
            self.experience_track
                .get_or_insert_with(ExperienceTrack::default)
                .has_experience = true;
        } else {
            self.experience_track = None;
        }
    }

    pub fn selected_visual_plan(&self) -> Option<&VisualPlan> {
        self.visual_plans.get(self.selected_plan)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SceneControl {
    pub vector: SceneVector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Editorial tone of a scene; each axis lives in `[0.1, 0.9]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SceneVector {
    pub emotion: f64,
    pub pace: f64,
    pub information: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolControl {
    #[serde(default)]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ranked_tools: Vec<RankedTool>,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankedTool {
    pub tool_id: String,
    pub rank: u32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperienceTrack {
    #[serde(default)]
    pub has_experience: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub interaction_type: String,
    #[serde(default)]
    pub guide: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a scene's append-only plan history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiPlanRecord {
    pub id: i64,
    /// Unreadable timestamps load as the Unix epoch.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub model: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordEmphasis {
    #[serde(default)]
    pub keyword: String,
    #[serde(default = "default_keyword_location")]
    pub location: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub highlight: String,
    #[serde(default)]
    pub sub_text: String,
}

impl Default for KeywordEmphasis {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            location: default_keyword_location(),
            action: String::new(),
            highlight: String::new(),
            sub_text: String::new(),
        }
    }
}

fn default_keyword_location() -> String {
    "Center".to_string()
}

pub const ASSET_STOCK_SEARCH: &str = "Stock_Search";
pub const ASSET_GEN_AI_IMAGE: &str = "Gen_AI_Image";
pub const ASSET_GEN_AI_VIDEO: &str = "Gen_AI_Video";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetAdvice {
    #[serde(rename = "type", default = "default_asset_kind")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

fn default_asset_kind() -> String {
    ASSET_STOCK_SEARCH.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Non-negative whole number from an integer, a float or a numeric string.
fn whole_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then(|| number.max(0.0).floor())
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v.as_u64() {
        Some(exact) => Some(exact),
        None => whole_number(&v).map(|n| n as u64),
    }))
}

/// Negative or unreadable indexes select the first entry.
fn lenient_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(whole_number)
        .map(|n| usize::try_from(n as u64).unwrap_or(usize::MAX))
        .unwrap_or_default())
}

const LOOSE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = LOOSE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(Utc.from_utc_datetime(&naive))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(raw)) => parse_timestamp(&raw),
        Some(Value::Number(ms)) => ms.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    Ok(parsed.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}
