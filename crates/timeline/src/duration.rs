use crate::{DirectorDocument, Scene, Seconds};

/// Narration reading speed: 7000 characters per 20 minutes.
pub const CHARS_PER_SECOND: f64 = 7000.0 / 1200.0;

/// No scene is ever shorter than this on the timeline.
pub const MIN_SCENE_SECONDS: Seconds = 1.0;

/// Characters across all narrations, joined with no separator.
pub fn narration_char_count(narrations: &[String]) -> u64 {
    narrations.iter().map(|n| n.chars().count() as u64).sum()
}

pub fn duration_for_chars(chars: u64) -> Seconds {
    (chars as f64 / CHARS_PER_SECOND).max(MIN_SCENE_SECONDS)
}

/// A positive precomputed count wins over counting narration text.
pub fn scene_char_count(scene: &Scene) -> u64 {
    match scene.total_char_count {
        Some(count) if count > 0 => count,
        _ => narration_char_count(&scene.narrations),
    }
}

pub fn scene_duration(scene: &Scene) -> Seconds {
    duration_for_chars(scene_char_count(scene))
}

/// Sum of scene durations, excluding gaps.
pub fn total_duration(doc: &DirectorDocument) -> Seconds {
    doc.scenes().map(scene_duration).sum()
}

/// Display rounding only; layout always uses the unrounded value.
pub fn format_seconds(seconds: Seconds) -> String {
    format!("{:.1}s", seconds)
}
