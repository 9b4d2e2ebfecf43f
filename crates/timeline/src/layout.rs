use serde::{Deserialize, Serialize};

use crate::{scene_duration, DirectorDocument, Mode, Px, Seconds};

/// Horizontal spacing constants for the track area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub start_offset: Px,
    pub scene_gap: Px,
    pub sequence_gap: Px,
    pub trailing_margin: Px,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            start_offset: 20.0,
            scene_gap: 2.0,
            sequence_gap: 30.0,
            trailing_margin: 100.0,
        }
    }
}

impl LayoutParams {
    /// X position of a timestamp measured from the start of the track area.
    pub fn x_at(&self, seconds: Seconds, zoom: f64) -> Px {
        self.start_offset + clip_width(seconds, zoom)
    }
}

pub fn clip_width(duration: Seconds, zoom: f64) -> Px {
    duration * zoom
}

/// Vertical band of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub top: Px,
    pub height: Px,
}

impl Lane {
    pub fn contains(&self, y: Px) -> bool {
        y >= self.top && y < self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Scene,
    Experience,
    AiGeneral,
    AiExperience,
}

impl TrackKind {
    pub const ALL: [TrackKind; 4] = [
        TrackKind::Scene,
        TrackKind::Experience,
        TrackKind::AiGeneral,
        TrackKind::AiExperience,
    ];

    pub fn lane(&self) -> Lane {
        match self {
            TrackKind::Scene => Lane { top: 80.0, height: 50.0 },
            TrackKind::Experience => Lane { top: 135.0, height: 30.0 },
            TrackKind::AiGeneral => Lane { top: 180.0, height: 25.0 },
            TrackKind::AiExperience => Lane { top: 215.0, height: 25.0 },
        }
    }

    pub fn ai_track(mode: Mode) -> TrackKind {
        match mode {
            Mode::General => TrackKind::AiGeneral,
            Mode::Experience => TrackKind::AiExperience,
        }
    }
}

/// One rectangle on one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub scene_id: String,
    pub track: TrackKind,
    pub x: Px,
    pub width: Px,
    pub duration: Seconds,
}

impl Clip {
    pub fn end(&self) -> Px {
        self.x + self.width
    }

    pub fn contains(&self, x: Px, y: Px) -> bool {
        x >= self.x && x < self.end() && self.track.lane().contains(y)
    }
}

/// Bracket drawn above a sequence's clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSpan {
    pub title: String,
    pub caption: String,
    pub x: Px,
    pub width: Px,
    pub scene_count: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineLayout {
    pub zoom: f64,
    pub clips: Vec<Clip>,
    pub spans: Vec<SequenceSpan>,
    pub content_width: Px,
    pub total_duration: Seconds,
}

impl TimelineLayout {
    pub fn clips_on(&self, track: TrackKind) -> impl Iterator<Item = &Clip> {
        self.clips.iter().filter(move |c| c.track == track)
    }

    pub fn clip_for(&self, scene_id: &str, track: TrackKind) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|c| c.track == track && c.scene_id == scene_id)
    }

    /// Topmost clip under a point in content coordinates.
    pub fn hit_test(&self, x: Px, y: Px) -> Option<&Clip> {
        self.clips.iter().find(|c| c.contains(x, y))
    }
}

/// Lay out every scene of the document at the given zoom (px per second).
///
/// Pure: the same document, zoom and params always give the same layout.
pub fn layout_document(doc: &DirectorDocument, zoom: f64, params: &LayoutParams) -> TimelineLayout {
    let mut clips = Vec::new();
    let mut spans = Vec::with_capacity(doc.sequences.len());
    let mut cursor = params.start_offset;
    let mut total_duration = 0.0;

    for seq in &doc.sequences {
        let seq_start = cursor;
        let mut seq_end = seq_start;

        for scene in &seq.scenes {
            let duration = scene_duration(scene);
            let width = clip_width(duration, zoom);
            total_duration += duration;

            let mut emit = |track: TrackKind| {
                clips.push(Clip {
                    scene_id: scene.formatted_id.clone(),
                    track,
                    x: cursor,
                    width,
                    duration,
                })
            };

            emit(TrackKind::Scene);
            if !scene.is_screen_rec {
                if scene.has_experience() {
                    emit(TrackKind::Experience);
                }
                for mode in Mode::ALL {
                    if scene.current_plan(mode).is_some() {
                        emit(TrackKind::ai_track(mode));
                    }
                }
            }

            seq_end = cursor + width;
            cursor += width + params.scene_gap;
        }

        spans.push(SequenceSpan {
            title: seq.title.clone(),
            caption: seq.caption().to_string(),
            x: seq_start,
            width: seq_end - seq_start,
            scene_count: seq.scenes.len(),
        });
        cursor += params.sequence_gap;
    }

    TimelineLayout {
        zoom,
        clips,
        spans,
        content_width: cursor + params.trailing_margin,
        total_duration,
    }
}
