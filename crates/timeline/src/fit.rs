use std::str::FromStr;

use crate::{total_duration, DirectorDocument, LayoutParams, Px, Seconds, TimelineError};

pub const ZOOM_MIN: f64 = 0.2;
pub const ZOOM_MAX: f64 = 13.0;
pub const DEFAULT_ZOOM: f64 = 5.0;

/// Extra right-hand slack reserved when fitting.
pub const FIT_MARGIN: Px = 50.0;

const ZOOM_IN_FACTOR: f64 = 1.1;
const ZOOM_OUT_FACTOR: f64 = 0.9;

pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_nan() {
        return DEFAULT_ZOOM;
    }
    zoom.clamp(ZOOM_MIN, ZOOM_MAX)
}

/// Zoom that makes `total` seconds fit in `viewport` pixels.
///
/// Returns `None` when there is nothing to fit; callers keep their previous
/// zoom in that case.
pub fn fit_zoom(viewport: Px, total: Seconds, sequence_count: usize, params: &LayoutParams) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    let available =
        viewport - params.start_offset - sequence_count as f64 * params.sequence_gap - FIT_MARGIN;
    if available <= 0.0 {
        return Some(ZOOM_MIN);
    }
    Some(clamp_zoom(available / total))
}

/// Fit the whole document, falling back to `current` when it has no scenes.
pub fn fit_document(doc: &DirectorDocument, viewport: Px, current: f64, params: &LayoutParams) -> f64 {
    let total = total_duration(doc);
    match fit_zoom(viewport, total, doc.sequences.len(), params) {
        Some(zoom) => {
            tracing::debug!(target: "timeline", "fit {:.1}s into {}px -> zoom {:.3}", total, viewport, zoom);
            zoom
        }
        None => current,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomStep {
    In,
    Out,
}

impl FromStr for ZoomStep {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "+" => Ok(ZoomStep::In),
            "out" | "-" => Ok(ZoomStep::Out),
            other => Err(TimelineError::UnknownZoomStep(other.to_string())),
        }
    }
}

pub fn step_zoom(zoom: f64, step: ZoomStep) -> f64 {
    let factor = match step {
        ZoomStep::In => ZOOM_IN_FACTOR,
        ZoomStep::Out => ZOOM_OUT_FACTOR,
    };
    clamp_zoom(zoom * factor)
}
