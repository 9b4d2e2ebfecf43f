use thiserror::Error;

mod document;
pub use document::*;
mod backfill;
pub use backfill::*;
mod duration;
pub use duration::*;
mod layout;
pub use layout::*;
mod fit;
pub use fit::*;
mod ruler;
pub use ruler::*;
pub mod clock;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid director document: {0}")]
    InvalidDocument(#[from] serde_json::Error),
    #[error("scene not found: {0}")]
    SceneNotFound(String),
    #[error("unknown mode: {0}")]
    UnknownMode(String),
    #[error("unknown zoom step: {0} (expected in or out)")]
    UnknownZoomStep(String),
}

/// Seconds on the timeline. Kept as a float for layout, rounded only for display.
pub type Seconds = f64;

/// Horizontal pixel coordinate inside the track content area.
pub type Px = f64;
