use project::{AiConfig, PromptSet};
use serde::Serialize;
use timeline::{DirectorDocument, Mode};

use crate::{batch_targets, DirectingDesk, BATCH_MODEL_LABEL};

/// Outcome of a "generate all" run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub success: usize,
    pub failed: usize,
    /// Scene id and error text for every failed scene.
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

/// Progress callback: (scenes done, scenes targeted, scene id just finished).
pub type BatchProgress<'a> = &'a mut dyn FnMut(usize, usize, &str);

/// Direct every target scene of the mode, one after another.
///
/// A failing scene is counted and skipped; the run never aborts early. The
/// caller saves the document once the run is over.
pub fn run_batch(
    desk: &DirectingDesk,
    doc: &mut DirectorDocument,
    mode: Mode,
    prompts: &PromptSet,
    config: &AiConfig,
    on_progress: Option<BatchProgress<'_>>,
) -> BatchSummary {
    let targets = batch_targets(doc, mode);
    let total = targets.len();
    let mut summary = BatchSummary::default();
    let mut on_progress = on_progress;
    tracing::info!(target: "directing", "batch {} start: {} scene(s)", mode, total);

    for (idx, scene_id) in targets.iter().enumerate() {
        let outcome = match doc.scene_mut(scene_id) {
            Some(scene) => desk
                .request_with_label(scene, mode, prompts, config, BATCH_MODEL_LABEL)
                .map(|_| ()),
            None => Err(crate::DirectingError::Timeline(timeline::TimelineError::SceneNotFound(
                scene_id.clone(),
            ))),
        };
        match outcome {
            Ok(()) => summary.success += 1,
            Err(err) => {
                summary.failed += 1;
                summary.failures.push((scene_id.clone(), err.to_string()));
            }
        }
        if let Some(cb) = on_progress.as_mut() {
            cb(idx + 1, total, scene_id);
        }
    }

    tracing::info!(
        target: "directing",
        "batch {} done: {} ok, {} failed",
        mode,
        summary.success,
        summary.failed
    );
    summary
}
