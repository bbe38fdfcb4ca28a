//! `StubBackend` — placeholder engine that describes audio instead of recognising it.
//!
//! Lets the full worker/bridge path run end-to-end without model weights.
//! When a models directory is set, loading still checks the real artifact
//! layout so hosts can exercise missing-model handling.

use std::path::PathBuf;

use tracing::debug;

use crate::buffering::SAMPLE_RATE;
use crate::error::Result;
use crate::inference::artifacts::{required_artifacts, resolve_local};
use crate::inference::{
    InferenceOptions, ModelConfig, ProgressSink, RawSegment, RawTranscript, SpeechBackend,
    SpeechModel,
};
use crate::ipc::events::{LoadProgress, LoadStatus};

/// Seconds of audio described by each stub segment.
const SEGMENT_SECONDS: f64 = 10.0;

/// Windows shorter than this (10 ms) are treated as empty.
const MIN_SAMPLES: usize = 160;

/// Backend producing `StubModel`s.
#[derive(Debug, Clone, Default)]
pub struct StubBackend {
    models_dir: Option<PathBuf>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the configured model's artifacts under `models_dir`.
    pub fn with_models_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: Some(models_dir.into()),
        }
    }
}

impl SpeechBackend for StubBackend {
    fn load(
        &mut self,
        config: &ModelConfig,
        progress: &mut ProgressSink<'_>,
    ) -> Result<Box<dyn SpeechModel>> {
        match &self.models_dir {
            Some(dir) => {
                resolve_local(dir, config, progress)?;
            }
            None => {
                let names = required_artifacts(config);
                let count = names.len() as f32;
                for (i, name) in names.iter().enumerate() {
                    progress(LoadProgress::new(LoadStatus::Initiate, i as f32 / count, name.as_str()));
                    progress(LoadProgress::new(
                        LoadStatus::Done,
                        (i + 1) as f32 / count,
                        name.as_str(),
                    ));
                }
            }
        }
        progress(LoadProgress::new(LoadStatus::Ready, 1.0, ""));
        debug!(model = %config.name, "StubBackend::load");
        Ok(Box::new(StubModel::new(config.name.clone())))
    }
}

/// Echo-style stub model.
///
/// Every `SEGMENT_SECONDS` of a window becomes one segment reading
/// `"[<model> <start>-<end>s]"`, timestamps relative to the window.
pub struct StubModel {
    label: String,
    calls: u32,
}

impl StubModel {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            calls: 0,
        }
    }
}

impl SpeechModel for StubModel {
    fn infer(&mut self, samples: &[f32], options: &InferenceOptions) -> Result<RawTranscript> {
        self.calls += 1;
        if samples.len() < MIN_SAMPLES {
            return Ok(RawTranscript::default());
        }

        let duration = samples.len() as f64 / SAMPLE_RATE as f64;
        let lang = options.language.as_deref().unwrap_or("auto");
        let mut segments = Vec::new();
        let mut start = 0.0;
        while start < duration {
            let end = (start + SEGMENT_SECONDS).min(duration);
            segments.push(RawSegment::new(
                format!("[{} {lang} {start:.1}-{end:.1}s]", self.label),
                start,
                end,
            ));
            start = end;
        }
        debug!(call = self.calls, segments = segments.len(), "StubModel::infer");

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(RawTranscript { text, segments })
    }
}
