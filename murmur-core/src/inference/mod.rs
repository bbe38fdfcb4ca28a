//! Speech engine abstraction.
//!
//! The engine is an opaque capability split across two traits:
//!
//! - `SpeechBackend::load` acquires and initialises a model, reporting
//!   progress as it goes;
//! - `SpeechModel::infer` runs one window through the loaded model.
//!
//! `&mut self` on both expresses that engines are stateful (decoder caches,
//! scratch buffers). The worker owns the session exclusively, so no lock sits
//! in front of either trait.

pub mod artifacts;
pub mod config;
pub mod session;
pub mod stub;

pub use config::{Dtype, ModelConfig, ModelKey};
pub use session::InferenceSession;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ipc::events::{LoadProgress, Task};

/// A segment as the engine reports it, relative to the start of its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegment {
    pub text: String,
    pub timestamp: [f64; 2],
}

impl RawSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            timestamp: [start, end],
        }
    }
}

/// Engine output for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTranscript {
    pub text: String,
    pub segments: Vec<RawSegment>,
}

/// Resolved options for a single `infer` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOptions {
    /// Language hint; `None` lets the engine detect it.
    pub language: Option<String>,
    pub task: Task,
    /// Ask the engine for segment-level timestamps.
    pub return_timestamps: bool,
}

/// Sink receiving load progress ticks as they happen.
pub type ProgressSink<'a> = dyn FnMut(LoadProgress) + 'a;

/// Contract for a loaded, ready-to-run model.
pub trait SpeechModel: Send + 'static {
    /// Transcribe one window of 16 kHz mono samples.
    ///
    /// # Returns
    /// Segments with timestamps relative to the window start. May be empty if
    /// the window holds no speech.
    ///
    /// # Errors
    /// Any engine failure; the worker aborts the remaining windows.
    fn infer(&mut self, samples: &[f32], options: &InferenceOptions) -> Result<RawTranscript>;
}

/// Contract for whatever knows how to turn a `ModelConfig` into a model.
pub trait SpeechBackend: Send + 'static {
    /// Acquire and initialise the model described by `config`.
    ///
    /// `progress` must be invoked incrementally while artifacts are acquired,
    /// not once at the end.
    ///
    /// # Errors
    /// Missing or corrupt artifacts, or engine initialisation failure.
    fn load(
        &mut self,
        config: &ModelConfig,
        progress: &mut ProgressSink<'_>,
    ) -> Result<Box<dyn SpeechModel>>;
}
