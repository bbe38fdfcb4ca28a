//! Messages exchanged between the bridge and the transcription worker.
//!
//! ## Direction
//!
//! | Type | Direction |
//! |------|-----------|
//! | `WorkerCommand` | bridge → worker |
//! | `WorkerEvent` | worker → bridge |
//!
//! `WorkerEvent` serialises as a `type`-tagged JSON object (kebab-case tags,
//! camelCase fields) so a host can forward it across a process or UI boundary
//! unchanged. Commands carry an owned `AudioBuffer` and never leave the process.

use serde::{Deserialize, Serialize};

use crate::buffering::AudioBuffer;
use crate::inference::config::ModelConfig;

// ---------------------------------------------------------------------------
// Transcript data
// ---------------------------------------------------------------------------

/// One timestamped span of transcribed text, on the buffer's global timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub text: String,
    /// `[start, end]` in seconds from the start of the buffer.
    pub timestamp: [f64; 2],
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            timestamp: [start, end],
        }
    }

    pub fn start(&self) -> f64 {
        self.timestamp[0]
    }

    pub fn end(&self) -> f64 {
        self.timestamp[1]
    }
}

/// Aggregate result of one transcribe call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResult {
    /// Segment texts joined with a single space, in emission order.
    pub text: String,
    pub segments: Vec<Segment>,
}

impl TranscriptionResult {
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, segments }
    }
}

// ---------------------------------------------------------------------------
// Load progress
// ---------------------------------------------------------------------------

/// Phase of a model artifact while the engine acquires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// Artifact acquisition started.
    Initiate,
    /// Bytes are arriving; `fraction` is meaningful.
    Progress,
    /// Artifact finished.
    Done,
    /// Every artifact is in place and the model is initialised.
    Ready,
}

/// One progress tick reported while a model loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProgress {
    pub status: LoadStatus,
    /// Overall load completion in `[0.0, 1.0]`.
    pub fraction: f32,
    /// Artifact name, empty for whole-model ticks.
    pub file: String,
}

impl LoadProgress {
    pub fn new(status: LoadStatus, fraction: f32, file: impl Into<String>) -> Self {
        Self {
            status,
            fraction: fraction.clamp(0.0, 1.0),
            file: file.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transcribe options
// ---------------------------------------------------------------------------

/// What the engine should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

/// Per-call options. Unset fields fall back to the model and engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub task: Task,
    pub chunk_seconds: Option<f64>,
    pub stride_seconds: Option<f64>,
}

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// A request processed by the worker, strictly in send order.
#[derive(Debug)]
pub enum WorkerCommand {
    Configure(ModelConfig),
    Load,
    Transcribe {
        audio: AudioBuffer,
        options: TranscribeOptions,
    },
}

/// Category of a worker `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Model acquisition or initialisation failed. Worker state → Error.
    Load,
    /// A window's inference call failed. Worker state → Error.
    Inference,
    /// Transcribe arrived outside `Ready`. Worker state unchanged.
    NotReady,
    /// Transcribe options were rejected. Worker state unchanged.
    InvalidRequest,
}

impl ErrorKind {
    /// Whether the worker left `Ready` because of this error.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Load | ErrorKind::Inference)
    }
}

/// Lifecycle event emitted by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerEvent {
    Configured {
        model: ModelConfig,
    },
    Loading {
        progress: LoadProgress,
    },
    Ready,
    #[serde(rename_all = "camelCase")]
    TranscribeStart {
        /// Number of windows the buffer was split into.
        window_count: usize,
    },
    Partial {
        segment: Segment,
    },
    TranscribeComplete {
        result: TranscriptionResult,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}
