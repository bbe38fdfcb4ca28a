//! Transcription worker: configuration, state and the spawned command loop.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──load──► Loading ──ok──► Ready ──transcribe──► Transcribing
//!                            │              ▲                        │
//!                            └──err──► Error ◄────────infer err──────┘
//!                                         └──load──► Loading
//! ```
//!
//! `configure` is accepted in every state and never moves the state itself.
//!
//! ## Threading
//!
//! Inference is CPU/accelerator-bound, so the loop runs on a
//! `spawn_blocking` thread. Commands arrive over a crossbeam channel, events
//! leave over an unbounded tokio mpsc channel. Nothing else is shared: the
//! audio buffer moves into the worker with its command.

pub mod stitch;
pub mod worker;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::{MurmurError, Result};
use crate::inference::config::{catalog_model, ModelConfig, DEFAULT_MODEL_KEY};
use crate::inference::{InferenceSession, SpeechBackend};
use crate::ipc::events::{WorkerCommand, WorkerEvent};

pub use stitch::OverlapPolicy;
pub use worker::{EventSink, TranscriptionWorker, WorkerContext};

/// Default window length: the Whisper encoder context.
pub const DEFAULT_CHUNK_SECONDS: f64 = 30.0;
/// Default overlap between consecutive windows.
pub const DEFAULT_STRIDE_SECONDS: f64 = 5.0;

/// Configuration for the transcription worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct EngineConfig {
    /// Longest span handed to the engine in one call (seconds). Default: 30.
    pub chunk_seconds: f64,
    /// Audio shared by consecutive windows (seconds). Default: 5.
    pub stride_seconds: f64,
    /// Treatment of text transcribed twice in the shared region.
    pub overlap_policy: OverlapPolicy,
    /// Model used by `load` when nothing was configured. Default: tiny English.
    pub default_model: Option<ModelConfig>,
    /// Raw events buffered for slow `subscribe_events` consumers.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            stride_seconds: DEFAULT_STRIDE_SECONDS,
            overlap_policy: OverlapPolicy::Keep,
            default_model: catalog_model(DEFAULT_MODEL_KEY),
            event_capacity: 256,
        }
    }
}

/// Current state of the transcription worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// No load attempted yet.
    #[default]
    Uninitialized,
    /// Acquiring or initialising the model.
    Loading,
    /// Model loaded, idle.
    Ready,
    /// Working through the windows of one buffer.
    Transcribing,
    /// Last load or transcription failed. `load` recovers.
    Error,
}

/// Owner-side handle of a spawned worker.
///
/// Dropping the handle (or calling `shutdown`) closes the command channel;
/// the worker finishes its current command and exits.
pub struct WorkerHandle {
    commands: Sender<WorkerCommand>,
}

impl WorkerHandle {
    /// Spawn a worker on the blocking pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: EngineConfig,
        backend: Box<dyn SpeechBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = TranscriptionWorker::new(config, InferenceSession::from_boxed(backend));
        tokio::task::spawn_blocking(move || {
            worker::run(WorkerContext {
                worker,
                commands: command_rx,
                events: event_tx,
            });
        });
        info!("transcription worker spawned");

        (Self { commands: command_tx }, event_rx)
    }

    /// Queue a command. Commands are processed strictly in send order.
    ///
    /// # Errors
    /// `MurmurError::WorkerUnavailable` if the worker loop has exited.
    pub fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| MurmurError::WorkerUnavailable)
    }

    /// Close the command channel and let the worker wind down.
    pub fn shutdown(self) {
        info!("transcription worker shutdown requested");
        drop(self.commands);
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("queued", &self.commands.len())
            .finish()
    }
}
