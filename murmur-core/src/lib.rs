//! # murmur-core
//!
//! Long-form speech transcription behind a message-passing worker.
//!
//! ## Architecture
//!
//! ```text
//! AudioBuffer (16 kHz mono f32)
//!      │
//! WorkerBridge::submit ──WorkerCommand──► TranscriptionWorker (spawn_blocking)
//!                                              │
//!                                        window::plan (chunk/stride)
//!                                              │
//!                                    InferenceSession → SpeechModel::infer
//!                                              │
//!                                        stitch (global timestamps)
//!                                              │
//! BridgeState / Transcription ◄──WorkerEvent───┘
//! ```
//!
//! The worker owns the model and the audio it was handed. Callers only see
//! events and the projected `BridgeState`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod bridge;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod inference;
pub mod ipc;

// Convenience re-exports for downstream crates
pub use bridge::{BridgeState, Transcription, WorkerBridge};
pub use buffering::{AudioBuffer, Window, SAMPLE_RATE};
pub use engine::{EngineConfig, OverlapPolicy, WorkerState};
pub use error::{MurmurError, Result};
pub use inference::stub::StubBackend;
pub use inference::{Dtype, ModelConfig, SpeechBackend, SpeechModel};
pub use ipc::events::{
    ErrorKind, LoadProgress, LoadStatus, Segment, Task, TranscribeOptions, TranscriptionResult,
    WorkerEvent,
};
