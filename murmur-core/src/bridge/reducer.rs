//! Pure projection of worker events onto observable bridge state.

use serde::Serialize;

use crate::error::{MurmurError, Result};
use crate::inference::ModelConfig;
use crate::ipc::events::{ErrorKind, LoadProgress, Segment, TranscriptionResult, WorkerEvent};

/// What a caller observes about the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeState {
    pub is_loading: bool,
    pub is_ready: bool,
    pub is_transcribing: bool,
    /// Last error message. Sticky until the next configure or successful load.
    pub error: Option<String>,
    pub current_model: Option<ModelConfig>,
    pub loading_progress: Option<LoadProgress>,
    /// Segments received for the current (or last) transcription.
    pub segments: Vec<Segment>,
}

impl BridgeState {
    /// Whether a transcribe request would be accepted by the worker.
    pub fn accepts_transcribe(&self) -> bool {
        self.is_ready && !self.is_loading && !self.is_transcribing
    }
}

/// Outcome delivered to the pending transcription, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Resolve(TranscriptionResult),
    Reject { kind: ErrorKind, message: String },
}

impl Completion {
    pub fn into_result(self) -> Result<TranscriptionResult> {
        match self {
            Completion::Resolve(result) => Ok(result),
            Completion::Reject { kind, message } => Err(match kind {
                ErrorKind::Load => MurmurError::Load(message),
                ErrorKind::Inference => MurmurError::Inference(message),
                ErrorKind::NotReady => MurmurError::NotReady,
                ErrorKind::InvalidRequest => MurmurError::InvalidOptions(message),
            }),
        }
    }
}

/// State after an event, plus the completion it triggers.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: BridgeState,
    pub completion: Option<Completion>,
}

/// Apply one worker event.
///
/// The final result is built from the segments the bridge accumulated, so a
/// resolved transcription always equals the partials observed before it.
pub fn reduce(mut state: BridgeState, event: &WorkerEvent) -> Transition {
    let mut completion = None;

    match event {
        WorkerEvent::Configured { model } => {
            state.current_model = Some(model.clone());
            state.is_ready = false;
            state.error = None;
        }
        WorkerEvent::Loading { progress } => {
            state.is_loading = true;
            state.loading_progress = Some(progress.clone());
        }
        WorkerEvent::Ready => {
            state.is_loading = false;
            state.is_ready = true;
            state.loading_progress = None;
            state.error = None;
        }
        WorkerEvent::TranscribeStart { .. } => {
            state.is_transcribing = true;
            state.segments.clear();
        }
        WorkerEvent::Partial { segment } => {
            state.segments.push(segment.clone());
        }
        WorkerEvent::TranscribeComplete { .. } => {
            state.is_transcribing = false;
            completion = Some(Completion::Resolve(TranscriptionResult::from_segments(
                state.segments.clone(),
            )));
        }
        WorkerEvent::Error { kind, message } => {
            state.is_loading = false;
            state.is_transcribing = false;
            state.loading_progress = None;
            if kind.is_fatal() {
                state.is_ready = false;
            }
            state.error = Some(message.clone());
            completion = Some(Completion::Reject {
                kind: *kind,
                message: message.clone(),
            });
        }
    }

    Transition { state, completion }
}
