//! `WorkerBridge` — the caller-facing handle to a transcription worker.
//!
//! ## Data flow
//!
//! ```text
//! caller ──configure/load/submit──► WorkerHandle ──crossbeam──► worker thread
//!                                                                    │
//!   watch<BridgeState> ◄── reduce ◄── event pump ◄──── mpsc ◄────────┘
//!   broadcast<WorkerEvent> ◄───────────┘   │
//!                                          └──► pending oneshot (resolve/reject)
//! ```
//!
//! At most one transcription is outstanding. A second `submit` fails with
//! `Busy` and leaves the first untouched.

pub mod reducer;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buffering::AudioBuffer;
use crate::engine::{EngineConfig, WorkerHandle};
use crate::error::{MurmurError, Result};
use crate::inference::{ModelConfig, SpeechBackend};
use crate::ipc::events::{TranscribeOptions, TranscriptionResult, WorkerCommand, WorkerEvent};

pub use reducer::{reduce, BridgeState, Completion, Transition};

type PendingTranscription = oneshot::Sender<Result<TranscriptionResult>>;

/// Sticky error set when the worker exits without a teardown.
pub const WORKER_STOPPED: &str = "Worker stopped unexpectedly";

struct Shared {
    state: BridgeState,
    pending: Option<PendingTranscription>,
    torn_down: bool,
}

/// Handle to one spawned worker.
pub struct WorkerBridge {
    worker: Option<WorkerHandle>,
    shared: Arc<Mutex<Shared>>,
    state_tx: watch::Sender<BridgeState>,
    event_tx: broadcast::Sender<WorkerEvent>,
    pump: Option<JoinHandle<()>>,
}

impl WorkerBridge {
    /// Spawn a worker and its event pump.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<B: SpeechBackend>(config: EngineConfig, backend: B) -> Self {
        let capacity = config.event_capacity.max(1);
        let (worker, events) = WorkerHandle::spawn(config, Box::new(backend));
        let (state_tx, _) = watch::channel(BridgeState::default());
        let (event_tx, _) = broadcast::channel(capacity);
        let shared = Arc::new(Mutex::new(Shared {
            state: BridgeState::default(),
            pending: None,
            torn_down: false,
        }));

        let pump = tokio::spawn(pump_events(
            events,
            Arc::clone(&shared),
            state_tx.clone(),
            event_tx.clone(),
        ));

        Self {
            worker: Some(worker),
            shared,
            state_tx,
            event_tx,
            pump: Some(pump),
        }
    }

    /// Select the model for the next `load`.
    ///
    /// # Errors
    /// `MurmurError::WorkerUnavailable` after `teardown`.
    pub fn configure(&self, model: ModelConfig) -> Result<()> {
        let worker = self.worker()?;
        info!(model = %model.name, "configure requested");
        let mut shared = self.shared.lock();
        worker.send(WorkerCommand::Configure(model))?;
        // The worker drops its loaded model on configure; stop accepting work now.
        shared.state.is_ready = false;
        self.state_tx.send_replace(shared.state.clone());
        Ok(())
    }

    /// Ask the worker to load the configured model.
    ///
    /// # Errors
    /// `MurmurError::WorkerUnavailable` after `teardown`.
    pub fn load(&self) -> Result<()> {
        let worker = self.worker()?;
        info!("load requested");
        // Held across the send so the pump cannot apply `ready` before the flag is set.
        let mut shared = self.shared.lock();
        worker.send(WorkerCommand::Load)?;
        shared.state.is_loading = true;
        self.state_tx.send_replace(shared.state.clone());
        Ok(())
    }

    /// Queue a transcription and return a handle resolving with its result.
    ///
    /// # Errors
    /// - `MurmurError::Busy` if a transcription is already outstanding.
    /// - `MurmurError::NotReady` if the worker has no model ready.
    /// - `MurmurError::WorkerUnavailable` after `teardown`.
    pub fn submit(
        &self,
        audio: AudioBuffer,
        options: TranscribeOptions,
    ) -> Result<Transcription> {
        let worker = self.worker()?;
        let mut shared = self.shared.lock();
        if shared.pending.is_some() {
            warn!("transcribe rejected: busy");
            return Err(MurmurError::Busy);
        }
        if !shared.state.accepts_transcribe() {
            warn!("transcribe rejected: not ready");
            return Err(MurmurError::NotReady);
        }

        let (tx, rx) = oneshot::channel();
        debug!(seconds = audio.duration_secs(), "transcribe submitted");
        // Sent under the lock so no event can observe the slot before the command exists.
        worker.send(WorkerCommand::Transcribe { audio, options })?;
        shared.pending = Some(tx);
        Ok(Transcription { rx })
    }

    /// Transcribe `audio`, waiting for the worker's result.
    pub async fn transcribe(
        &self,
        audio: AudioBuffer,
        options: TranscribeOptions,
    ) -> Result<TranscriptionResult> {
        self.submit(audio, options)?.await
    }

    /// Current observable state.
    pub fn state(&self) -> BridgeState {
        self.shared.lock().state.clone()
    }

    /// Watch the observable state. The receiver sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.state_tx.subscribe()
    }

    /// Raw worker events, including every partial segment.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Release the worker and reset observable state.
    ///
    /// An outstanding transcription resolves with `MurmurError::Cancelled`.
    /// Idempotent.
    pub fn teardown(&mut self) {
        {
            let mut shared = self.shared.lock();
            if shared.torn_down {
                return;
            }
            shared.torn_down = true;
            if let Some(pending) = shared.pending.take() {
                let _ = pending.send(Err(MurmurError::Cancelled));
            }
            shared.state = BridgeState::default();
            self.state_tx.send_replace(BridgeState::default());
        }

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        info!("worker bridge torn down");
    }

    fn worker(&self) -> Result<&WorkerHandle> {
        self.worker.as_ref().ok_or(MurmurError::WorkerUnavailable)
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for WorkerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBridge")
            .field("worker", &self.worker)
            .field("state", &self.shared.lock().state)
            .finish_non_exhaustive()
    }
}

/// Result of one submitted transcription. Await it.
#[derive(Debug)]
pub struct Transcription {
    rx: oneshot::Receiver<Result<TranscriptionResult>>,
}

impl Future for Transcription {
    type Output = Result<TranscriptionResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(MurmurError::Cancelled)))
    }
}

async fn pump_events(
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    shared: Arc<Mutex<Shared>>,
    state_tx: watch::Sender<BridgeState>,
    event_tx: broadcast::Sender<WorkerEvent>,
) {
    while let Some(event) = events.recv().await {
        // No subscribers is fine.
        let _ = event_tx.send(event.clone());

        let mut guard = shared.lock();
        if guard.torn_down {
            break;
        }
        let current = std::mem::take(&mut guard.state);
        let Transition { state, completion } = reduce(current, &event);
        guard.state = state;

        if let Some(completion) = completion {
            match guard.pending.take() {
                Some(pending) => {
                    let _ = pending.send(completion.into_result());
                }
                None => debug!(?completion, "completion with no pending transcription"),
            }
        }
        state_tx.send_replace(guard.state.clone());
    }

    // The worker is gone without a teardown, e.g. the engine panicked.
    let mut guard = shared.lock();
    if guard.torn_down {
        debug!("event pump stopped");
        return;
    }
    error!("transcription worker stopped unexpectedly");
    if let Some(pending) = guard.pending.take() {
        let _ = pending.send(Err(MurmurError::WorkerUnavailable));
    }
    guard.state.is_loading = false;
    guard.state.is_transcribing = false;
    guard.state.is_ready = false;
    guard.state.loading_progress = None;
    guard.state.error = Some(WORKER_STOPPED.into());
    state_tx.send_replace(guard.state.clone());
}
