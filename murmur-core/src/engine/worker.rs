//! The worker's command loop and per-command state machine.
//!
//! ## Per transcribe command
//!
//! ```text
//! 1. Reject unless Ready with a loaded model (state unchanged)
//! 2. Plan windows over the buffer (chunk/stride from options or config)
//! 3. Emit transcribe-start, state = Transcribing
//! 4. For each window in order:
//!    a. infer on the window's samples
//!    b. stitch: shift timestamps by the window offset
//!    c. emit one partial per segment, accumulate
//! 5. state = Ready, emit transcribe-complete with the accumulated segments
//! ```
//!
//! An inference failure aborts the remaining windows, sets state = Error and
//! emits a single error event. Partials already emitted stay emitted.

use crossbeam_channel::Receiver;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn};

use crate::buffering::{plan, AudioBuffer, SAMPLE_RATE};
use crate::engine::stitch::{dedupe_overlap, stitch, OverlapPolicy};
use crate::engine::{EngineConfig, WorkerState};
use crate::inference::{InferenceOptions, InferenceSession, ModelConfig, RawSegment};
use crate::ipc::events::{
    ErrorKind, Segment, TranscribeOptions, TranscriptionResult, WorkerCommand, WorkerEvent,
};

/// Destination of worker events.
pub trait EventSink {
    fn emit(&mut self, event: WorkerEvent);

    /// True once nobody can observe further events. Checked between windows.
    fn is_closed(&self) -> bool {
        false
    }
}

impl EventSink for Vec<WorkerEvent> {
    fn emit(&mut self, event: WorkerEvent) {
        self.push(event);
    }
}

impl EventSink for mpsc::UnboundedSender<WorkerEvent> {
    fn emit(&mut self, event: WorkerEvent) {
        // A closed receiver means the bridge is gone; the loop notices via is_closed.
        let _ = self.send(event);
    }

    fn is_closed(&self) -> bool {
        mpsc::UnboundedSender::is_closed(self)
    }
}

/// Counters kept for the worker's lifetime and logged on exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerDiagnostics {
    pub loads: usize,
    pub load_errors: usize,
    pub transcriptions: usize,
    pub windows_inferred: usize,
    pub inference_errors: usize,
    pub segments_emitted: usize,
}

/// Everything the spawned loop needs, passed as one struct.
///
/// Field order matters: `commands` drops before `events`, so once the bridge
/// sees the event channel close, new commands already fail to send.
pub struct WorkerContext {
    pub worker: TranscriptionWorker,
    pub commands: Receiver<WorkerCommand>,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
}

/// Run the blocking command loop until the command channel closes.
pub fn run(mut ctx: WorkerContext) {
    info!("transcription worker started");

    while let Ok(command) = ctx.commands.recv() {
        ctx.worker.handle(command, &mut ctx.events);
        if ctx.events.is_closed() {
            debug!("event receiver dropped, stopping worker");
            break;
        }
    }

    let diag = ctx.worker.diagnostics();
    info!(
        loads = diag.loads,
        load_errors = diag.load_errors,
        transcriptions = diag.transcriptions,
        windows_inferred = diag.windows_inferred,
        inference_errors = diag.inference_errors,
        segments_emitted = diag.segments_emitted,
        "transcription worker stopped"
    );
}

/// Owns the inference session and applies commands to it.
pub struct TranscriptionWorker {
    config: EngineConfig,
    session: InferenceSession,
    state: WorkerState,
    diagnostics: WorkerDiagnostics,
}

impl TranscriptionWorker {
    pub fn new(config: EngineConfig, mut session: InferenceSession) -> Self {
        if session.config().is_none() {
            if let Some(model) = config.default_model.clone() {
                session.configure(model);
            }
        }
        Self {
            config,
            session,
            state: WorkerState::Uninitialized,
            diagnostics: WorkerDiagnostics::default(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn model(&self) -> Option<&ModelConfig> {
        self.session.config()
    }

    pub fn diagnostics(&self) -> WorkerDiagnostics {
        self.diagnostics
    }

    /// Apply one command, emitting its events into `sink`.
    pub fn handle(&mut self, command: WorkerCommand, sink: &mut dyn EventSink) {
        match command {
            WorkerCommand::Configure(model) => self.configure(model, sink),
            WorkerCommand::Load => self.load(sink),
            WorkerCommand::Transcribe { audio, options } => self.transcribe(audio, options, sink),
        }
    }

    fn configure(&mut self, model: ModelConfig, sink: &mut dyn EventSink) {
        info!(model = %model.name, path = %model.path, "model configured");
        self.session.configure(model.clone());
        self.session.reset();
        sink.emit(WorkerEvent::Configured { model });
    }

    fn load(&mut self, sink: &mut dyn EventSink) {
        self.state = WorkerState::Loading;
        self.diagnostics.loads += 1;
        let name = self
            .session
            .config()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "<none>".into());

        let outcome = self
            .session
            .ensure_loaded(&mut |progress| sink.emit(WorkerEvent::Loading { progress }));

        match outcome {
            Ok(()) => {
                self.state = WorkerState::Ready;
                info!(model = %name, "worker ready");
                sink.emit(WorkerEvent::Ready);
            }
            Err(e) => {
                self.state = WorkerState::Error;
                self.diagnostics.load_errors += 1;
                error!(model = %name, error = %e, "model load failed");
                sink.emit(WorkerEvent::Error {
                    kind: ErrorKind::Load,
                    message: format!("Failed to load model {name}: {e}"),
                });
            }
        }
    }

    fn transcribe(
        &mut self,
        audio: AudioBuffer,
        options: TranscribeOptions,
        sink: &mut dyn EventSink,
    ) {
        if self.state != WorkerState::Ready || !self.session.is_loaded() {
            warn!(state = ?self.state, "transcribe rejected: worker not ready");
            sink.emit(WorkerEvent::Error {
                kind: ErrorKind::NotReady,
                message: "Worker not ready".into(),
            });
            return;
        }

        let chunk_seconds = options.chunk_seconds.unwrap_or(self.config.chunk_seconds);
        let stride_seconds = options.stride_seconds.unwrap_or(self.config.stride_seconds);
        let windows = match plan(audio.len(), SAMPLE_RATE, chunk_seconds, stride_seconds) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "transcribe rejected: invalid window geometry");
                sink.emit(WorkerEvent::Error {
                    kind: ErrorKind::InvalidRequest,
                    message: e.to_string(),
                });
                return;
            }
        };

        let infer_options = InferenceOptions {
            language: options
                .language
                .or_else(|| self.session.config().and_then(|m| m.language.clone())),
            task: options.task,
            return_timestamps: true,
        };

        let span = info_span!(
            "transcription",
            seconds = format_args!("{:.1}", audio.duration_secs()),
            windows = windows.len(),
        );
        let _enter = span.enter();

        self.state = WorkerState::Transcribing;
        self.diagnostics.transcriptions += 1;
        info!("transcription started");
        sink.emit(WorkerEvent::TranscribeStart {
            window_count: windows.len(),
        });

        let mut collected: Vec<Segment> = Vec::new();
        let mut covered_until = 0.0f64;

        for (index, window) in windows.iter().enumerate() {
            if sink.is_closed() {
                warn!(window = index, "event receiver gone, abandoning remaining windows");
                self.state = WorkerState::Ready;
                return;
            }

            let samples = audio.slice(window);
            let raw = match self.session.infer(samples, &infer_options) {
                Ok(raw) => raw,
                Err(e) => {
                    self.state = WorkerState::Error;
                    self.diagnostics.inference_errors += 1;
                    error!(window = index, error = %e, "inference failed, aborting transcription");
                    sink.emit(WorkerEvent::Error {
                        kind: ErrorKind::Inference,
                        message: format!("Transcription failed: {e}"),
                    });
                    return;
                }
            };
            self.diagnostics.windows_inferred += 1;

            let mut raw_segments = raw.segments;
            if raw_segments.is_empty() && !raw.text.trim().is_empty() {
                // Engine gave text without timestamps: attribute it to the whole window.
                let span_seconds = window.len() as f64 / SAMPLE_RATE as f64;
                raw_segments.push(RawSegment::new(raw.text, 0.0, span_seconds));
            }

            let mut segments = stitch(raw_segments, window.offset_seconds);
            if self.config.overlap_policy == OverlapPolicy::DropOverlapping {
                segments = dedupe_overlap(segments, &mut covered_until);
            }

            debug!(
                window = index,
                offset = window.offset_seconds,
                samples = samples.len(),
                segments = segments.len(),
                "window transcribed"
            );

            for segment in segments {
                sink.emit(WorkerEvent::Partial {
                    segment: segment.clone(),
                });
                collected.push(segment);
            }
        }

        self.diagnostics.segments_emitted += collected.len();
        let result = TranscriptionResult::from_segments(collected);
        self.state = WorkerState::Ready;
        info!(
            segments = result.segments.len(),
            chars = result.text.len(),
            "transcription complete"
        );
        sink.emit(WorkerEvent::TranscribeComplete { result });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::{MurmurError, Result};
    use crate::inference::config::catalog_model;
    use crate::inference::{ProgressSink, RawTranscript, SpeechBackend, SpeechModel};
    use crate::ipc::events::{LoadProgress, LoadStatus};

    /// Returns one segment per window ("w0", "w1", ...), failing on `fail_on`.
    struct ScriptedModel {
        calls: Arc<AtomicUsize>,
        fail_on: Option<usize>,
        text_only: bool,
        languages: Arc<parking_lot::Mutex<Vec<Option<String>>>>,
    }

    impl SpeechModel for ScriptedModel {
        fn infer(&mut self, samples: &[f32], options: &InferenceOptions) -> Result<RawTranscript> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.languages.lock().push(options.language.clone());
            if self.fail_on == Some(call) {
                return Err(MurmurError::Inference("decoder exploded".into()));
            }
            let text = format!("w{call}");
            if self.text_only {
                return Ok(RawTranscript {
                    text,
                    segments: vec![],
                });
            }
            let seconds = samples.len() as f64 / SAMPLE_RATE as f64;
            Ok(RawTranscript {
                text: text.clone(),
                segments: vec![RawSegment::new(text, 0.0, seconds.min(2.0))],
            })
        }
    }

    struct ScriptedBackend {
        loads: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        languages: Arc<parking_lot::Mutex<Vec<Option<String>>>>,
        fail_load: bool,
        fail_on: Option<usize>,
        text_only: bool,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                calls: Arc::new(AtomicUsize::new(0)),
                languages: Arc::new(parking_lot::Mutex::new(Vec::new())),
                fail_load: false,
                fail_on: None,
                text_only: false,
            }
        }
    }

    impl SpeechBackend for ScriptedBackend {
        fn load(
            &mut self,
            _config: &ModelConfig,
            progress: &mut ProgressSink<'_>,
        ) -> Result<Box<dyn SpeechModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            progress(LoadProgress::new(LoadStatus::Initiate, 0.0, "model.onnx"));
            progress(LoadProgress::new(LoadStatus::Done, 1.0, "model.onnx"));
            if self.fail_load {
                return Err(MurmurError::Load("network unreachable".into()));
            }
            Ok(Box::new(ScriptedModel {
                calls: Arc::clone(&self.calls),
                fail_on: self.fail_on,
                text_only: self.text_only,
                languages: Arc::clone(&self.languages),
            }))
        }
    }

    fn worker_with(backend: ScriptedBackend, config: EngineConfig) -> TranscriptionWorker {
        TranscriptionWorker::new(config, InferenceSession::new(backend))
    }

    fn ready_worker(backend: ScriptedBackend) -> TranscriptionWorker {
        let mut worker = worker_with(backend, EngineConfig::default());
        let mut events = Vec::new();
        worker.handle(WorkerCommand::Load, &mut events);
        assert_eq!(worker.state(), WorkerState::Ready);
        worker
    }

    fn transcribe_cmd(seconds: f64) -> WorkerCommand {
        WorkerCommand::Transcribe {
            audio: AudioBuffer::silence(seconds),
            options: TranscribeOptions::default(),
        }
    }

    fn partial_texts(events: &[WorkerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Partial { segment } => Some(segment.text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn load_emits_progress_then_ready() {
        let mut worker = worker_with(ScriptedBackend::new(), EngineConfig::default());
        assert_eq!(worker.state(), WorkerState::Uninitialized);

        let mut events = Vec::new();
        worker.handle(WorkerCommand::Load, &mut events);

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], WorkerEvent::Loading { .. }));
        assert!(matches!(events[1], WorkerEvent::Loading { .. }));
        assert_eq!(events[2], WorkerEvent::Ready);
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn load_failure_moves_to_error_with_model_name() {
        let mut backend = ScriptedBackend::new();
        backend.fail_load = true;
        let mut worker = worker_with(backend, EngineConfig::default());

        let mut events = Vec::new();
        worker.handle(WorkerCommand::Load, &mut events);

        assert_eq!(worker.state(), WorkerState::Error);
        match events.last() {
            Some(WorkerEvent::Error { kind, message }) => {
                assert_eq!(*kind, ErrorKind::Load);
                assert!(message.contains("Whisper Tiny (English)"), "{message}");
                assert!(message.contains("network unreachable"), "{message}");
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn load_without_any_model_fails() {
        let config = EngineConfig {
            default_model: None,
            ..EngineConfig::default()
        };
        let mut worker = worker_with(ScriptedBackend::new(), config);
        let mut events = Vec::new();
        worker.handle(WorkerCommand::Load, &mut events);
        assert_eq!(worker.state(), WorkerState::Error);
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::Error {
                kind: ErrorKind::Load,
                ..
            })
        ));
    }

    #[test]
    fn configure_emits_configured_without_state_change() {
        let mut worker = ready_worker(ScriptedBackend::new());
        let base = catalog_model("whisper-base").unwrap();

        let mut events = Vec::new();
        worker.handle(WorkerCommand::Configure(base.clone()), &mut events);

        assert_eq!(events, vec![WorkerEvent::Configured { model: base.clone() }]);
        assert_eq!(worker.state(), WorkerState::Ready);
        assert_eq!(worker.model(), Some(&base));
    }

    #[test]
    fn transcribe_before_load_is_rejected_without_start() {
        let mut worker = worker_with(ScriptedBackend::new(), EngineConfig::default());
        let mut events = Vec::new();
        worker.handle(transcribe_cmd(5.0), &mut events);

        assert_eq!(
            events,
            vec![WorkerEvent::Error {
                kind: ErrorKind::NotReady,
                message: "Worker not ready".into(),
            }]
        );
        assert_eq!(worker.state(), WorkerState::Uninitialized);
    }

    #[test]
    fn transcribe_after_configure_requires_reload() {
        let mut worker = ready_worker(ScriptedBackend::new());
        let mut events = Vec::new();
        worker.handle(
            WorkerCommand::Configure(catalog_model("whisper-base").unwrap()),
            &mut events,
        );
        events.clear();
        worker.handle(transcribe_cmd(5.0), &mut events);
        assert!(matches!(
            events.as_slice(),
            [WorkerEvent::Error {
                kind: ErrorKind::NotReady,
                ..
            }]
        ));
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn events_arrive_start_partials_complete() {
        let mut worker = ready_worker(ScriptedBackend::new());
        let mut events = Vec::new();
        worker.handle(transcribe_cmd(70.0), &mut events);

        assert_eq!(events[0], WorkerEvent::TranscribeStart { window_count: 3 });
        assert_eq!(partial_texts(&events), vec!["w0", "w1", "w2"]);
        match events.last() {
            Some(WorkerEvent::TranscribeComplete { result }) => {
                assert_eq!(result.text, "w0 w1 w2");
                let starts: Vec<f64> = result.segments.iter().map(|s| s.start()).collect();
                assert_eq!(starts, vec![0.0, 25.0, 50.0]);
            }
            other => panic!("expected complete, got {other:?}"),
        }
        assert_eq!(events.len(), 5);
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn complete_text_matches_joined_partials() {
        let mut worker = ready_worker(ScriptedBackend::new());
        for seconds in [0.5, 29.0, 31.0, 140.0] {
            let mut events = Vec::new();
            worker.handle(transcribe_cmd(seconds), &mut events);
            let joined = partial_texts(&events).join(" ");
            match events.last() {
                Some(WorkerEvent::TranscribeComplete { result }) => {
                    assert_eq!(result.text, joined, "seconds={seconds}");
                }
                other => panic!("expected complete, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_buffer_completes_with_empty_result() {
        let mut worker = ready_worker(ScriptedBackend::new());
        let mut events = Vec::new();
        worker.handle(transcribe_cmd(0.0), &mut events);
        assert_eq!(
            events,
            vec![
                WorkerEvent::TranscribeStart { window_count: 0 },
                WorkerEvent::TranscribeComplete {
                    result: TranscriptionResult::default()
                },
            ]
        );
    }

    #[test]
    fn inference_failure_on_second_window_aborts_after_one_partial() {
        let mut backend = ScriptedBackend::new();
        backend.fail_on = Some(1);
        let calls = Arc::clone(&backend.calls);
        let mut worker = ready_worker(backend);

        let mut events = Vec::new();
        worker.handle(transcribe_cmd(70.0), &mut events);

        assert_eq!(partial_texts(&events), vec!["w0"]);
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::Error {
                kind: ErrorKind::Inference,
                ..
            })
        ));
        assert!(!events
            .iter()
            .any(|e| matches!(e, WorkerEvent::TranscribeComplete { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2, "third window must not run");
        assert_eq!(worker.state(), WorkerState::Error);
    }

    #[test]
    fn reload_after_inference_error_reuses_cached_model() {
        let mut backend = ScriptedBackend::new();
        backend.fail_on = Some(0);
        let loads = Arc::clone(&backend.loads);
        let mut worker = ready_worker(backend);

        let mut events = Vec::new();
        worker.handle(transcribe_cmd(3.0), &mut events);
        assert_eq!(worker.state(), WorkerState::Error);

        events.clear();
        worker.handle(WorkerCommand::Load, &mut events);
        assert_eq!(events, vec![WorkerEvent::Ready]);
        assert_eq!(worker.state(), WorkerState::Ready);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        events.clear();
        worker.handle(transcribe_cmd(3.0), &mut events);
        assert!(matches!(
            events.last(),
            Some(WorkerEvent::TranscribeComplete { .. })
        ));
    }

    #[test]
    fn invalid_geometry_is_rejected_without_state_change() {
        let mut worker = ready_worker(ScriptedBackend::new());
        let mut events = Vec::new();
        worker.handle(
            WorkerCommand::Transcribe {
                audio: AudioBuffer::silence(10.0),
                options: TranscribeOptions {
                    chunk_seconds: Some(5.0),
                    stride_seconds: Some(5.0),
                    ..TranscribeOptions::default()
                },
            },
            &mut events,
        );
        assert!(matches!(
            events.as_slice(),
            [WorkerEvent::Error {
                kind: ErrorKind::InvalidRequest,
                ..
            }]
        ));
        assert_eq!(worker.state(), WorkerState::Ready);
    }

    #[test]
    fn option_overrides_change_window_plan() {
        let mut worker = ready_worker(ScriptedBackend::new());
        let mut events = Vec::new();
        worker.handle(
            WorkerCommand::Transcribe {
                audio: AudioBuffer::silence(20.0),
                options: TranscribeOptions {
                    chunk_seconds: Some(10.0),
                    stride_seconds: Some(0.0),
                    ..TranscribeOptions::default()
                },
            },
            &mut events,
        );
        assert_eq!(events[0], WorkerEvent::TranscribeStart { window_count: 2 });
    }

    #[test]
    fn language_falls_back_to_model_config() {
        let backend = ScriptedBackend::new();
        let languages = Arc::clone(&backend.languages);
        let mut worker = worker_with(backend, EngineConfig::default());
        let mut model = catalog_model("whisper-base").unwrap();
        model.language = Some("fr".into());

        let mut events = Vec::new();
        worker.handle(WorkerCommand::Configure(model), &mut events);
        worker.handle(WorkerCommand::Load, &mut events);
        worker.handle(transcribe_cmd(1.0), &mut events);
        worker.handle(
            WorkerCommand::Transcribe {
                audio: AudioBuffer::silence(1.0),
                options: TranscribeOptions {
                    language: Some("de".into()),
                    ..TranscribeOptions::default()
                },
            },
            &mut events,
        );

        assert_eq!(
            *languages.lock(),
            vec![Some("fr".to_string()), Some("de".to_string())]
        );
    }

    #[test]
    fn text_without_segments_spans_the_window() {
        let mut backend = ScriptedBackend::new();
        backend.text_only = true;
        let mut worker = ready_worker(backend);

        let mut events = Vec::new();
        worker.handle(transcribe_cmd(40.0), &mut events);
        match events.last() {
            Some(WorkerEvent::TranscribeComplete { result }) => {
                assert_eq!(result.segments[0].timestamp, [0.0, 30.0]);
                assert_eq!(result.segments[1].timestamp, [25.0, 40.0]);
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn drop_overlapping_policy_skips_repeated_region() {
        // Each window yields one segment [offset, offset + 2s]; with 0.5 s
        // windows and 0.4 s stride every later segment starts inside the previous one.
        let config = EngineConfig {
            chunk_seconds: 0.5,
            stride_seconds: 0.4,
            overlap_policy: OverlapPolicy::DropOverlapping,
            ..EngineConfig::default()
        };
        let mut worker = worker_with(ScriptedBackend::new(), config);
        let mut events = Vec::new();
        worker.handle(WorkerCommand::Load, &mut events);
        events.clear();
        worker.handle(transcribe_cmd(1.0), &mut events);

        let texts = partial_texts(&events);
        assert!(texts.len() < 10, "expected overlap drops, got {texts:?}");
        assert_eq!(texts[0], "w0");
    }

    #[test]
    fn closed_sink_abandons_remaining_windows() {
        struct ClosedAfterStart {
            events: Vec<WorkerEvent>,
        }
        impl EventSink for ClosedAfterStart {
            fn emit(&mut self, event: WorkerEvent) {
                self.events.push(event);
            }
            fn is_closed(&self) -> bool {
                self.events
                    .iter()
                    .any(|e| matches!(e, WorkerEvent::Partial { .. }))
            }
        }

        let backend = ScriptedBackend::new();
        let calls = Arc::clone(&backend.calls);
        let mut worker = ready_worker(backend);
        let mut sink = ClosedAfterStart { events: Vec::new() };
        worker.handle(transcribe_cmd(70.0), &mut sink);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(worker.state(), WorkerState::Ready);
    }
}
