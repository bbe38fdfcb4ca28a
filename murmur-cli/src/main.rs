//! murmur — command-line host for murmur-core.
//!
//! Reads a 16 kHz WAV file, drives a `WorkerBridge` (configure → load →
//! transcribe), prints segments as they arrive and exports the final result.

mod audio;
mod cli;
mod export;
mod settings;

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use murmur_core::inference::config::{model_catalog, model_size};
use murmur_core::{
    OverlapPolicy, StubBackend, Task, TranscribeOptions, TranscriptionResult, WorkerBridge,
    WorkerEvent,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use cli::{Cli, Commands, SettingsAction, TranscribeArgs};
use export::{format_timestamp, write_export, ExportFormat};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Tracing ───────────────────────────────────────────────────────────
    let default_filter = match cli.verbose {
        0 => "murmur=info",
        1 => "murmur=debug",
        _ => "murmur=trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);

    match cli.command {
        Commands::Transcribe(args) => {
            settings.apply_env_overrides();
            run_transcribe(args, settings).await
        }
        Commands::Models => {
            settings.apply_env_overrides();
            print_models(&settings);
            Ok(())
        }
        Commands::Settings { action } => run_settings(action, settings, &settings_path),
    }
}

// ---------------------------------------------------------------------------
// transcribe
// ---------------------------------------------------------------------------

/// Fold command-line flags over the persisted settings.
fn apply_transcribe_args(settings: &mut AppSettings, args: &TranscribeArgs) {
    if let Some(model) = &args.model {
        settings.model = model.clone();
    }
    if let Some(dir) = &args.models_dir {
        settings.models_dir = Some(dir.clone());
    }
    if let Some(language) = &args.language {
        settings.language = Some(language.clone());
    }
    if args.dtype.is_some() {
        settings.dtype = args.dtype;
    }
    if let Some(chunk) = args.chunk {
        settings.chunk_seconds = chunk;
    }
    if let Some(stride) = args.stride {
        settings.stride_seconds = stride;
    }
    if args.dedupe {
        settings.overlap_policy = OverlapPolicy::DropOverlapping;
    }
    settings.normalize();
}

fn resolve_format(args: &TranscribeArgs) -> Result<ExportFormat> {
    match &args.format {
        Some(raw) => raw.parse().map_err(anyhow::Error::msg),
        None => Ok(args
            .output
            .as_deref()
            .and_then(ExportFormat::from_path)
            .unwrap_or_default()),
    }
}

async fn run_transcribe(args: TranscribeArgs, mut settings: AppSettings) -> Result<()> {
    apply_transcribe_args(&mut settings, &args);
    let format = resolve_format(&args)?;
    let model = settings
        .model_config()
        .with_context(|| format!("unknown model '{}'", settings.model))?;

    let audio = audio::read_wav(&args.input)?;
    info!(
        file = %args.input.display(),
        seconds = format_args!("{:.1}", audio.duration_secs()),
        model = %model.name,
        "input loaded"
    );

    let backend = match &settings.models_dir {
        Some(dir) => StubBackend::with_models_dir(dir),
        None => StubBackend::new(),
    };
    let mut bridge = WorkerBridge::spawn(settings.engine_config(), backend);
    let printer = tokio::spawn(print_events(bridge.subscribe_events(), args.quiet));

    let started = Instant::now();
    let outcome = transcribe_with(&bridge, model, audio, &settings, args.translate).await;
    match &outcome {
        Ok(_) => {
            let _ = printer.await;
        }
        Err(_) => printer.abort(),
    }
    bridge.teardown();
    let result = outcome?;
    info!(
        segments = result.segments.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "transcription finished"
    );

    match &args.output {
        Some(path) => {
            write_export(path, &result, format)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "transcript exported");
        }
        None => println!("{}", export::render(&result, format)?),
    }
    Ok(())
}

async fn transcribe_with(
    bridge: &WorkerBridge,
    model: murmur_core::ModelConfig,
    audio: murmur_core::AudioBuffer,
    settings: &AppSettings,
    translate: bool,
) -> Result<TranscriptionResult> {
    let mut state = bridge.subscribe();
    bridge.configure(model)?;
    bridge.load()?;

    let loaded = state
        .wait_for(|s| !s.is_loading)
        .await
        .context("worker stopped while loading")?
        .clone();
    if let Some(error) = loaded.error {
        bail!(error);
    }

    let options = TranscribeOptions {
        language: settings.language.clone(),
        task: if translate {
            Task::Translate
        } else {
            Task::Transcribe
        },
        ..TranscribeOptions::default()
    };
    Ok(bridge.transcribe(audio, options).await?)
}

/// Echo load progress and segments to stderr until the transcription ends.
async fn print_events(
    mut events: tokio::sync::broadcast::Receiver<WorkerEvent>,
    quiet: bool,
) {
    loop {
        match events.recv().await {
            Ok(WorkerEvent::Loading { progress }) if !quiet && !progress.file.is_empty() => {
                eprintln!(
                    "loading {:>3.0}% {}",
                    progress.fraction * 100.0,
                    progress.file
                );
            }
            Ok(WorkerEvent::Partial { segment }) if !quiet => {
                eprintln!(
                    "[{}] {}",
                    format_timestamp(segment.start()),
                    segment.text.trim()
                );
            }
            Ok(WorkerEvent::TranscribeComplete { .. }) | Ok(WorkerEvent::Error { .. }) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => warn!(missed, "event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// models / settings
// ---------------------------------------------------------------------------

fn print_models(settings: &AppSettings) {
    for (key, config) in model_catalog() {
        let marker = if key == settings.model { "*" } else { " " };
        println!(
            "{marker} {key:<18} {:<28} {:>7}  {}",
            config.name,
            model_size(key),
            config.path
        );
    }
}

fn parse_overlap_policy(raw: &str) -> Result<OverlapPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "keep" => Ok(OverlapPolicy::Keep),
        "drop" | "dedupe" | "drop-overlapping" => Ok(OverlapPolicy::DropOverlapping),
        other => bail!("unknown overlap policy '{other}' (expected keep or drop-overlapping)"),
    }
}

fn run_settings(
    action: Option<SettingsAction>,
    mut settings: AppSettings,
    path: &Path,
) -> Result<()> {
    match action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Path => println!("{}", path.display()),
        SettingsAction::Set {
            model,
            models_dir,
            language,
            dtype,
            chunk,
            stride,
            overlap,
        } => {
            if let Some(model) = model {
                settings.model = model;
            }
            if let Some(dir) = models_dir {
                settings.models_dir = Some(dir);
            }
            if let Some(language) = language {
                settings.language = Some(language);
            }
            if dtype.is_some() {
                settings.dtype = dtype;
            }
            if let Some(chunk) = chunk {
                settings.chunk_seconds = chunk;
            }
            if let Some(stride) = stride {
                settings.stride_seconds = stride;
            }
            if let Some(overlap) = overlap {
                settings.overlap_policy = parse_overlap_policy(&overlap)?;
            }
            settings.normalize();
            save_settings(path, &settings)
                .with_context(|| format!("failed to save {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Reset => {
            save_settings(path, &AppSettings::default())
                .with_context(|| format!("failed to save {}", path.display()))?;
            info!(path = %path.display(), "settings reset");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use murmur_core::Dtype;

    #[test]
    fn transcribe_flags_override_settings() {
        let mut settings = AppSettings::default();
        let args = TranscribeArgs {
            input: PathBuf::from("in.wav"),
            model: Some("base".into()),
            language: Some("auto".into()),
            dtype: Some(Dtype::Q4),
            chunk: Some(20.0),
            stride: Some(15.0),
            dedupe: true,
            ..TranscribeArgs::default()
        };
        apply_transcribe_args(&mut settings, &args);
        assert_eq!(settings.model, "whisper-base");
        assert_eq!(settings.language, None);
        assert_eq!(settings.model_config().unwrap().dtype, Dtype::Q4);
        assert_eq!(settings.chunk_seconds, 20.0);
        assert_eq!(settings.stride_seconds, 10.0, "stride clamped to half the chunk");
        assert_eq!(settings.overlap_policy, OverlapPolicy::DropOverlapping);
    }

    #[test]
    fn format_defaults_from_output_extension() {
        let args = TranscribeArgs {
            output: Some(PathBuf::from("out.json")),
            ..TranscribeArgs::default()
        };
        assert_eq!(resolve_format(&args).unwrap(), ExportFormat::Json);

        let args = TranscribeArgs {
            output: Some(PathBuf::from("out.json")),
            format: Some("txt".into()),
            ..TranscribeArgs::default()
        };
        assert_eq!(resolve_format(&args).unwrap(), ExportFormat::Txt);

        let args = TranscribeArgs {
            format: Some("srt".into()),
            ..TranscribeArgs::default()
        };
        assert!(resolve_format(&args).is_err());
    }

    #[test]
    fn overlap_policy_names() {
        assert_eq!(parse_overlap_policy("Keep").unwrap(), OverlapPolicy::Keep);
        assert_eq!(
            parse_overlap_policy("drop-overlapping").unwrap(),
            OverlapPolicy::DropOverlapping
        );
        assert!(parse_overlap_policy("merge").is_err());
    }

    #[test]
    fn settings_set_persists_normalized_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        run_settings(
            Some(SettingsAction::Set {
                model: Some("tiny".into()),
                models_dir: None,
                language: Some("German".into()),
                dtype: Some(Dtype::Fp32),
                chunk: Some(10.0),
                stride: None,
                overlap: Some("dedupe".into()),
            }),
            AppSettings::default(),
            &path,
        )
        .unwrap();

        let saved = load_settings(&path);
        assert_eq!(saved.model, "whisper-tiny.en");
        assert_eq!(saved.language.as_deref(), Some("german"));
        assert_eq!(saved.dtype, Some(Dtype::Fp32));
        assert_eq!(saved.chunk_seconds, 10.0);
        assert_eq!(saved.stride_seconds, 5.0);
        assert_eq!(saved.overlap_policy, OverlapPolicy::DropOverlapping);
    }

    #[tokio::test]
    async fn stub_transcription_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("speech.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: murmur_core::SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
        for _ in 0..murmur_core::SAMPLE_RATE * 40 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let out = dir.path().join("out.txt");
        let args = TranscribeArgs {
            input: wav,
            output: Some(out.clone()),
            quiet: true,
            ..TranscribeArgs::default()
        };
        run_transcribe(args, AppSettings::default()).await.unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        // 40 s → windows at 0 s (30 s) and 25 s (15 s), stub segments every 10 s.
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("00:00: [Whisper Tiny (English)"));
        assert!(lines[3].starts_with("00:25: "));
    }
}
