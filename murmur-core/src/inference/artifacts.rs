//! Model artifacts on local disk.
//!
//! Models live under `<models_dir>/<model path>/`, e.g.
//! `models/Xenova/whisper-tiny.en/onnx/encoder_model_fp16.onnx`. Remote
//! acquisition is the host's business; the core only checks and measures
//! what is already there, reporting progress as each artifact is checked.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MurmurError, Result};
use crate::inference::config::{Dtype, ModelConfig};
use crate::inference::ProgressSink;
use crate::ipc::events::{LoadProgress, LoadStatus};

/// Artifact file names (relative to the model directory) needed to load `config`.
pub fn required_artifacts(config: &ModelConfig) -> Vec<String> {
    let suffix = weight_suffix(config);
    vec![
        "config.json".into(),
        "generation_config.json".into(),
        "tokenizer.json".into(),
        "preprocessor_config.json".into(),
        format!("onnx/encoder_model{suffix}.onnx"),
        format!("onnx/decoder_model_merged{suffix}.onnx"),
    ]
}

fn weight_suffix(config: &ModelConfig) -> &'static str {
    match config.dtype {
        Dtype::Fp32 if config.quantized => "_quantized",
        Dtype::Fp32 => "",
        Dtype::Fp16 => "_fp16",
        Dtype::Q8 => "_int8",
        Dtype::Q4 => "_q4",
    }
}

/// Directory holding the artifacts of `config`.
pub fn model_dir(models_dir: &Path, config: &ModelConfig) -> PathBuf {
    config
        .path
        .split('/')
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .fold(models_dir.to_path_buf(), |dir, part| dir.join(part))
}

/// Verify every artifact of `config` exists, reporting progress per file as
/// it is checked.
///
/// `fraction` is the share of artifacts checked so far.
///
/// # Errors
/// `MurmurError::ModelNotFound` naming the first missing artifact.
pub fn resolve_local(
    models_dir: &Path,
    config: &ModelConfig,
    progress: &mut ProgressSink<'_>,
) -> Result<Vec<PathBuf>> {
    let dir = model_dir(models_dir, config);
    let names = required_artifacts(config);
    let count = names.len().max(1) as f32;

    let mut paths = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        progress(LoadProgress::new(LoadStatus::Initiate, i as f32 / count, name.as_str()));

        let path = dir.join(name);
        let len = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                warn!(artifact = %path.display(), "model artifact missing");
                return Err(MurmurError::ModelNotFound { path });
            }
        };

        let fraction = (i + 1) as f32 / count;
        progress(LoadProgress::new(LoadStatus::Progress, fraction, name.as_str()));
        progress(LoadProgress::new(LoadStatus::Done, fraction, name.as_str()));
        debug!(artifact = %path.display(), bytes = len, "artifact resolved");
        paths.push(path);
    }
    Ok(paths)
}
