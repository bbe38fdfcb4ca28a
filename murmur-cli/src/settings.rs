//! Persistent CLI settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use murmur_core::inference::config::{catalog_model, DEFAULT_MODEL_KEY};
use murmur_core::inference::Dtype;
use murmur_core::{EngineConfig, ModelConfig, OverlapPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Catalog key of the model to load.
    pub model: String,
    /// Local model store. Unset: the stub engine synthesises artifacts.
    pub models_dir: Option<PathBuf>,
    /// Spoken language hint; `None` lets the model detect it.
    pub language: Option<String>,
    /// Weight precision; `None` keeps the catalog default.
    pub dtype: Option<Dtype>,
    pub chunk_seconds: f64,
    pub stride_seconds: f64,
    pub overlap_policy: OverlapPolicy,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            model: DEFAULT_MODEL_KEY.into(),
            models_dir: None,
            language: None,
            dtype: None,
            chunk_seconds: engine.chunk_seconds,
            stride_seconds: engine.stride_seconds,
            overlap_policy: engine.overlap_policy,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.model = normalize_model_key(&self.model);
        self.language = self.language.as_deref().and_then(normalize_language);
        self.models_dir = self
            .models_dir
            .take()
            .filter(|dir| !dir.as_os_str().is_empty());
        if !self.chunk_seconds.is_finite() {
            self.chunk_seconds = EngineConfig::default().chunk_seconds;
        }
        self.chunk_seconds = self.chunk_seconds.clamp(1.0, 30.0);
        if !self.stride_seconds.is_finite() {
            self.stride_seconds = EngineConfig::default().stride_seconds;
        }
        self.stride_seconds = self.stride_seconds.clamp(0.0, self.chunk_seconds / 2.0);
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("MURMUR_MODEL") {
            self.model = model;
        }
        if let Some(dir) = std::env::var_os("MURMUR_MODELS_DIR") {
            self.models_dir = Some(PathBuf::from(dir));
        }
        self.normalize();
    }

    /// The catalog entry for `model`, with the language hint and dtype applied.
    pub fn model_config(&self) -> Option<ModelConfig> {
        catalog_model(&self.model).map(|mut config| {
            if self.language.is_some() {
                config.language = self.language.clone();
            }
            if let Some(dtype) = self.dtype {
                config.dtype = dtype;
            }
            config
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chunk_seconds: self.chunk_seconds,
            stride_seconds: self.stride_seconds,
            overlap_policy: self.overlap_policy,
            default_model: self.model_config(),
            ..EngineConfig::default()
        }
    }
}

/// Map shorthand and unknown keys onto catalog keys.
pub fn normalize_model_key(raw: &str) -> String {
    let key = raw.trim().to_ascii_lowercase();
    let key = match key.as_str() {
        "tiny" | "tiny.en" | "tiny-en" => "whisper-tiny.en".to_string(),
        "base.en" | "base-en" => "whisper-base.en".to_string(),
        "base" => "whisper-base".to_string(),
        _ => key,
    };
    if catalog_model(&key).is_some() {
        key
    } else {
        DEFAULT_MODEL_KEY.into()
    }
}

pub fn normalize_language(raw: &str) -> Option<String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "auto" => None,
        "english" => Some("en".into()),
        other => Some(other.into()),
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Murmur")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("murmur")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
