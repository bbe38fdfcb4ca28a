//! Model selection: identity, precision and the built-in catalog.

use serde::{Deserialize, Serialize};

/// Numeric precision the engine should load weights in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    #[default]
    Fp16,
    Fp32,
    Q8,
    Q4,
}

impl Dtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Dtype::Fp16 => "fp16",
            Dtype::Fp32 => "fp32",
            Dtype::Q8 => "q8",
            Dtype::Q4 => "q4",
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fp16" | "f16" => Ok(Dtype::Fp16),
            "fp32" | "f32" => Ok(Dtype::Fp32),
            "q8" | "int8" => Ok(Dtype::Q8),
            "q4" | "int4" => Ok(Dtype::Q4),
            other => Err(format!("unknown dtype '{other}' (expected fp16, fp32, q8 or q4)")),
        }
    }
}

/// A selected speech model. Immutable once handed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Display name.
    pub name: String,
    /// Model identity, e.g. `"Xenova/whisper-tiny.en"`.
    pub path: String,
    /// Default spoken language hint (`None` lets the model detect it).
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub quantized: bool,
    #[serde(default)]
    pub dtype: Dtype,
}

impl ModelConfig {
    /// Key the inference session caches a loaded model under.
    pub fn key(&self) -> ModelKey {
        ModelKey {
            path: self.path.clone(),
            dtype: self.dtype,
            quantized: self.quantized,
        }
    }
}

/// Identity of a loaded model instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub path: String,
    pub dtype: Dtype,
    pub quantized: bool,
}

/// Catalog key used when nothing else is selected.
pub const DEFAULT_MODEL_KEY: &str = "whisper-tiny.en";

/// Built-in model catalog as `(key, config)` pairs.
pub fn model_catalog() -> Vec<(&'static str, ModelConfig)> {
    vec![
        (
            "whisper-tiny.en",
            ModelConfig {
                name: "Whisper Tiny (English)".into(),
                path: "Xenova/whisper-tiny.en".into(),
                language: None,
                quantized: true,
                dtype: Dtype::Fp16,
            },
        ),
        (
            "whisper-base.en",
            ModelConfig {
                name: "Whisper Base (English)".into(),
                path: "Xenova/whisper-base.en".into(),
                language: None,
                quantized: true,
                dtype: Dtype::Fp16,
            },
        ),
        (
            "whisper-base",
            ModelConfig {
                name: "Whisper Base (Multilingual)".into(),
                path: "Xenova/whisper-base".into(),
                language: None,
                quantized: true,
                dtype: Dtype::Fp16,
            },
        ),
    ]
}

/// Look up a catalog entry by key (case-insensitive).
pub fn catalog_model(key: &str) -> Option<ModelConfig> {
    let key = key.trim();
    model_catalog()
        .into_iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, config)| config)
}

/// Size class derived from the catalog key (`tiny`, `base`, ... or `unknown`).
pub fn model_size(key: &str) -> &'static str {
    ["tiny", "base", "small", "medium", "large"]
        .into_iter()
        .find(|size| key.contains(size))
        .unwrap_or("unknown")
}
