//! `InferenceSession` — owns at most one loaded model.
//!
//! The loaded instance is cached under the config's `ModelKey`. Reconfiguring
//! to another identity drops it; the next `ensure_loaded` loads again.

use tracing::{debug, info};

use crate::error::{MurmurError, Result};
use crate::inference::{
    InferenceOptions, ModelConfig, ModelKey, ProgressSink, RawTranscript, SpeechBackend,
    SpeechModel,
};

struct LoadedModel {
    key: ModelKey,
    model: Box<dyn SpeechModel>,
}

pub struct InferenceSession {
    backend: Box<dyn SpeechBackend>,
    config: Option<ModelConfig>,
    loaded: Option<LoadedModel>,
}

impl InferenceSession {
    pub fn new<B: SpeechBackend>(backend: B) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn SpeechBackend>) -> Self {
        Self {
            backend,
            config: None,
            loaded: None,
        }
    }

    /// Select the model to load next. Invalidates the cache on identity change.
    pub fn configure(&mut self, config: ModelConfig) {
        let key = config.key();
        if self.loaded.as_ref().is_some_and(|l| l.key != key) {
            debug!(path = %config.path, "model identity changed, dropping cached instance");
            self.reset();
        }
        self.config = Some(config);
    }

    pub fn config(&self) -> Option<&ModelConfig> {
        self.config.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Load the configured model unless the cached instance already matches.
    ///
    /// # Errors
    /// - `MurmurError::Load` if no model is configured.
    /// - Whatever the backend reports while loading.
    pub fn ensure_loaded(&mut self, progress: &mut ProgressSink<'_>) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| MurmurError::Load("no model configured".into()))?;
        let key = config.key();

        if self.loaded.as_ref().is_some_and(|l| l.key == key) {
            debug!(path = %key.path, "model already loaded, reusing cached instance");
            return Ok(());
        }

        // A failed load must not leave the previous model half-cached.
        self.loaded = None;
        info!(path = %key.path, dtype = %key.dtype, quantized = key.quantized, "loading model");
        let model = self.backend.load(config, progress)?;
        self.loaded = Some(LoadedModel { key, model });
        info!("model loaded");
        Ok(())
    }

    /// Run one window through the loaded model.
    ///
    /// # Errors
    /// `MurmurError::NotReady` before a successful `ensure_loaded`.
    pub fn infer(&mut self, samples: &[f32], options: &InferenceOptions) -> Result<RawTranscript> {
        let loaded = self.loaded.as_mut().ok_or(MurmurError::NotReady)?;
        loaded.model.infer(samples, options)
    }

    /// Drop the loaded instance. The configured model is kept.
    pub fn reset(&mut self) {
        if self.loaded.take().is_some() {
            debug!("inference session reset");
        }
    }
}

impl std::fmt::Debug for InferenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSession")
            .field("config", &self.config)
            .field("loaded", &self.loaded.as_ref().map(|l| &l.key))
            .finish_non_exhaustive()
    }
}
