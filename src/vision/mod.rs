//! Vision layer
//!
//! Owns the two image capabilities the workflow consumes: decoding/resizing
//! the upload and running text recognition over it. The concrete OCR engine
//! sits behind the [`Recognizer`] trait and is initialized lazily, so the
//! app can start before any model files exist on disk.

pub mod decode;
pub mod models;
pub mod onnx;
pub mod preprocess;
pub mod recognizer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::RecognitionSettings;
use crate::error::WorkflowError;
use crate::session::{Recognize, Upload};

pub use decode::{prepare_upload, PreparedImage};
pub use models::{ModelStore, SUPPORTED_LANGUAGES};
pub use onnx::{OnnxRecognizer, OnnxRecognizerConfig};
pub use recognizer::{Fragment, Recognizer};

/// Decode -> downscale -> recognize, exposed to the session as the single
/// external recognition capability.
pub struct RecognitionPipeline {
    settings: RecognitionSettings,
    models_dir: PathBuf,
    backend: Option<Box<dyn Recognizer>>,
}

impl RecognitionPipeline {
    /// Pipeline with the default ONNX backend, initialized on first use.
    pub fn new(settings: RecognitionSettings, models_dir: PathBuf) -> Self {
        Self {
            settings,
            models_dir,
            backend: None,
        }
    }

    /// Pipeline with an injected backend. The model store is never touched.
    pub fn with_backend(settings: RecognitionSettings, backend: Box<dyn Recognizer>) -> Self {
        Self {
            settings,
            models_dir: PathBuf::new(),
            backend: Some(backend),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Whether every model file for the configured language is on disk.
    pub fn models_cached(&self) -> bool {
        let language = self.primary_language();
        ModelStore::new(self.models_dir.clone())
            .map(|store| store.all_cached(&language))
            .unwrap_or(false)
    }

    fn primary_language(&self) -> String {
        self.settings
            .languages
            .first()
            .cloned()
            .unwrap_or_else(|| "en".to_string())
    }

    /// Load the ONNX backend, downloading model files if necessary.
    pub fn init_backend(&mut self) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }
        if self.settings.use_gpu {
            warn!("GPU execution is not wired up in this build, falling back to CPU");
        }

        let language = self.primary_language();
        let store = ModelStore::new(self.models_dir.clone())?;
        let config = OnnxRecognizerConfig {
            detection_threshold: self.settings.detection_threshold,
            ..OnnxRecognizerConfig::default()
        };
        let backend = OnnxRecognizer::load(&store, &language, config)
            .with_context(|| format!("initializing recognition backend for '{language}'"))?;

        info!(language = %language, "recognition backend ready");
        self.backend = Some(Box::new(backend));
        Ok(())
    }
}

impl Recognize for RecognitionPipeline {
    fn recognize(&mut self, upload: &Upload) -> Result<Vec<String>, WorkflowError> {
        // Decode first: an undecodable blob must surface as such even when
        // the backend is unavailable.
        let prepared = decode::prepare_upload(upload.bytes(), self.settings.max_image_size)?;

        if self.backend.is_none() {
            self.init_backend()
                .map_err(|e| WorkflowError::recognition_failed(format!("{e:#}")))?;
        }
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| WorkflowError::recognition_failed("no recognition backend"))?;

        let fragments = backend
            .recognize(&prepared.png, &self.settings.languages)
            .map_err(|e| WorkflowError::recognition_failed(format!("{e:#}")))?;

        let min_confidence = self.settings.recognition_threshold;
        Ok(fragments
            .into_iter()
            .filter(|f| f.confidence >= min_confidence)
            .map(|f| f.text)
            .collect())
    }
}
