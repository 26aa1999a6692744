//! Model management for ONNX Runtime
//!
//! Downloads, caches, and loads the detection and recognition models plus
//! the character dictionary used for decoding. Models live under the
//! platform data directory and are fetched once.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ort::session::{builder::GraphOptimizationLevel, Session};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Language tags the bundled model set covers, with the directory name used
/// by the model repository.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[("en", "english")];

/// Resolve a language tag to its model-repository directory.
pub fn language_dir(tag: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, dir)| *dir)
}

/// The model files a recognition backend needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Text detection model (finds text regions).
    Detection,
    /// Text recognition model (reads one region).
    Recognition,
    /// Character dictionary for decoding recognition output.
    Dictionary,
}

impl ModelKind {
    /// Cache file name. Detection is language-independent; the rest are
    /// keyed by tag so switching languages never clobbers the cache.
    pub fn file_name(&self, language: &str) -> String {
        match self {
            ModelKind::Detection => "det.onnx".to_string(),
            ModelKind::Recognition => format!("rec.{language}.onnx"),
            ModelKind::Dictionary => format!("dict.{language}.txt"),
        }
    }

    /// Download URL in the published ONNX model repository.
    pub fn download_url(&self, language: &str) -> Option<String> {
        const BASE: &str = "https://huggingface.co/monkt/paddleocr-onnx/resolve/main";
        match self {
            ModelKind::Detection => Some(format!("{BASE}/detection/v3/det.onnx")),
            ModelKind::Recognition => {
                language_dir(language).map(|dir| format!("{BASE}/languages/{dir}/rec.onnx"))
            }
            ModelKind::Dictionary => {
                language_dir(language).map(|dir| format!("{BASE}/languages/{dir}/dict.txt"))
            }
        }
    }

    /// Plausible on-disk size range, used as a cheap integrity check.
    pub fn expected_size_range(&self) -> (u64, u64) {
        match self {
            ModelKind::Detection => (2_000_000, 5_000_000),
            ModelKind::Recognition => (5_000_000, 15_000_000),
            ModelKind::Dictionary => (100, 50_000),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Detection => "text detection model",
            ModelKind::Recognition => "text recognition model",
            ModelKind::Dictionary => "character dictionary",
        }
    }
}

/// Manifest of downloaded model files, kept beside them as JSON.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestEntry {
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// On-disk cache of model files.
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    pub fn new(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("creating models directory {models_dir:?}"))?;
        Ok(Self { models_dir })
    }

    pub fn model_path(&self, kind: ModelKind, language: &str) -> PathBuf {
        self.models_dir.join(kind.file_name(language))
    }

    /// A file is cached when it exists and its size is in the expected
    /// range for its kind.
    pub fn is_cached(&self, kind: ModelKind, language: &str) -> bool {
        let path = self.model_path(kind, language);
        let Ok(metadata) = std::fs::metadata(&path) else {
            return false;
        };
        let (min, max) = kind.expected_size_range();
        (min..=max).contains(&metadata.len())
    }

    /// Whether everything the backend needs for a language is present.
    pub fn all_cached(&self, language: &str) -> bool {
        self.is_cached(ModelKind::Detection, language)
            && self.is_cached(ModelKind::Recognition, language)
            && self.is_cached(ModelKind::Dictionary, language)
    }

    /// Return the path to a model file, downloading it first if missing.
    pub fn ensure(&self, kind: ModelKind, language: &str) -> Result<PathBuf> {
        let path = self.model_path(kind, language);
        if self.is_cached(kind, language) {
            debug!("{} already cached at {:?}", kind.display_name(), path);
            return Ok(path);
        }

        let url = kind.download_url(language).with_context(|| {
            format!(
                "no {} published for language '{language}'",
                kind.display_name()
            )
        })?;

        if std::env::var("MEDSCAN_OFFLINE").is_ok() {
            anyhow::bail!(
                "offline mode: download {} manually from {url} and place it at {path:?}",
                kind.display_name()
            );
        }

        info!("downloading {} from {url}", kind.display_name());
        let rt = Runtime::new().context("creating tokio runtime for download")?;
        let sha256 = rt.block_on(download_to(&url, &path))?;

        if !self.is_cached(kind, language) {
            anyhow::bail!(
                "downloaded {} failed the size check, refusing to use it",
                kind.display_name()
            );
        }
        self.record(kind, language, sha256)?;
        info!("{} ready at {:?}", kind.display_name(), path);
        Ok(path)
    }

    fn manifest_path(&self) -> PathBuf {
        self.models_dir.join("manifest.json")
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(ModelManifest::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(self.manifest_path(), content)?;
        Ok(())
    }

    fn record(&self, kind: ModelKind, language: &str, sha256: String) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        let file_name = kind.file_name(language);
        let size_bytes = std::fs::metadata(self.model_path(kind, language))?.len();
        let entry = ManifestEntry {
            file_name: file_name.clone(),
            size_bytes,
            sha256,
        };
        if let Some(existing) = manifest
            .entries
            .iter_mut()
            .find(|e| e.file_name == file_name)
        {
            *existing = entry;
        } else {
            manifest.entries.push(entry);
        }
        self.save_manifest(&manifest)
    }
}

/// Stream a URL to `path` via a temp file, returning the SHA-256 of the
/// downloaded bytes.
async fn download_to(url: &str, path: &Path) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .context("creating HTTP client")?;

    let response = client.get(url).send().await.context("sending request")?;
    if !response.status().is_success() {
        anyhow::bail!("download failed with status {}: {url}", response.status());
    }

    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).context("creating temp file")?;
    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading download stream")?;
        file.write_all(&chunk).context("writing temp file")?;
        hasher.update(&chunk);
    }
    file.flush()?;
    drop(file);

    std::fs::rename(&temp_path, path).context("moving download into place")?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Load the character dictionary: one entry per line, order significant.
pub fn load_dictionary(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading character dictionary {path:?}"))?;
    Ok(content.lines().map(|line| line.to_string()).collect())
}

/// ONNX Runtime session wrapper.
pub struct OnnxSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    pub fn new(model_path: &Path) -> Result<Self> {
        info!("loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .context("loading ONNX model")?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        debug!("model inputs {:?}, outputs {:?}", input_names, output_names);

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
