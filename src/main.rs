//! Medscan - handwritten notes OCR workstation
//!
//! Loads a photo of a handwritten note, runs an OCR model over it, shows
//! the extracted text, and exports the result as a one-row CSV.

mod config;
mod error;
mod session;
mod storage;
mod ui;
mod vision;

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::vision::{RecognitionPipeline, SUPPORTED_LANGUAGES};

/// Medscan - handwritten notes OCR
#[derive(Parser, Debug)]
#[command(name = "medscan")]
#[command(about = "Extract text from photos of handwritten notes and export it as CSV")]
struct Args {
    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recognition language tag (repeatable; overrides the config)
    #[arg(short, long)]
    language: Vec<String>,

    /// Directory holding the ONNX model files
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// List supported recognition languages and exit
    #[arg(long)]
    list_languages: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if args.list_languages {
        println!("Supported recognition languages:");
        for (tag, name) in SUPPORTED_LANGUAGES {
            println!("  {tag} ({name})");
        }
        return Ok(());
    }

    info!("Medscan starting...");

    let mut config = load_or_create_config(args.config.as_deref());
    if !args.language.is_empty() {
        config.recognition.languages = args.language.clone();
    }

    let models_dir = match args.models_dir {
        Some(dir) => dir,
        None => storage::get_models_dir()?,
    };
    info!("Model cache: {:?}", models_dir);

    let pipeline = RecognitionPipeline::new(config.recognition.clone(), models_dir);
    if !pipeline.models_cached() {
        info!("Model files not cached yet; they download on first recognition");
    }

    if let Err(e) = ui::run_app(config, pipeline) {
        tracing::error!("Window error: {e}");
    }

    info!("Medscan shutdown complete");
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config(path: Option<&Path>) -> AppConfig {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => storage::get_config_dir().ok().map(|d| d.join("config.toml")),
    };

    if let Some(config_path) = config_path {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => {
                    warn!("Ignoring malformed config {:?}: {e}", config_path);
                }
            }
        }
    }

    info!("Using default configuration");
    AppConfig::default()
}
