//! Storage Layer
//!
//! Platform directories for configuration, cached model files, and the
//! default CSV export location. Nothing session-related is ever persisted.

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "medscan", "Medscan")
        .ok_or_else(|| anyhow::anyhow!("could not determine platform directories"))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;
    Ok(config_dir)
}

/// Get the directory cached model files live under
pub fn get_models_dir() -> Result<PathBuf> {
    let models_dir = project_dirs()?.data_dir().join("models");
    std::fs::create_dir_all(&models_dir)?;
    Ok(models_dir)
}

/// Where CSV exports land when the config does not name a directory:
/// the user's download directory, falling back to their home.
pub fn default_export_dir() -> Result<PathBuf> {
    let user_dirs = directories::UserDirs::new()
        .ok_or_else(|| anyhow::anyhow!("could not determine user directories"))?;
    let dir = user_dirs
        .download_dir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| user_dirs.home_dir().to_path_buf());
    Ok(dir)
}
