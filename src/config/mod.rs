//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralSettings,
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// Export settings
    pub export: ExportSettings,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Run recognition automatically once an image is loaded
    pub auto_recognize: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            auto_recognize: true,
        }
    }
}

/// Recognition-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Language tags handed to the recognition backend
    pub languages: Vec<String>,
    /// Whether to request GPU acceleration
    pub use_gpu: bool,
    /// Maximum image dimension for processing (larger uploads are scaled down)
    pub max_image_size: u32,
    /// Minimum probability for the text detection map (0.0 - 1.0)
    pub detection_threshold: f32,
    /// Minimum confidence for keeping a recognized fragment (0.0 - 1.0)
    pub recognition_threshold: f32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            use_gpu: false,
            max_image_size: 800,
            detection_threshold: 0.3,
            recognition_threshold: 0.5,
        }
    }
}

/// Export-related settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Directory CSV exports are written to; platform default when unset
    pub output_dir: Option<PathBuf>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!(config.general.auto_recognize);

        assert_eq!(config.recognition.languages, vec!["en"]);
        assert!(!config.recognition.use_gpu);
        assert_eq!(config.recognition.max_image_size, 800);
        assert!((config.recognition.detection_threshold - 0.3).abs() < 0.01);
        assert!((config.recognition.recognition_threshold - 0.5).abs() < 0.01);

        assert!(config.export.output_dir.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.general.auto_recognize, parsed.general.auto_recognize);
        assert_eq!(config.recognition.languages, parsed.recognition.languages);
        assert_eq!(config.recognition.max_image_size, parsed.recognition.max_image_size);
        assert_eq!(config.export.output_dir, parsed.export.output_dir);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.recognition.languages = vec!["en".to_string(), "fr".to_string()];
        config.recognition.max_image_size = 1200;
        config.export.output_dir = Some(PathBuf::from("/tmp/exports"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.recognition.languages, vec!["en", "fr"]);
        assert_eq!(parsed.recognition.max_image_size, 1200);
        assert_eq!(parsed.export.output_dir, Some(PathBuf::from("/tmp/exports")));
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.general.auto_recognize, loaded.general.auto_recognize);
        assert_eq!(config.recognition.languages, loaded.recognition.languages);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
