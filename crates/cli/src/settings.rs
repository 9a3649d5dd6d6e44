use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use faceswap_core::safety::infrastructure::onnx_explicit_content_filter::DEFAULT_CONTENT_THRESHOLD;
use faceswap_core::shared::constants::{
    CONTENT_FILTER_MODEL_NAME, DEFAULT_FPS, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_WORKERS,
    DETECTOR_MODEL_NAME, EMBEDDING_MODEL_NAME, GENDER_MODEL_NAME, SWAPPER_MODEL_NAME,
};
use faceswap_core::shared::error::BoxError;

/// Persistent defaults. Command-line flags override every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub models_dir: Option<PathBuf>,
    pub emap: Option<PathBuf>,
    pub device: String,
    pub similarity_threshold: f64,
    pub history_capacity: Option<usize>,
    pub workers: usize,
    pub content_threshold: f64,
    pub fps: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            models_dir: None,
            emap: None,
            device: "cpu".to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            history_capacity: None,
            workers: DEFAULT_WORKERS,
            content_threshold: DEFAULT_CONTENT_THRESHOLD,
            fps: DEFAULT_FPS,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("faceswap").join("settings.json"))
    }

    /// Reads `explicit` when given (it must exist and parse), otherwise the
    /// default location, falling back to defaults when that file is absent
    /// or unreadable.
    pub fn load(explicit: Option<&Path>) -> Result<Self, BoxError> {
        if let Some(path) = explicit {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
            return Ok(serde_json::from_str(&json)
                .map_err(|e| format!("Invalid config {}: {e}", path.display()))?);
        }

        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        let Ok(json) = fs::read_to_string(&path) else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&json) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                log::warn!("Ignoring invalid settings at {}: {e}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), BoxError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn models_dir(&self) -> Option<PathBuf> {
        self.models_dir.clone().or_else(default_models_dir)
    }
}

fn default_models_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join("FaceSwap").join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join("FaceSwap").join("models"))
    }
}

/// Model files expected under the models directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    pub detector: PathBuf,
    pub embedder: PathBuf,
    /// Only set when the file is present; gender stays unknown otherwise.
    pub gender: Option<PathBuf>,
    pub swapper: PathBuf,
    pub content_filter: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        let gender = dir.join(GENDER_MODEL_NAME);
        Self {
            detector: dir.join(DETECTOR_MODEL_NAME),
            embedder: dir.join(EMBEDDING_MODEL_NAME),
            gender: gender.is_file().then_some(gender),
            swapper: dir.join(SWAPPER_MODEL_NAME),
            content_filter: dir.join(CONTENT_FILTER_MODEL_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            models_dir: Some(PathBuf::from("/models")),
            workers: 8,
            history_capacity: Some(32),
            ..Settings::default()
        };

        settings.save(&path).unwrap();

        assert_eq!(Settings::load(Some(&path)).unwrap(), settings);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "device": "accelerator" }"#).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.device, "accelerator");
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert!((settings.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_config_must_exist_and_parse() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.json"))).is_err());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(Settings::load(Some(&broken)).is_err());
    }

    #[test]
    fn test_model_paths_use_standard_names() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ModelPaths::in_dir(dir.path());
        assert_eq!(paths.swapper, dir.path().join(SWAPPER_MODEL_NAME));
        assert_eq!(paths.gender, None);

        fs::write(dir.path().join(GENDER_MODEL_NAME), b"").unwrap();
        let paths = ModelPaths::in_dir(dir.path());
        assert_eq!(paths.gender, Some(dir.path().join(GENDER_MODEL_NAME)));
    }

    #[test]
    fn test_models_dir_prefers_configured_value() {
        let settings = Settings {
            models_dir: Some(PathBuf::from("/opt/models")),
            ..Settings::default()
        };
        assert_eq!(settings.models_dir(), Some(PathBuf::from("/opt/models")));
    }
}
