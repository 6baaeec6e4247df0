//! rten classifier implementation
//!
//! Pure Rust inference for the 27-class letter model (converted to the
//! `.rten` format). No system dependencies required. The model is read from
//! a local path, or downloaded once into the user cache directory.

use crate::classifier::{LetterClassifier, TileBatch, NUM_CLASSES};
use crate::config::Config;
use crate::error::SegmenterError;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "letter-segmenter";
const DEFAULT_MODEL_FILE: &str = "letters.rten";

/// Letter classifier backed by an rten model
pub struct RtenClassifier {
    model: Model,
    model_path: PathBuf,
}

impl RtenClassifier {
    /// Load the configured model, downloading it if needed
    pub fn new(config: &Config) -> Result<Self, SegmenterError> {
        let model_path = match (&config.model_path, &config.model_url) {
            (Some(path), _) => path.clone(),
            (None, Some(url)) => ensure_model_downloaded(url, &cache_dir())?,
            (None, None) => {
                return Err(SegmenterError::InitializationError(
                    "No model path or URL configured".to_string(),
                ))
            }
        };

        let model = Model::load_file(&model_path).map_err(|e| {
            SegmenterError::InitializationError(format!(
                "Failed to load model {:?}: {}",
                model_path, e
            ))
        })?;

        tracing::info!("rten classifier loaded from {:?}", model_path);

        Ok(Self { model, model_path })
    }
}

impl LetterClassifier for RtenClassifier {
    fn name(&self) -> &'static str {
        "rten"
    }

    fn description(&self) -> &'static str {
        "Pure Rust letter classifier - 27 classes (none, a-z)"
    }

    fn classify(&self, batch: &TileBatch) -> Result<Vec<Vec<f32>>, SegmenterError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let input = NdTensor::from_data(batch.shape(), batch.data.clone());

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| SegmenterError::ProcessingError(format!("Model run failed: {}", e)))?;

        let scores: NdTensor<f32, 2> = output.try_into().map_err(|e| {
            SegmenterError::ProcessingError(format!("Unexpected model output: {:?}", e))
        })?;

        let [rows, classes] = scores.shape();
        if rows != batch.len || classes != NUM_CLASSES {
            return Err(SegmenterError::ProcessingError(format!(
                "Expected output shape [{}, {}], got [{}, {}]",
                batch.len, NUM_CLASSES, rows, classes
            )));
        }

        Ok(scores
            .to_vec()
            .chunks(classes)
            .map(|row| row.to_vec())
            .collect())
    }

    fn shutdown(&self) {
        tracing::info!("Releasing rten classifier ({:?})", self.model_path);
    }
}

fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

/// File name a downloaded model is cached under
fn model_file_name(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_MODEL_FILE)
        .to_string()
}

/// Ensure model is downloaded and return its path
fn ensure_model_downloaded(url: &str, cache_dir: &Path) -> Result<PathBuf, SegmenterError> {
    std::fs::create_dir_all(cache_dir).map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to create cache directory: {}", e))
    })?;

    let filename = model_file_name(url);
    let model_path = cache_dir.join(&filename);

    if !model_path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &model_path)?;
        tracing::info!("Downloaded {} to {:?}", filename, model_path);
    } else {
        tracing::info!("Using cached model from {:?}", model_path);
    }

    Ok(model_path)
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), SegmenterError> {
    let response = ureq::get(url).call().map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to download model: {}", e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    // Only complete downloads may appear at the cached path
    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to create model file: {}", e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to write model file: {}", e))
    })?;
    std::fs::rename(&partial, path).map_err(|e| {
        SegmenterError::InitializationError(format!("Failed to store model file: {}", e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_file_name_from_url() {
        assert_eq!(
            model_file_name("https://example.com/models/emnist-letters.rten"),
            "emnist-letters.rten"
        );
        assert_eq!(
            model_file_name("https://example.com/models/letters.rten?download=1"),
            "letters.rten"
        );
        assert_eq!(model_file_name("https://example.com/"), DEFAULT_MODEL_FILE);
    }

    #[test]
    fn test_cached_model_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("letters.rten");
        std::fs::write(&cached, b"cached").unwrap();

        // The URL is unreachable; a cache hit must not touch the network
        let path = ensure_model_downloaded("http://127.0.0.1:9/letters.rten", dir.path()).unwrap();
        assert_eq!(path, cached);
        assert_eq!(std::fs::read(&path).unwrap(), b"cached");
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = ensure_model_downloaded("http://127.0.0.1:9/letters.rten", dir.path());
        assert!(matches!(result, Err(SegmenterError::InitializationError(_))));
        assert!(!dir.path().join("letters.rten").exists());
    }

    #[test]
    fn test_invalid_model_file_fails_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.rten");
        std::fs::write(&path, b"not a model").unwrap();

        let config = Config {
            model_path: Some(path),
            ..Config::default()
        };
        assert!(matches!(
            RtenClassifier::new(&config),
            Err(SegmenterError::InitializationError(_))
        ));
    }
}
