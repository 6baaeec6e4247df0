//! Letter classifier implementations
//!
//! This module contains implementations of the LetterClassifier trait.
//! Backends are conditionally compiled based on feature flags.

#[cfg(feature = "classifier-rten")]
pub mod rten;

use crate::classifier::LetterClassifier;
use crate::config::Config;
use crate::error::SegmenterError;
use std::sync::Arc;

/// Build the classifier handle described by the configuration.
///
/// Returns `Ok(None)` when no model is configured; the server then only
/// offers segmentation.
pub fn load(config: &Config) -> Result<Option<Arc<dyn LetterClassifier>>, SegmenterError> {
    if config.model_path.is_none() && config.model_url.is_none() {
        tracing::warn!("No classifier model configured, recognition is disabled");
        return Ok(None);
    }

    #[cfg(feature = "classifier-rten")]
    {
        tracing::info!("Initializing rten classifier...");
        let classifier = rten::RtenClassifier::new(config)?;
        return Ok(Some(Arc::new(classifier)));
    }

    #[cfg(not(feature = "classifier-rten"))]
    Err(SegmenterError::InitializationError(
        "No classifier backend available. Build with --features classifier-rten".to_string(),
    ))
}
