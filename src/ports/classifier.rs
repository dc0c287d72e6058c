//! Classifier port: Trait for the pre-trained screening model.
//!
//! The model is an opaque collaborator: one feature vector in, one binary
//! label out.

use crate::domain::{LiverFeatures, PredictionLabel};

/// Errors while loading or invoking the classifier.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model artifact: {0}")]
    Format(String),

    #[error("Model integrity check failed: {0}")]
    Integrity(String),

    #[error("Model produced a non-finite score")]
    NonFinite,
}

/// Trait for binary classification of lab values.
///
/// Implementations must be deterministic for a fixed artifact and must not
/// validate feature ranges.
pub trait Classifier: Send + Sync {
    /// Classify one feature vector.
    ///
    /// # Errors
    /// Returns `ModelError::NonFinite` if the score cannot be computed.
    fn predict(&self, features: &LiverFeatures) -> Result<PredictionLabel, ModelError>;

    /// Short description for status output (e.g. artifact name and version).
    fn describe(&self) -> String;
}
