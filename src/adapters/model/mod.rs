//! Model adapter: Logistic-regression classifier loaded from a JSON export.
//!
//! The artifact holds standardization parameters, coefficients, intercept and
//! decision threshold exported by the training pipeline. Inference is
//! `sigmoid(intercept + sum(coef_i * (x_i - mean_i) / scale_i)) >= threshold`.
//!
//! # Integrity
//!
//! When `manifest.json` and `model.sig` sit next to the artifact:
//! - the Ed25519 signature over the manifest bytes is verified with the
//!   configured public key
//! - the artifact's SHA-256 must equal the manifest entry for its file name
//!
//! A missing signature is tolerated (with a warning) unless
//! `ModelLoadOptions::require_signature` is set.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{LiverFeatures, PredictionLabel, FEATURE_COUNT, FEATURE_FIELDS};
use crate::ports::{Classifier, ModelError};

/// Manifest file name expected next to the artifact.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Detached signature file name expected next to the artifact.
pub const SIGNATURE_FILE: &str = "model.sig";

/// Parameters exported by the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedLogisticModel {
    pub version: u32,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub threshold: f64,
}

/// Signed list of artifact digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<i64>,
    /// File name -> lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

/// How strictly to treat artifact integrity at load time.
#[derive(Debug, Clone, Default)]
pub struct ModelLoadOptions {
    /// Refuse artifacts without `manifest.json` + `model.sig`.
    pub require_signature: bool,
    /// Public key used to verify `model.sig`.
    pub verifying_key: Option<VerifyingKey>,
}

impl ModelLoadOptions {
    /// Parse a base64-encoded 32-byte Ed25519 public key.
    ///
    /// # Errors
    /// Returns `ModelError::Integrity` if the key is malformed.
    pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ModelError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|_| ModelError::Integrity("Invalid public key base64".into()))?;
        let pubkey: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ModelError::Integrity("Invalid public key length (expected 32 bytes)".into())
        })?;
        VerifyingKey::from_bytes(&pubkey)
            .map_err(|_| ModelError::Integrity("Invalid verifying key".into()))
    }
}

/// Lowercase hex SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    crate::domain::credential::constant_time_eq(a, b)
}

/// Loaded logistic-regression classifier.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    params: ExportedLogisticModel,
    source: PathBuf,
}

impl LogisticModel {
    /// Load and validate a model artifact.
    ///
    /// # Errors
    /// Returns error if the file is unreadable, malformed, or fails the
    /// integrity check.
    pub fn load(path: &Path, options: &ModelLoadOptions) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        Self::verify_integrity(path, &bytes, options)?;

        let params: ExportedLogisticModel = serde_json::from_slice(&bytes)
            .map_err(|e| ModelError::Format(e.to_string()))?;
        Self::validate(&params)?;

        tracing::info!(
            "Loaded model from {:?} (version={}, threshold={})",
            path,
            params.version,
            params.threshold
        );

        Ok(Self {
            params,
            source: path.to_path_buf(),
        })
    }

    /// Build a model directly from parameters.
    ///
    /// # Errors
    /// Returns `ModelError::Format` if the parameters are inconsistent.
    pub fn from_params(params: ExportedLogisticModel) -> Result<Self, ModelError> {
        Self::validate(&params)?;
        Ok(Self {
            params,
            source: PathBuf::from("<memory>"),
        })
    }

    /// Probability of disease for a feature vector.
    #[must_use]
    pub fn probability(&self, features: &LiverFeatures) -> f64 {
        let p = &self.params;
        let linear = features
            .to_array()
            .iter()
            .enumerate()
            .fold(p.intercept, |acc, (i, x)| {
                acc + p.coefficients[i] * (x - p.scaler_mean[i]) / p.scaler_scale[i]
            });
        1.0 / (1.0 + (-linear).exp())
    }

    fn validate(model: &ExportedLogisticModel) -> Result<(), ModelError> {
        if model.version != 1 {
            return Err(ModelError::Format(format!(
                "Unsupported model version: {}",
                model.version
            )));
        }
        if model.feature_names.len() != FEATURE_COUNT
            || model.coefficients.len() != FEATURE_COUNT
            || model.scaler_mean.len() != FEATURE_COUNT
            || model.scaler_scale.len() != FEATURE_COUNT
        {
            return Err(ModelError::Format(format!(
                "Model parameter lengths must all be {FEATURE_COUNT}"
            )));
        }
        for (got, expected) in model.feature_names.iter().zip(FEATURE_FIELDS) {
            if got != expected {
                return Err(ModelError::Format(format!(
                    "Feature order mismatch: expected {expected}, got {got}"
                )));
            }
        }

        let all_finite = model
            .coefficients
            .iter()
            .chain(&model.scaler_mean)
            .chain(&model.scaler_scale)
            .chain(std::iter::once(&model.intercept))
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ModelError::Format("Model parameters must be finite".into()));
        }
        if model.scaler_scale.iter().any(|s| *s == 0.0) {
            return Err(ModelError::Format("Scaler scale must be non-zero".into()));
        }
        if !(model.threshold > 0.0 && model.threshold < 1.0) {
            return Err(ModelError::Format(format!(
                "Threshold {} must lie in (0, 1)",
                model.threshold
            )));
        }
        Ok(())
    }

    fn verify_integrity(
        path: &Path,
        artifact: &[u8],
        options: &ModelLoadOptions,
    ) -> Result<(), ModelError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let manifest_path = base_dir.join(MANIFEST_FILE);
        let sig_path = base_dir.join(SIGNATURE_FILE);

        if !manifest_path.exists() || !sig_path.exists() {
            if options.require_signature {
                tracing::error!(
                    "Model signature not found at {:?}; signed models are required",
                    sig_path
                );
                return Err(ModelError::Integrity("Model signature required".into()));
            }
            tracing::warn!("Loading UNSIGNED model artifact {:?}", path);
            return Ok(());
        }

        let verifying_key = options.verifying_key.ok_or_else(|| {
            ModelError::Integrity("Signed model found but no verifying key configured".into())
        })?;

        let sig_bytes = fs::read(&sig_path)?;
        let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
            ModelError::Integrity("Invalid signature length (expected 64 bytes)".into())
        })?;
        let signature = Signature::from_bytes(&sig_array);

        let manifest_bytes = fs::read(&manifest_path)?;
        verifying_key
            .verify(&manifest_bytes, &signature)
            .map_err(|_| ModelError::Integrity("Invalid model signature".into()))?;

        let manifest: ModelManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| ModelError::Integrity(format!("Invalid manifest.json format: {e}")))?;
        if manifest.version != 1 {
            return Err(ModelError::Integrity(format!(
                "Unsupported manifest version: {}",
                manifest.version
            )));
        }

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ModelError::Integrity("Artifact path has no file name".into()))?;
        let expected = manifest.files.get(file_name).ok_or_else(|| {
            ModelError::Integrity(format!("Manifest does not bind {file_name}"))
        })?;

        if !constant_time_eq_str(&sha256_hex(artifact), expected) {
            return Err(ModelError::Integrity(format!(
                "File hash mismatch for {file_name}"
            )));
        }

        tracing::info!("Model signature and hash verified");
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &LiverFeatures) -> Result<PredictionLabel, ModelError> {
        let probability = self.probability(features);
        if !probability.is_finite() {
            return Err(ModelError::NonFinite);
        }

        tracing::debug!("Model probability={:.4}", probability);

        Ok(if probability >= self.params.threshold {
            PredictionLabel::Disease
        } else {
            PredictionLabel::Healthy
        })
    }

    fn describe(&self) -> String {
        format!("{} (v{})", self.source.display(), self.params.version)
    }
}
