//! Screening service: parse a lab-value form, classify it and append the
//! result to the history ledger.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Identity, LiverFeatures, PredictionLabel, PredictionRecord, Role};
use crate::ports::{Classifier, HistoryLedger};
use crate::{HepaError, Result};

/// Result of one submission.
#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub label: PredictionLabel,
    pub record: PredictionRecord,
}

/// Runs submissions against the loaded classifier.
///
/// With no classifier (load failed at startup) the service stays degraded:
/// every submission fails with `ModelUnavailable` and nothing is appended.
pub struct ScreeningService<L>
where
    L: HistoryLedger,
{
    classifier: Option<Arc<dyn Classifier>>,
    ledger: Arc<L>,
    load_error: Option<String>,
}

impl<L> ScreeningService<L>
where
    L: HistoryLedger,
{
    pub fn new(classifier: Arc<dyn Classifier>, ledger: Arc<L>) -> Self {
        Self {
            classifier: Some(classifier),
            ledger,
            load_error: None,
        }
    }

    /// Service whose classifier failed to load.
    pub fn degraded(ledger: Arc<L>, reason: impl Into<String>) -> Self {
        Self {
            classifier: None,
            ledger,
            load_error: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.classifier.is_some()
    }

    /// Human-readable model status for the landing document.
    #[must_use]
    pub fn model_status(&self) -> String {
        match (&self.classifier, &self.load_error) {
            (Some(classifier), _) => format!("loaded: {}", classifier.describe()),
            (None, Some(reason)) => format!("unavailable: {reason}"),
            (None, None) => "unavailable".to_string(),
        }
    }

    /// Classify a submitted form on behalf of a patient identity.
    ///
    /// Fields are parsed before the model is consulted, so a malformed form is
    /// reported as such even when the model is down.
    ///
    /// # Errors
    /// - `Validation` if a field is not a number
    /// - `ModelUnavailable` if no classifier is loaded
    /// - `Unauthorized` if the identity is not a patient, or the patient's
    ///   account no longer exists
    pub fn submit(
        &self,
        identity: &Identity,
        form: &HashMap<String, String>,
    ) -> Result<ScreeningOutcome> {
        let Identity::Patient { phone, name } = identity else {
            return Err(HepaError::Unauthorized(Role::Patient));
        };

        let features = LiverFeatures::from_form(form).map_err(|field| {
            tracing::debug!(field = %field, "Rejected non-numeric form field");
            HepaError::Validation("Please enter valid numbers!".into())
        })?;

        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| HepaError::ModelUnavailable("Model not loaded.".into()))?;

        let label = classifier.predict(&features)?;
        let record = PredictionRecord::today(phone.clone(), name.clone(), features, label);
        if !self.ledger.append_for_patient(&record)? {
            return Err(HepaError::Unauthorized(Role::Patient));
        }

        tracing::info!(prediction = label.as_u8(), "Screening recorded");
        Ok(ScreeningOutcome { label, record })
    }
}
