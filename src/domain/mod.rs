//! Domain layer: Core business types and logic.
//!
//! Pure types with validation; no I/O.

mod account;
pub mod credential;
mod features;
mod prediction;

pub use account::{DoctorAccount, DoctorSummary, Identity, PatientAccount, Role};
pub use credential::{CredentialError, CredentialHash};
pub use features::{LiverFeatures, FEATURE_COUNT, FEATURE_FIELDS};
pub use prediction::{group_by_date, DateGroup, PredictionLabel, PredictionRecord};
