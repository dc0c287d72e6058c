//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model artifact, storage).

mod classifier;
mod storage;

pub use classifier::{Classifier, ModelError};
pub use storage::{DoctorDirectory, HistoryLedger, PatientDirectory, StorageError};
