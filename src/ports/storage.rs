//! Storage ports: Repositories for accounts and the history ledger.
//!
//! These traits abstract the backing store from the application logic.
//! Implementations own their data and serialize mutation internally.

use crate::domain::{DoctorAccount, PatientAccount, PredictionRecord};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Patient accounts keyed by phone.
pub trait PatientDirectory: Send + Sync {
    /// Insert a new patient.
    ///
    /// # Errors
    /// Returns `StorageError::AlreadyExists` if the phone is taken; the
    /// existing account is left unchanged.
    fn insert_patient(&self, account: &PatientAccount) -> Result<(), StorageError>;

    /// Look up a patient by phone.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn find_patient(&self, phone: &str) -> Result<Option<PatientAccount>, StorageError>;

    /// Remove a patient and every ledger record with the same phone, as one
    /// unit. Returns whether an account existed and how many records went.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn remove_patient_cascade(&self, phone: &str) -> Result<(bool, usize), StorageError>;

    /// Number of registered patients.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count_patients(&self) -> Result<usize, StorageError>;
}

/// Doctor accounts keyed by doctor ID.
pub trait DoctorDirectory: Send + Sync {
    /// Insert a new doctor.
    ///
    /// # Errors
    /// Returns `StorageError::AlreadyExists` if the ID is taken.
    fn insert_doctor(&self, account: &DoctorAccount) -> Result<(), StorageError>;

    /// Look up a doctor by ID.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn find_doctor(&self, doctor_id: &str) -> Result<Option<DoctorAccount>, StorageError>;

    /// All doctors in creation order.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn list_doctors(&self) -> Result<Vec<DoctorAccount>, StorageError>;
}

/// Append-only list of prediction records.
pub trait HistoryLedger: Send + Sync {
    /// Append a record.
    ///
    /// # Errors
    /// Returns error only if the backing store itself fails.
    fn append(&self, record: &PredictionRecord) -> Result<(), StorageError>;

    /// Append a record only while a patient account with its phone exists.
    ///
    /// The existence check and the insert happen as one unit, so a record
    /// cannot land after its account has been removed. Returns whether the
    /// record was appended.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn append_for_patient(&self, record: &PredictionRecord) -> Result<bool, StorageError>;

    /// All records in insertion order.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn all(&self) -> Result<Vec<PredictionRecord>, StorageError>;

    /// Remove every record for a phone. Returns the number removed.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn delete_by_phone(&self, phone: &str) -> Result<usize, StorageError>;

    /// Number of records.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn count(&self) -> Result<usize, StorageError>;
}
