//! Account service: registration, credential checks, patient purge and the
//! dashboard read models.

use std::sync::Arc;

use serde::Serialize;

use crate::config::AdminCredentials;
use crate::domain::credential::{constant_time_eq, hash_password, verify_password};
use crate::domain::{
    group_by_date, DateGroup, DoctorAccount, DoctorSummary, Identity, PatientAccount,
    PredictionRecord,
};
use crate::ports::{DoctorDirectory, HistoryLedger, PatientDirectory, StorageError};
use crate::{HepaError, Result};

/// Aggregate view for the administrator.
#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub registered_patients: usize,
    pub total_submissions: usize,
    pub total_doctors: usize,
    pub doctors: Vec<DoctorSummary>,
    pub submissions_by_date: Vec<DateGroup>,
}

/// Outcome of a patient purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatientRemoval {
    pub account_existed: bool,
    pub records_removed: usize,
}

fn required(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn duplicate_or(err: StorageError, message: &str) -> HepaError {
    match err {
        StorageError::AlreadyExists(_) => HepaError::DuplicateKey(message.to_string()),
        other => HepaError::Storage(other),
    }
}

/// Account use cases over one store that implements every repository port.
pub struct AccountService<S>
where
    S: PatientDirectory + DoctorDirectory + HistoryLedger,
{
    store: Arc<S>,
    admin: AdminCredentials,
}

impl<S> AccountService<S>
where
    S: PatientDirectory + DoctorDirectory + HistoryLedger,
{
    pub fn new(store: Arc<S>, admin: AdminCredentials) -> Self {
        Self { store, admin }
    }

    /// Register a patient. `phone` and `name` are trimmed; the password is
    /// taken verbatim.
    ///
    /// # Errors
    /// `Validation` if a field is empty, `DuplicateKey` if the phone is taken.
    pub fn register_patient(&self, phone: &str, name: &str, password: &str) -> Result<()> {
        let (Some(phone), Some(name)) = (required(phone), required(name)) else {
            return Err(HepaError::Validation("All fields are required".into()));
        };
        if password.is_empty() {
            return Err(HepaError::Validation("All fields are required".into()));
        }

        let account = PatientAccount {
            phone: phone.to_string(),
            name: name.to_string(),
            password_hash: hash_password(password)?,
        };
        self.store
            .insert_patient(&account)
            .map_err(|e| duplicate_or(e, "Phone number already registered"))?;

        tracing::info!("Patient registered");
        Ok(())
    }

    /// Check patient credentials.
    ///
    /// # Errors
    /// `Authentication` on unknown phone or wrong password.
    pub fn verify_patient(&self, phone: &str, password: &str) -> Result<Identity> {
        let account = self
            .store
            .find_patient(phone.trim())?
            .ok_or(HepaError::Authentication)?;
        if !verify_password(password, &account.password_hash) {
            return Err(HepaError::Authentication);
        }
        Ok(Identity::Patient {
            phone: account.phone,
            name: account.name,
        })
    }

    /// Create a doctor. Every field, the password included, is trimmed.
    ///
    /// # Errors
    /// `Validation` if a field is empty, `DuplicateKey` if the ID is taken.
    pub fn add_doctor(
        &self,
        doctor_id: &str,
        name: &str,
        phone: &str,
        password: &str,
    ) -> Result<DoctorSummary> {
        let (Some(doctor_id), Some(name), Some(phone), Some(password)) = (
            required(doctor_id),
            required(name),
            required(phone),
            required(password),
        ) else {
            return Err(HepaError::Validation("All fields are required!".into()));
        };

        let account = DoctorAccount {
            doctor_id: doctor_id.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            password_hash: hash_password(password)?,
        };
        self.store
            .insert_doctor(&account)
            .map_err(|e| duplicate_or(e, "Doctor ID already exists!"))?;

        tracing::info!(doctor_id = %account.doctor_id, "Doctor account created");
        Ok(DoctorSummary::from(&account))
    }

    /// Check doctor credentials.
    ///
    /// # Errors
    /// `Authentication` on unknown ID or wrong password.
    pub fn verify_doctor(&self, doctor_id: &str, password: &str) -> Result<Identity> {
        let account = self
            .store
            .find_doctor(doctor_id.trim())?
            .ok_or(HepaError::Authentication)?;
        if !verify_password(password, &account.password_hash) {
            return Err(HepaError::Authentication);
        }
        Ok(Identity::Doctor {
            doctor_id: account.doctor_id,
            name: account.name,
        })
    }

    /// Check the fixed administrator pair.
    ///
    /// # Errors
    /// `Authentication` unless both values match.
    pub fn verify_admin(&self, username: &str, password: &str) -> Result<Identity> {
        let username = username.trim();
        // Evaluate both comparisons so timing does not reveal which one failed.
        let user_ok = constant_time_eq(username, &self.admin.username);
        let pass_ok = constant_time_eq(password, &self.admin.password);
        if user_ok & pass_ok {
            Ok(Identity::Admin {
                username: username.to_string(),
            })
        } else {
            tracing::warn!("Rejected admin login attempt");
            Err(HepaError::Authentication)
        }
    }

    /// Remove a patient account and all of its history records.
    ///
    /// An absent account is not an error; its stray records are still purged.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn delete_patient(&self, phone: &str) -> Result<PatientRemoval> {
        let (account_existed, records_removed) = self.store.remove_patient_cascade(phone)?;
        tracing::info!(
            account_existed,
            records_removed,
            "Patient removed with history"
        );
        Ok(PatientRemoval {
            account_existed,
            records_removed,
        })
    }

    /// Build the administrator's aggregate view.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn admin_dashboard(&self) -> Result<AdminDashboard> {
        let records = self.store.all()?;
        let doctors: Vec<DoctorSummary> = self
            .store
            .list_doctors()?
            .iter()
            .map(DoctorSummary::from)
            .collect();

        Ok(AdminDashboard {
            registered_patients: self.store.count_patients()?,
            total_submissions: records.len(),
            total_doctors: doctors.len(),
            doctors,
            submissions_by_date: group_by_date(&records),
        })
    }

    /// Every ledger record, in insertion order, for the doctor view.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn all_records(&self) -> Result<Vec<PredictionRecord>> {
        Ok(self.store.all()?)
    }
}
