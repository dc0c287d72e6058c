//! SQLite adapter: In-memory implementation of the storage ports.
//!
//! Holds patient accounts, doctor accounts and the history ledger for the
//! lifetime of the process. Nothing is written to disk.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a single `Mutex`, so every repository
//! operation is serialized. A poisoned mutex surfaces as
//! `StorageError::LockPoisoned` instead of panicking the request.
//!
//! Uniqueness of phones and doctor IDs is enforced by primary keys, so two
//! racing registrations cannot both succeed.

use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};

use crate::domain::{
    CredentialHash, DoctorAccount, LiverFeatures, PatientAccount, PredictionLabel,
    PredictionRecord,
};
use crate::ports::{DoctorDirectory, HistoryLedger, PatientDirectory, StorageError};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// In-memory SQLite store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create an empty in-memory store.
    ///
    /// # Errors
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS patients (
                phone TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS doctors (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                doctor_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                password_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                phone TEXT NOT NULL,
                name TEXT NOT NULL,
                features TEXT NOT NULL,
                prediction INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_phone ON history(phone);
            ",
        )?;

        Ok(())
    }

    fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
        )
    }

    fn parse_hash(phc: String) -> Result<CredentialHash, rusqlite::Error> {
        CredentialHash::from_phc(phc).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn delete_history_in(tx: &Transaction<'_>, phone: &str) -> Result<usize, StorageError> {
        Ok(tx.execute("DELETE FROM history WHERE phone = ?1", params![phone])?)
    }

    fn encode_features(record: &PredictionRecord) -> Result<String, StorageError> {
        serde_json::to_string(&record.features.to_array())
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn row_to_record(
        date: String,
        phone: String,
        name: String,
        features: String,
        prediction: i64,
    ) -> Result<PredictionRecord, StorageError> {
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| StorageError::Serialization(format!("Invalid record date: {e}")))?;
        let values: Vec<f64> = serde_json::from_str(&features)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let features = LiverFeatures::from_slice(&values).map_err(StorageError::Serialization)?;
        let prediction = u8::try_from(prediction)
            .map_err(|e| StorageError::Serialization(e.to_string()))
            .and_then(|v| PredictionLabel::try_from(v).map_err(StorageError::Serialization))?;

        Ok(PredictionRecord {
            date,
            phone,
            name,
            features,
            prediction,
        })
    }
}

impl PatientDirectory for SqliteStore {
    fn insert_patient(&self, account: &PatientAccount) -> Result<(), StorageError> {
        let conn = self.lock()?;

        let result = conn.execute(
            "INSERT INTO patients (phone, name, password_hash) VALUES (?1, ?2, ?3)",
            params![account.phone, account.name, account.password_hash.as_phc()],
        );

        match result {
            Ok(_) => {
                tracing::debug!("Inserted patient account");
                Ok(())
            }
            Err(e) if Self::is_constraint_violation(&e) => {
                Err(StorageError::AlreadyExists(account.phone.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_patient(&self, phone: &str) -> Result<Option<PatientAccount>, StorageError> {
        let conn = self.lock()?;

        let account = conn
            .query_row(
                "SELECT phone, name, password_hash FROM patients WHERE phone = ?1",
                params![phone],
                |row| {
                    Ok(PatientAccount {
                        phone: row.get(0)?,
                        name: row.get(1)?,
                        password_hash: Self::parse_hash(row.get(2)?)?,
                    })
                },
            )
            .optional()?;

        Ok(account)
    }

    fn remove_patient_cascade(&self, phone: &str) -> Result<(bool, usize), StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existed = tx.execute("DELETE FROM patients WHERE phone = ?1", params![phone])? > 0;
        let removed = Self::delete_history_in(&tx, phone)?;
        tx.commit()?;

        tracing::info!(existed, removed, "Removed patient account and history");
        Ok((existed, removed))
    }

    fn count_patients(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl DoctorDirectory for SqliteStore {
    fn insert_doctor(&self, account: &DoctorAccount) -> Result<(), StorageError> {
        let conn = self.lock()?;

        let result = conn.execute(
            r"
            INSERT INTO doctors (doctor_id, name, phone, password_hash)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                account.doctor_id,
                account.name,
                account.phone,
                account.password_hash.as_phc(),
            ],
        );

        match result {
            Ok(_) => {
                tracing::debug!(doctor_id = %account.doctor_id, "Inserted doctor account");
                Ok(())
            }
            Err(e) if Self::is_constraint_violation(&e) => {
                Err(StorageError::AlreadyExists(account.doctor_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_doctor(&self, doctor_id: &str) -> Result<Option<DoctorAccount>, StorageError> {
        let conn = self.lock()?;

        let account = conn
            .query_row(
                "SELECT doctor_id, name, phone, password_hash FROM doctors WHERE doctor_id = ?1",
                params![doctor_id],
                |row| {
                    Ok(DoctorAccount {
                        doctor_id: row.get(0)?,
                        name: row.get(1)?,
                        phone: row.get(2)?,
                        password_hash: Self::parse_hash(row.get(3)?)?,
                    })
                },
            )
            .optional()?;

        Ok(account)
    }

    fn list_doctors(&self) -> Result<Vec<DoctorAccount>, StorageError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT doctor_id, name, phone, password_hash FROM doctors ORDER BY seq ASC",
        )?;

        let doctors = stmt
            .query_map([], |row| {
                Ok(DoctorAccount {
                    doctor_id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                    password_hash: Self::parse_hash(row.get(3)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(doctors)
    }
}

impl HistoryLedger for SqliteStore {
    fn append(&self, record: &PredictionRecord) -> Result<(), StorageError> {
        let features = Self::encode_features(record)?;
        let conn = self.lock()?;

        conn.execute(
            r"
            INSERT INTO history (date, phone, name, features, prediction)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                record.date.format(DATE_FORMAT).to_string(),
                record.phone,
                record.name,
                features,
                i64::from(record.prediction.as_u8()),
            ],
        )?;

        tracing::debug!("Appended prediction record");
        Ok(())
    }

    fn append_for_patient(&self, record: &PredictionRecord) -> Result<bool, StorageError> {
        let features = Self::encode_features(record)?;
        let conn = self.lock()?;

        let inserted = conn.execute(
            r"
            INSERT INTO history (date, phone, name, features, prediction)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE EXISTS (SELECT 1 FROM patients WHERE phone = ?2)
            ",
            params![
                record.date.format(DATE_FORMAT).to_string(),
                record.phone,
                record.name,
                features,
                i64::from(record.prediction.as_u8()),
            ],
        )?;

        if inserted == 0 {
            tracing::warn!("Dropped prediction record for a removed patient");
            return Ok(false);
        }
        tracing::debug!("Appended prediction record");
        Ok(true)
    }

    fn all(&self) -> Result<Vec<PredictionRecord>, StorageError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r"
            SELECT date, phone, name, features, prediction
            FROM history
            ORDER BY seq ASC
            ",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, phone, name, features, prediction)| {
                Self::row_to_record(date, phone, name, features, prediction)
            })
            .collect()
    }

    fn delete_by_phone(&self, phone: &str) -> Result<usize, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = Self::delete_history_in(&tx, phone)?;
        tx.commit()?;
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::hash_password;

    fn patient(phone: &str, name: &str) -> PatientAccount {
        PatientAccount {
            phone: phone.to_string(),
            name: name.to_string(),
            password_hash: hash_password("pw").expect("Should hash"),
        }
    }

    fn record(phone: &str, date: &str) -> PredictionRecord {
        PredictionRecord {
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).expect("Valid date"),
            phone: phone.to_string(),
            name: "Someone".to_string(),
            features: LiverFeatures::from_slice(&[45.0, 1.2, 0.3, 200.0, 30.0, 25.0, 6.5, 3.2, 0.8])
                .expect("Valid features"),
            prediction: PredictionLabel::Disease,
        }
    }

    #[test]
    fn test_patient_crud() {
        let storage = SqliteStore::in_memory().expect("Should create db");

        assert_eq!(storage.count_patients().expect("Should count"), 0);
        storage
            .insert_patient(&patient("555-0100", "Alice"))
            .expect("Should insert");

        let loaded = storage
            .find_patient("555-0100")
            .expect("Should load")
            .expect("Should exist");
        assert_eq!(loaded.name, "Alice");
        assert!(storage.find_patient("555-0199").expect("Should load").is_none());
    }

    #[test]
    fn test_duplicate_phone_keeps_first() {
        let storage = SqliteStore::in_memory().expect("Should create db");
        storage
            .insert_patient(&patient("555-0100", "Alice"))
            .expect("Should insert");

        let err = storage
            .insert_patient(&patient("555-0100", "Mallory"))
            .expect_err("Duplicate must fail");
        assert!(matches!(err, StorageError::AlreadyExists(ref p) if p == "555-0100"));

        let loaded = storage
            .find_patient("555-0100")
            .expect("Should load")
            .expect("Should exist");
        assert_eq!(loaded.name, "Alice");
        assert_eq!(storage.count_patients().expect("Should count"), 1);
    }

    #[test]
    fn test_doctor_crud_and_order() {
        let storage = SqliteStore::in_memory().expect("Should create db");
        for id in ["D2", "D1"] {
            storage
                .insert_doctor(&DoctorAccount {
                    doctor_id: id.to_string(),
                    name: format!("Dr {id}"),
                    phone: "555-0000".to_string(),
                    password_hash: hash_password("pw").expect("Should hash"),
                })
                .expect("Should insert");
        }

        let dup = storage.insert_doctor(&DoctorAccount {
            doctor_id: "D1".to_string(),
            name: "Other".to_string(),
            phone: "555-1111".to_string(),
            password_hash: hash_password("pw").expect("Should hash"),
        });
        assert!(matches!(dup, Err(StorageError::AlreadyExists(_))));

        let ids: Vec<String> = storage
            .list_doctors()
            .expect("Should list")
            .into_iter()
            .map(|d| d.doctor_id)
            .collect();
        assert_eq!(ids, vec!["D2", "D1"]);
        assert_eq!(
            storage
                .find_doctor("D1")
                .expect("Should load")
                .expect("Should exist")
                .name,
            "Dr D1"
        );
    }

    #[test]
    fn test_ledger_preserves_insertion_order() {
        let storage = SqliteStore::in_memory().expect("Should create db");
        storage.append(&record("b", "2024-02-01")).expect("Should append");
        storage.append(&record("a", "2024-01-01")).expect("Should append");

        let all = storage.all().expect("Should load");
        let phones: Vec<&str> = all.iter().map(|r| r.phone.as_str()).collect();
        assert_eq!(phones, vec!["b", "a"]);
        assert_eq!(all[0], record("b", "2024-02-01"));
    }

    #[test]
    fn test_delete_by_phone() {
        let storage = SqliteStore::in_memory().expect("Should create db");
        storage.append(&record("a", "2024-01-01")).expect("Should append");
        storage.append(&record("b", "2024-01-01")).expect("Should append");
        storage.append(&record("a", "2024-01-02")).expect("Should append");

        assert_eq!(storage.delete_by_phone("a").expect("Should delete"), 2);
        assert_eq!(storage.count().expect("Should count"), 1);
        assert_eq!(storage.delete_by_phone("a").expect("Should delete"), 0);
    }

    #[test]
    fn test_remove_patient_cascade() {
        let storage = SqliteStore::in_memory().expect("Should create db");
        storage
            .insert_patient(&patient("555-0100", "Alice"))
            .expect("Should insert");
        storage
            .insert_patient(&patient("555-0200", "Bob"))
            .expect("Should insert");
        storage.append(&record("555-0100", "2024-01-01")).expect("Should append");
        storage.append(&record("555-0200", "2024-01-01")).expect("Should append");
        storage.append(&record("555-0100", "2024-01-03")).expect("Should append");

        let (existed, removed) = storage
            .remove_patient_cascade("555-0100")
            .expect("Should remove");
        assert!(existed);
        assert_eq!(removed, 2);

        assert!(storage.find_patient("555-0100").expect("Should load").is_none());
        assert!(storage.find_patient("555-0200").expect("Should load").is_some());
        let remaining = storage.all().expect("Should load");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].phone, "555-0200");

        let (existed, removed) = storage
            .remove_patient_cascade("555-0100")
            .expect("Should remove");
        assert!(!existed);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_append_for_patient_requires_account() {
        let storage = SqliteStore::in_memory().expect("Should create db");

        assert!(!storage
            .append_for_patient(&record("555-0100", "2024-01-01"))
            .expect("Should not fail"));
        assert_eq!(storage.count().expect("Should count"), 0);

        storage
            .insert_patient(&patient("555-0100", "Alice"))
            .expect("Should insert");
        assert!(storage
            .append_for_patient(&record("555-0100", "2024-01-01"))
            .expect("Should append"));

        storage
            .remove_patient_cascade("555-0100")
            .expect("Should remove");
        assert!(!storage
            .append_for_patient(&record("555-0100", "2024-01-02"))
            .expect("Should not fail"));
        assert_eq!(storage.count().expect("Should count"), 0);
    }
}
