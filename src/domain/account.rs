//! Patient and doctor accounts, and the identities a session can hold.

use serde::Serialize;

use super::credential::CredentialHash;

/// A registered patient, keyed by phone.
#[derive(Debug, Clone)]
pub struct PatientAccount {
    pub phone: String,
    pub name: String,
    pub password_hash: CredentialHash,
}

/// A doctor created by the administrator, keyed by doctor ID.
#[derive(Debug, Clone)]
pub struct DoctorAccount {
    pub doctor_id: String,
    pub name: String,
    pub phone: String,
    pub password_hash: CredentialHash,
}

/// Doctor listing safe to display (no credential hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorSummary {
    pub doctor_id: String,
    pub name: String,
    pub phone: String,
}

impl From<&DoctorAccount> for DoctorSummary {
    fn from(doctor: &DoctorAccount) -> Self {
        Self {
            doctor_id: doctor.doctor_id.clone(),
            name: doctor.name.clone(),
            phone: doctor.phone.clone(),
        }
    }
}

/// Role a protected operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    /// Login route for this role.
    #[must_use]
    pub fn login_path(&self) -> &'static str {
        match self {
            Self::Patient => "/login",
            Self::Doctor => "/doctor-login",
            Self::Admin => "/admin-login",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patient => write!(f, "patient"),
            Self::Doctor => write!(f, "doctor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// The authenticated identity held by a session.
///
/// A session holds exactly one identity; establishing a new one replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Identity {
    #[default]
    Anonymous,
    Patient { phone: String, name: String },
    Doctor { doctor_id: String, name: String },
    Admin { username: String },
}

impl Identity {
    /// The role carried by this identity, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Anonymous => None,
            Self::Patient { .. } => Some(Role::Patient),
            Self::Doctor { .. } => Some(Role::Doctor),
            Self::Admin { .. } => Some(Role::Admin),
        }
    }

    /// Display name for greetings.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Anonymous => "",
            Self::Patient { name, .. } | Self::Doctor { name, .. } => name,
            Self::Admin { username } => username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roles() {
        assert_eq!(Identity::Anonymous.role(), None);
        let patient = Identity::Patient {
            phone: "555-0100".into(),
            name: "Alice".into(),
        };
        assert_eq!(patient.role(), Some(Role::Patient));
        assert_eq!(patient.display_name(), "Alice");
        assert_eq!(
            Identity::Admin {
                username: "admin".into()
            }
            .role(),
            Some(Role::Admin)
        );
    }

    #[test]
    fn test_identity_serializes_tagged() {
        let doctor = Identity::Doctor {
            doctor_id: "D1".into(),
            name: "House".into(),
        };
        let json = serde_json::to_value(&doctor).expect("Should serialize");
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["doctor_id"], "D1");
    }

    #[test]
    fn test_login_paths() {
        assert_eq!(Role::Patient.login_path(), "/login");
        assert_eq!(Role::Doctor.login_path(), "/doctor-login");
        assert_eq!(Role::Admin.login_path(), "/admin-login");
    }
}
