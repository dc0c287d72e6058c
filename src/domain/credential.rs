//! Password hashing for patient and doctor credentials.
//!
//! - Argon2id (memory-hard) with a random salt per hash
//! - Hashes are stored as PHC strings (`$argon2id$v=19$...`), which carry
//!   their own salt and parameters
//! - Plaintext passwords are never stored

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;

/// Errors while producing or parsing a credential hash.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Stored credential hash is malformed")]
    MalformedHash,
}

/// A salted one-way password digest in PHC string format.
///
/// `Debug` never prints the digest.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHash(String);

impl CredentialHash {
    /// Wrap an existing PHC string (e.g. read back from storage).
    ///
    /// # Errors
    /// Returns `CredentialError::MalformedHash` if the string is not a PHC hash.
    pub fn from_phc(phc: impl Into<String>) -> Result<Self, CredentialError> {
        let phc = phc.into();
        PasswordHash::new(&phc).map_err(|_| CredentialError::MalformedHash)?;
        Ok(Self(phc))
    }

    /// The PHC string, for storage.
    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialHash([REDACTED])")
    }
}

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Hash a raw password with a fresh random salt.
///
/// # Errors
/// Returns error if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<CredentialHash, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(CredentialHash(hash.to_string()))
}

/// Check a raw password against a stored hash.
#[must_use]
pub fn verify_password(password: &str, stored: &CredentialHash) -> bool {
    match PasswordHash::new(stored.as_phc()) {
        Ok(parsed) => hasher()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Constant-time equality for short secrets such as the admin credentials.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify_roundtrip() {
        let hash = hash_password("pw123").expect("Hashing should succeed");
        assert!(verify_password("pw123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("same").expect("Hashing should succeed");
        let b = hash_password("same").expect("Hashing should succeed");
        assert_ne!(a.as_phc(), b.as_phc());
        assert!(a.as_phc().starts_with("$argon2id$"));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let hash = hash_password("secret").expect("Hashing should succeed");
        let out = format!("{hash:?}");
        assert!(!out.contains("argon2"));
        assert!(out.contains("REDACTED"));
    }

    #[test]
    fn test_from_phc_rejects_garbage() {
        assert!(matches!(
            CredentialHash::from_phc("not-a-hash"),
            Err(CredentialError::MalformedHash)
        ));
        let hash = hash_password("pw").expect("Hashing should succeed");
        let restored = CredentialHash::from_phc(hash.as_phc()).expect("Should parse");
        assert!(verify_password("pw", &restored));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("admin", "admin"));
        assert!(!constant_time_eq("admin", "admim"));
        assert!(!constant_time_eq("admin", "admin "));
    }
}
