//! Session manager: maps opaque client tokens to one authenticated identity.
//!
//! Tokens are 256-bit values from a ChaCha20 CSPRNG seeded from OS entropy,
//! hex encoded. Each session holds exactly one `Identity`. Every login mints
//! a fresh token and drops the one the client presented, so a planted token
//! never inherits a later login.
//!
//! The table is capped; once full, the oldest session is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::domain::{Identity, Role};
use crate::{HepaError, Result};

const TOKEN_BYTES: usize = 32;

/// Default upper bound on live sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct Inner {
    rng: ChaCha20Rng,
    sessions: HashMap<String, Identity>,
    // Tokens in creation order, for eviction.
    order: VecDeque<String>,
    max_sessions: usize,
}

impl Inner {
    fn remove(&mut self, token: &str) -> Option<Identity> {
        let removed = self.sessions.remove(token)?;
        self.order.retain(|t| t != token);
        Some(removed)
    }

    fn mint(&mut self, identity: Identity) -> String {
        while self.sessions.len() >= self.max_sessions {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.sessions.remove(&oldest);
            tracing::debug!("Evicted oldest session");
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng.fill_bytes(&mut bytes);
        let token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();

        self.sessions.insert(token.clone(), identity);
        self.order.push_back(token.clone());
        token
    }
}

/// Server-held session table.
pub struct SessionManager {
    inner: Mutex<Inner>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    /// Session table holding at most `max_sessions` live sessions.
    #[must_use]
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rng: ChaCha20Rng::from_entropy(),
                sessions: HashMap::new(),
                order: VecDeque::new(),
                max_sessions: max_sessions.max(1),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| HepaError::SessionLock)
    }

    /// Bind `identity` to a freshly minted token.
    ///
    /// A presented token is discarded, together with whatever identity it
    /// held, so one client ends up with exactly one role.
    ///
    /// # Errors
    /// Returns error if the session lock is poisoned.
    pub fn establish(&self, identity: Identity, presented: Option<&str>) -> Result<String> {
        let mut inner = self.lock()?;

        if let Some(token) = presented {
            if inner.remove(token).is_some() {
                tracing::debug!("Replaced presented session");
            }
        }

        let token = inner.mint(identity);
        tracing::debug!("Session established ({} active)", inner.sessions.len());
        Ok(token)
    }

    /// Identity held by a token; `Anonymous` for missing or unknown tokens.
    ///
    /// # Errors
    /// Returns error if the session lock is poisoned.
    pub fn current(&self, token: Option<&str>) -> Result<Identity> {
        let Some(token) = token else {
            return Ok(Identity::Anonymous);
        };
        let inner = self.lock()?;
        Ok(inner.sessions.get(token).cloned().unwrap_or_default())
    }

    /// Identity held by a token, provided it carries `role`.
    ///
    /// # Errors
    /// Returns `HepaError::Unauthorized(role)` otherwise.
    pub fn require(&self, token: Option<&str>, role: Role) -> Result<Identity> {
        let identity = self.current(token)?;
        if identity.role() == Some(role) {
            Ok(identity)
        } else {
            Err(HepaError::Unauthorized(role))
        }
    }

    /// Clear the session if it currently holds `role`.
    ///
    /// Returns whether anything was cleared. Calling it for a role the
    /// session does not hold is a no-op.
    ///
    /// # Errors
    /// Returns error if the session lock is poisoned.
    pub fn terminate(&self, token: Option<&str>, role: Role) -> Result<bool> {
        let Some(token) = token else {
            return Ok(false);
        };
        let mut inner = self.lock()?;
        let holds_role = inner
            .sessions
            .get(token)
            .is_some_and(|identity| identity.role() == Some(role));
        if holds_role {
            inner.remove(token);
        }
        Ok(holds_role)
    }

    /// Drop every session logged in as the patient with this phone.
    ///
    /// Returns the number of sessions removed.
    ///
    /// # Errors
    /// Returns error if the session lock is poisoned.
    pub fn revoke_patient(&self, phone: &str) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, identity| {
            !matches!(identity, Identity::Patient { phone: p, .. } if p == phone)
        });
        let Inner {
            sessions, order, ..
        } = &mut *inner;
        order.retain(|t| sessions.contains_key(t));
        Ok(before - inner.sessions.len())
    }

    /// Number of live sessions.
    ///
    /// # Errors
    /// Returns error if the session lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> Identity {
        Identity::Patient {
            phone: "555-0100".into(),
            name: "Alice".into(),
        }
    }

    fn admin() -> Identity {
        Identity::Admin {
            username: "admin".into(),
        }
    }

    #[test]
    fn test_establish_mints_unique_tokens() {
        let sessions = SessionManager::new();
        let a = sessions.establish(patient(), None).expect("Should establish");
        let b = sessions.establish(patient(), None).expect("Should establish");
        assert_ne!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unknown_token_is_anonymous() {
        let sessions = SessionManager::new();
        assert_eq!(sessions.current(None).expect("current"), Identity::Anonymous);
        assert_eq!(
            sessions.current(Some("deadbeef")).expect("current"),
            Identity::Anonymous
        );
    }

    #[test]
    fn test_login_rotates_presented_token() {
        let sessions = SessionManager::new();
        let old = sessions.establish(patient(), None).expect("Should establish");
        let new = sessions
            .establish(admin(), Some(&old))
            .expect("Should replace");

        assert_ne!(new, old);
        assert_eq!(sessions.current(Some(&new)).expect("current"), admin());
        assert_eq!(
            sessions.current(Some(&old)).expect("current"),
            Identity::Anonymous
        );
        assert!(matches!(
            sessions.require(Some(&new), Role::Patient),
            Err(HepaError::Unauthorized(Role::Patient))
        ));
        assert_eq!(sessions.len().expect("len"), 1);
    }

    #[test]
    fn test_planted_token_does_not_inherit_login() {
        let sessions = SessionManager::new();
        let planted = sessions
            .establish(
                Identity::Patient {
                    phone: "555-0666".into(),
                    name: "Mallory".into(),
                },
                None,
            )
            .expect("Should establish");

        let victim = sessions
            .establish(patient(), Some(&planted))
            .expect("Should establish");
        assert_ne!(victim, planted);
        assert_eq!(
            sessions.current(Some(&planted)).expect("current"),
            Identity::Anonymous
        );
    }

    #[test]
    fn test_unknown_presented_token_gets_fresh_one() {
        let sessions = SessionManager::new();
        let token = sessions
            .establish(patient(), Some("forged"))
            .expect("Should establish");
        assert_ne!(token, "forged");
        assert_eq!(
            sessions.current(Some("forged")).expect("current"),
            Identity::Anonymous
        );
    }

    #[test]
    fn test_require_checks_role() {
        let sessions = SessionManager::new();
        let token = sessions.establish(patient(), None).expect("Should establish");
        assert_eq!(
            sessions.require(Some(&token), Role::Patient).expect("Should pass"),
            patient()
        );
        assert!(matches!(
            sessions.require(Some(&token), Role::Doctor),
            Err(HepaError::Unauthorized(Role::Doctor))
        ));
        assert!(matches!(
            sessions.require(None, Role::Admin),
            Err(HepaError::Unauthorized(Role::Admin))
        ));
    }

    #[test]
    fn test_terminate_only_clears_matching_role() {
        let sessions = SessionManager::new();
        let token = sessions.establish(patient(), None).expect("Should establish");

        assert!(!sessions
            .terminate(Some(&token), Role::Admin)
            .expect("Should not fail"));
        assert_eq!(sessions.current(Some(&token)).expect("current"), patient());

        assert!(sessions
            .terminate(Some(&token), Role::Patient)
            .expect("Should clear"));
        assert_eq!(
            sessions.current(Some(&token)).expect("current"),
            Identity::Anonymous
        );

        assert!(!sessions
            .terminate(Some(&token), Role::Patient)
            .expect("Should be idempotent"));
        assert_eq!(sessions.len().expect("len"), 0);
    }

    #[test]
    fn test_revoke_patient_drops_only_that_phone() {
        let sessions = SessionManager::new();
        let a = sessions.establish(patient(), None).expect("Should establish");
        let b = sessions.establish(patient(), None).expect("Should establish");
        let other = sessions
            .establish(
                Identity::Patient {
                    phone: "555-0101".into(),
                    name: "Bob".into(),
                },
                None,
            )
            .expect("Should establish");
        let admin_token = sessions.establish(admin(), None).expect("Should establish");

        assert_eq!(sessions.revoke_patient("555-0100").expect("revoke"), 2);
        for token in [&a, &b] {
            assert_eq!(
                sessions.current(Some(token)).expect("current"),
                Identity::Anonymous
            );
        }
        assert_eq!(
            sessions.require(Some(&other), Role::Patient).expect("kept").display_name(),
            "Bob"
        );
        assert!(sessions.require(Some(&admin_token), Role::Admin).is_ok());
        assert_eq!(sessions.revoke_patient("555-0100").expect("revoke"), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let sessions = SessionManager::with_capacity(2);
        let first = sessions.establish(patient(), None).expect("Should establish");
        let second = sessions.establish(admin(), None).expect("Should establish");
        let third = sessions.establish(patient(), None).expect("Should establish");

        assert_eq!(sessions.len().expect("len"), 2);
        assert_eq!(
            sessions.current(Some(&first)).expect("current"),
            Identity::Anonymous
        );
        assert_eq!(sessions.current(Some(&second)).expect("current"), admin());
        assert_eq!(sessions.current(Some(&third)).expect("current"), patient());
    }

    #[test]
    fn test_logged_out_tokens_do_not_count_toward_capacity() {
        let sessions = SessionManager::with_capacity(2);
        let kept = sessions.establish(admin(), None).expect("Should establish");
        for _ in 0..5 {
            let t = sessions.establish(patient(), None).expect("Should establish");
            sessions
                .terminate(Some(&t), Role::Patient)
                .expect("Should clear");
        }
        assert_eq!(sessions.current(Some(&kept)).expect("current"), admin());
    }
}
