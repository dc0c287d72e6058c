//! Runtime configuration read from `HEPASCREEN_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::adapters::model::ModelLoadOptions;
use crate::ports::ModelError;

pub const BIND_ADDR_ENV: &str = "HEPASCREEN_BIND_ADDR";
pub const MODEL_PATH_ENV: &str = "HEPASCREEN_MODEL_PATH";
pub const ADMIN_USERNAME_ENV: &str = "HEPASCREEN_ADMIN_USERNAME";
pub const ADMIN_PASSWORD_ENV: &str = "HEPASCREEN_ADMIN_PASSWORD";
pub const REQUIRE_SIGNED_MODEL_ENV: &str = "HEPASCREEN_REQUIRE_SIGNED_MODEL";
pub const MODEL_PUBKEY_FILE_ENV: &str = "HEPASCREEN_MODEL_PUBKEY_B64_FILE";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_MODEL_PATH: &str = "models/liver_model.json";
const DEFAULT_ADMIN: &str = "admin";

/// Errors in configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    BindAddr { var: &'static str, value: String },

    #[error("Failed reading model public key file: {0}")]
    PublicKeyFile(#[from] std::io::Error),

    #[error(transparent)]
    PublicKey(#[from] ModelError),
}

/// Fixed administrator credentials.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: DEFAULT_ADMIN.to_string(),
            password: Zeroizing::new(DEFAULT_ADMIN.to_string()),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub admin: AdminCredentials,
    pub model: ModelLoadOptions,
}

/// Truthy values: `1`, `true`, `TRUE`, `yes`, `YES`.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns error if a present variable holds an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns error if a present variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_value = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_value
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::BindAddr {
                var: BIND_ADDR_ENV,
                value: bind_value.clone(),
            })?;

        let model_path = lookup(MODEL_PATH_ENV)
            .map(|v| PathBuf::from(v.trim()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));

        let mut admin = AdminCredentials::default();
        if let Some(username) = lookup(ADMIN_USERNAME_ENV) {
            if !username.trim().is_empty() {
                admin.username = username.trim().to_string();
            }
        }
        if let Some(password) = lookup(ADMIN_PASSWORD_ENV) {
            if !password.is_empty() {
                admin.password = Zeroizing::new(password);
            }
        }

        let require_signature = lookup(REQUIRE_SIGNED_MODEL_ENV)
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let verifying_key = match lookup(MODEL_PUBKEY_FILE_ENV) {
            Some(path) => {
                let b64 = Zeroizing::new(std::fs::read_to_string(path.trim())?);
                Some(ModelLoadOptions::verifying_key_from_b64(&b64)?)
            }
            None => None,
        };

        Ok(Self {
            bind_addr,
            model_path,
            admin,
            model: ModelLoadOptions {
                require_signature,
                verifying_key,
            },
        })
    }
}
