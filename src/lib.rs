//! # hepascreen
//!
//! Multi-role web service for liver-disease risk screening.
//!
//! Patients register and submit nine lab values that a pre-trained
//! classifier labels; doctors review every submission; one administrator
//! manages doctor accounts and purges patients along with their history.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (accounts, identities, features, records)
//! - `ports`: Trait definitions for storage and the classifier
//! - `adapters`: Concrete implementations (SQLite, JSON model, log sanitizer)
//! - `application`: Use cases orchestrating domain and ports
//! - `web`: axum router and JSON handlers

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod web;

pub use config::Config;
pub use domain::{Identity, LiverFeatures, PredictionLabel, PredictionRecord, Role};

/// Result type for hepascreen operations
pub type Result<T> = std::result::Result<T, HepaError>;

/// Main error type for hepascreen
#[derive(Debug, thiserror::Error)]
pub enum HepaError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    Authentication,

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0} session required")]
    Unauthorized(Role),

    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] ports::ModelError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] ports::StorageError),

    #[error("Credential operation failed: {0}")]
    Credential(#[from] domain::CredentialError),

    #[error("Session lock poisoned")]
    SessionLock,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
