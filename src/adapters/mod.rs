//! Adapters layer: Concrete implementations of ports.
//!
//! - `sqlite`: in-memory SQLite tables for accounts and the history ledger
//! - `model`: JSON logistic-regression classifier with signed-manifest checks
//! - `sanitize`: PII filtering for logs

pub mod model;
pub mod sanitize;
pub mod sqlite;
