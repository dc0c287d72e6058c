//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod accounts;
mod screening;
mod session;

pub use accounts::{AccountService, AdminDashboard, PatientRemoval};
pub use screening::{ScreeningOutcome, ScreeningService};
pub use session::SessionManager;
