//! Web layer: axum router over the application services.
//!
//! Sessions travel in the `X-Session-Token` header; successful logins return
//! the token in the JSON body.

mod error;
mod extract;
mod handlers;

use std::sync::Arc;

use axum::{
    http::HeaderMap,
    routing::{get, post},
    Router,
};

use crate::adapters::sqlite::SqliteStore;
use crate::application::{AccountService, ScreeningService, SessionManager};

pub use error::{ApiError, ApiResult, Category, Notice};
pub use extract::ValidForm;

/// Request header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

const ROUTES: [&str; 13] = [
    "GET /",
    "GET,POST /register",
    "GET,POST /login",
    "GET /logout",
    "GET,POST /form",
    "GET,POST /admin-login",
    "GET /admin-dashboard",
    "GET /admin-logout",
    "GET,POST /admin/add_doctor",
    "POST /admin/delete_patient/{phone}",
    "GET,POST /doctor-login",
    "GET /doctor-dashboard",
    "GET /doctor-logout",
];

/// Services shared by every handler.
pub struct AppState {
    pub accounts: AccountService<SqliteStore>,
    pub screening: ScreeningService<SqliteStore>,
    pub sessions: SessionManager,
}

pub type SharedState = Arc<AppState>;

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        .route(
            "/login",
            get(handlers::login_form).post(handlers::patient_login),
        )
        .route("/logout", get(handlers::patient_logout))
        .route(
            "/form",
            get(handlers::screening_form).post(handlers::submit_screening),
        )
        .route(
            "/admin-login",
            get(handlers::admin_login_form).post(handlers::admin_login),
        )
        .route("/admin-dashboard", get(handlers::admin_dashboard))
        .route("/admin-logout", get(handlers::admin_logout))
        .route(
            "/admin/add_doctor",
            get(handlers::add_doctor_form).post(handlers::add_doctor),
        )
        .route(
            "/admin/delete_patient/:phone",
            post(handlers::delete_patient),
        )
        .route(
            "/doctor-login",
            get(handlers::doctor_login_form).post(handlers::doctor_login),
        )
        .route("/doctor-dashboard", get(handlers::doctor_dashboard))
        .route("/doctor-logout", get(handlers::doctor_logout))
        .with_state(state)
}
