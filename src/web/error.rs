//! Flash-style notices and the HTTP error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::Role;
use crate::HepaError;

/// Notice severity, mirroring the usual alert classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Info,
    Warning,
    Danger,
}

/// User-visible message carried by every response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub category: Category,
    pub message: String,
    /// Where a browser client should go next, if anywhere.
    pub redirect: Option<String>,
}

impl Notice {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            redirect: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Category::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Category::Info, message)
    }

    #[must_use]
    pub fn redirect(mut self, path: &str) -> Self {
        self.redirect = Some(path.to_string());
        self
    }
}

#[derive(Serialize)]
struct ErrorBody {
    notice: Notice,
}

/// Error response: a status code plus the notice to show.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub notice: Notice,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn new(status: StatusCode, category: Category, message: impl Into<String>) -> Self {
        Self {
            status,
            notice: Notice::new(category, message),
        }
    }

    pub(super) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Category::Danger, message)
    }

    /// Point the client at a form to retry, unless a redirect is already set.
    #[must_use]
    pub fn or_redirect(mut self, path: &str) -> Self {
        if self.notice.redirect.is_none() {
            self.notice.redirect = Some(path.to_string());
        }
        self
    }
}

fn unauthorized_message(role: Role) -> &'static str {
    match role {
        Role::Patient | Role::Doctor => "Please login first",
        Role::Admin => "Admin access required",
    }
}

impl From<HepaError> for ApiError {
    fn from(err: HepaError) -> Self {
        match err {
            HepaError::Validation(message) => Self::bad_request(message),
            HepaError::Authentication => Self::new(
                StatusCode::UNAUTHORIZED,
                Category::Danger,
                "Invalid credentials",
            ),
            HepaError::DuplicateKey(message) => {
                Self::new(StatusCode::CONFLICT, Category::Warning, message)
            }
            HepaError::Unauthorized(role) => Self::new(
                StatusCode::UNAUTHORIZED,
                Category::Warning,
                unauthorized_message(role),
            )
            .or_redirect(role.login_path()),
            HepaError::ModelUnavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                Category::Danger,
                "Model not loaded.",
            ),
            other => {
                tracing::error!(error = %other, "Request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Category::Danger,
                    "Something went wrong. Please try again.",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { notice: self.notice })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::StorageError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (HepaError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (HepaError::Authentication, StatusCode::UNAUTHORIZED),
            (HepaError::DuplicateKey("dup".into()), StatusCode::CONFLICT),
            (
                HepaError::Unauthorized(Role::Admin),
                StatusCode::UNAUTHORIZED,
            ),
            (
                HepaError::ModelUnavailable("gone".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                HepaError::Storage(StorageError::LockPoisoned),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_unauthorized_redirects_to_role_login() {
        let err = ApiError::from(HepaError::Unauthorized(Role::Doctor)).or_redirect("/ignored");
        assert_eq!(err.notice.redirect.as_deref(), Some("/doctor-login"));
        assert_eq!(err.notice.category, Category::Warning);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = ApiError::from(HepaError::Storage(StorageError::Serialization(
            "row 7 features column".into(),
        )));
        assert!(!err.notice.message.contains("row 7"));
    }
}
