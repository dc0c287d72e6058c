//! Request extractors whose rejections use the crate's notice body.

use axum::{
    async_trait,
    extract::{rejection::FormRejection, FromRequest, Request},
    Form,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// `Form<T>` whose rejection is an `ApiError`, so a missing or wrong
/// content type still gets a JSON `notice` instead of axum's plain text.
#[derive(Debug)]
pub struct ValidForm<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected form body");
        Self::bad_request("Invalid form submission")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        phone: String,
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .body(Body::from("phone=555-0100"))
            .expect("Should build request");

        let err = ValidForm::<Login>::from_request(req, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.notice.message, "Invalid form submission");
    }

    #[tokio::test]
    async fn test_urlencoded_body_is_accepted() {
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("phone=555-0100"))
            .expect("Should build request");

        let ValidForm(login) = ValidForm::<Login>::from_request(req, &())
            .await
            .expect("Should parse");
        assert_eq!(login.phone, "555-0100");
    }
}
