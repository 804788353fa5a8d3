use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use streampad_core::StoreError;
use thiserror::Error;

/// Error returned by the HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Reserved")]
    Reserved,
    #[error("Invalid page name '{0}'")]
    InvalidPage(String),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Store(#[source] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Reserved => StatusCode::FORBIDDEN,
            ApiError::InvalidPage(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ReservedPage(_) => ApiError::Reserved,
            StoreError::InvalidPageName(name) => ApiError::InvalidPage(name),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_status() {
        let reserved: ApiError = StoreError::ReservedPage("api".into()).into();
        assert_eq!(reserved.status(), StatusCode::FORBIDDEN);
        assert_eq!(reserved.to_string(), "Reserved");

        let invalid: ApiError = StoreError::InvalidPageName("../x".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let io: ApiError = StoreError::Io {
            path: "home.json".into(),
            source: std::io::Error::other("disk full"),
        }
        .into();
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
