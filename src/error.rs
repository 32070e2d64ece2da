//! Request-scoped error taxonomy and its HTTP mapping.
//!
//! Three kinds cover the whole pipeline: `NotLoggedIn` (no cookie, or the
//! validator says the session is dead — the two are deliberately
//! indistinguishable to the caller), `RealmRejected`, and `Upstream`
//! (validator transport/decode trouble, validator-reported errors, and
//! directory failures, all embedding the upstream text verbatim).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("Access denied. Realm {0} is not permitted.")]
    RealmRejected(String),
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            ApiError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            ApiError::RealmRejected(_) => StatusCode::FORBIDDEN,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        (status, Json(json!({"status": "error", "message": self.to_string()}))).into_response()
    }
}
