use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use essence_core::RecipeError;
use serde::Serialize;
use tracing::warn;

/// Body of every non-2xx answer.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Stable error code, e.g. `E1101`.
    pub error: &'static str,
    pub message: String,
    pub status: u16,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

/// A [`RecipeError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ProxyError(pub RecipeError);

impl From<RecipeError> for ProxyError {
    fn from(err: RecipeError) -> Self {
        Self(err)
    }
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[must_use]
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.0.code().code(),
            message: self.0.to_string(),
            status: self.status().as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(code = %self.0.code(), error = %self.0, "proxy request failed");
        }
        (status, Json(self.envelope())).into_response()
    }
}
