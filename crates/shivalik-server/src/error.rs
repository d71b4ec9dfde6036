use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shivalik_shared::ErrorKind;
use shivalik_store::StoreError;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Upload too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Media storage error: {0}")]
    Media(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Store(e) => e.kind(),
            ServerError::BadRequest(_) | ServerError::TooLarge { .. } => ErrorKind::Validation,
            ServerError::NotFound(_) => ErrorKind::NotFound,
            ServerError::Media(_) | ServerError::Internal(_) => ErrorKind::Internal,
        }
    }

    fn status(&self) -> StatusCode {
        if let ServerError::TooLarge { .. } = self {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        match self.kind() {
            ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.kind() {
            ErrorKind::Transient => {
                warn!(error = %self, "store busy");
                "Service temporarily unavailable, retry later".to_string()
            }
            ErrorKind::Internal => {
                warn!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            _ => {
                debug!(error = %self, status = status.as_u16(), "request rejected");
                self.to_string()
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
