//! Mapping of broker errors onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gpubroker_core::BrokerError;
use tracing::error;

/// A broker error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub BrokerError);

impl ApiError {
    /// HTTP status for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BrokerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BrokerError::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            BrokerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            BrokerError::Config(_) | BrokerError::Io(_) | BrokerError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "Request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}
