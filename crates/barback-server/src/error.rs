//! API error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error surfaced to HTTP callers
#[derive(Debug)]
pub enum ApiError {
    /// Caller failed the authorization gate
    Unauthorized,
    /// Malformed or incomplete request
    BadRequest(String),
    /// Failure from the session/orchestration layer
    Core(barback::Error),
}

impl From<barback::Error> for ApiError {
    fn from(err: barback::Error) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Core(err) => {
                let status = match &err {
                    barback::Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
                    barback::Error::OperationInProgress(_) => StatusCode::CONFLICT,
                    barback::Error::Transport(_) if err.is_connect_failure() => {
                        StatusCode::BAD_GATEWAY
                    }
                    barback::Error::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barback_ssh::TransportError;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(ApiError::BadRequest("missing credentials".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Core(barback::Error::SessionNotFound("x".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Core(barback::Error::OperationInProgress("x".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Core(TransportError::ConnectTimeout.into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ApiError::Core(TransportError::NotConnected.into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
