use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required field: {0}")]
    Validation(String),

    #[error("server configuration error: {0}")]
    Configuration(String),

    #[error("failed to authenticate with the sheet API: {0}")]
    Authentication(String),

    #[error("authorization provider returned an error: {0}")]
    Provider(String),

    #[error("anti-forgery token mismatch")]
    CsrfMismatch,

    #[error("malformed response from authorization provider: {0}")]
    MalformedProvider(String),

    #[error("timed out waiting for authorization to complete; visit {auth_url} to grant access")]
    AuthorizationTimeout { auth_url: String },

    #[error("a vote for this feature from this identity already exists")]
    DuplicateVote,

    #[error("backing store failure: {0}")]
    Persistence(String),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::Validation(field) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_required_field",
                format!("missing required field: {}", field),
            ),
            AppError::Configuration(e) => {
                tracing::error!("configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "server_misconfigured",
                    "server configuration error".to_string(),
                )
            }
            AppError::Authentication(e) => {
                tracing::error!("authentication failed: {}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "authentication_error",
                    "token_acquisition_failed",
                    "failed to authenticate with the backing store".to_string(),
                )
            }
            AppError::Provider(e) => (
                StatusCode::BAD_REQUEST,
                "authorization_flow_error",
                "provider_error",
                format!("authorization provider error: {}", e),
            ),
            AppError::CsrfMismatch => (
                StatusCode::FORBIDDEN,
                "authorization_flow_error",
                "csrf_mismatch",
                "anti-forgery token mismatch".to_string(),
            ),
            AppError::MalformedProvider(e) => {
                tracing::error!("malformed provider response: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "authorization_flow_error",
                    "malformed_provider_response",
                    "invalid token data received from the provider".to_string(),
                )
            }
            AppError::AuthorizationTimeout { auth_url } => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout_error",
                "authorization_timeout",
                format!(
                    "authorization did not complete in time; grant access at {} and retry",
                    auth_url
                ),
            ),
            AppError::DuplicateVote => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "duplicate_vote",
                "a vote for this feature from this identity already exists".to_string(),
            ),
            AppError::Persistence(e) => {
                tracing::error!("persistence failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_error",
                    "backing_store_failed",
                    "backing store request failed".to_string(),
                )
            }
            AppError::Cache(e) => {
                tracing::error!("redis error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "cache_unavailable",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status_of(AppError::Validation("title".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn csrf_mismatch_maps_to_403() {
        assert_eq!(status_of(AppError::CsrfMismatch), StatusCode::FORBIDDEN);
    }

    #[test]
    fn duplicate_vote_maps_to_409() {
        assert_eq!(status_of(AppError::DuplicateVote), StatusCode::CONFLICT);
    }

    #[test]
    fn timeout_maps_to_504() {
        let err = AppError::AuthorizationTimeout {
            auth_url: "https://example.com/auth".into(),
        };
        assert_eq!(status_of(err), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn malformed_provider_maps_to_500() {
        assert_eq!(
            status_of(AppError::MalformedProvider("no access_token".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
