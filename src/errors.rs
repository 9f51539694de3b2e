use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::users::repo::StoreError;

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    /// Body missing, not JSON, or not the expected shape.
    #[error("invalid request body: {0}")]
    MalformedBody(String),
    /// Duplicate identity. Reported as 400 to match the registration contract.
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Unauthorized {
        message: &'static str,
        detail: Option<String>,
    },
    #[error("authentication failed: {0}")]
    Provider(String),
    #[error("{message}: {source}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn unauthorized(message: &'static str) -> Self {
        ApiError::Unauthorized {
            message,
            detail: None,
        }
    }

    /// Adapter for `map_err`: wraps any error under a fixed client-facing message.
    pub fn internal<E: Into<anyhow::Error>>(message: &'static str) -> impl FnOnce(E) -> ApiError {
        move |e| ApiError::Internal {
            message,
            source: e.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict(_) | ApiError::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Provider(_) | ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(_) => ApiError::Conflict("User already exists".into()),
            StoreError::Other(source) => ApiError::Internal {
                message: "Database error",
                source,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message) | ApiError::Conflict(message) => ErrorBody {
                message,
                error: None,
            },
            ApiError::MalformedBody(detail) => ErrorBody {
                message: "Invalid request body".into(),
                error: Some(detail),
            },
            ApiError::Unauthorized { message, detail } => ErrorBody {
                message: message.into(),
                error: detail,
            },
            ApiError::Provider(detail) => {
                error!(error = %detail, "identity provider failure");
                ErrorBody {
                    message: "Authentication failed".into(),
                    error: Some(detail),
                }
            }
            ApiError::Internal { message, source } => {
                error!(error = ?source, "{message}");
                ErrorBody {
                    message: message.into(),
                    error: Some(source.to_string()),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}
