//! Mapping of domain errors onto HTTP responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bastion_auth::AuthError;
use bastion_core::error::BastionError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] BastionError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Domain(e) => match e {
                BastionError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
                BastionError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
                BastionError::NotFound { .. } => StatusCode::NOT_FOUND,
                BastionError::AlreadyExists { .. } => StatusCode::CONFLICT,
                BastionError::Validation { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Domain(e) if e.is_internal() => "internal server error".into(),
            ApiError::Domain(e) => match e {
                BastionError::AuthenticationFailed { reason }
                | BastionError::AuthorizationDenied { reason } => reason.clone(),
                BastionError::NotFound { entity, .. } => format!("{entity} not found"),
                BastionError::AlreadyExists { entity } => {
                    format!("{entity} with this username or email already exists")
                }
                BastionError::Validation { message } => message.clone(),
                _ => "internal server error".into(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let mut response = (status, Json(json!({ "detail": self.detail() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
