use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use snapmatch_core::IdentityError;
use thiserror::Error;

use crate::service::ServiceError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("malformed upload: {0}")]
    Multipart(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Identity(_) => StatusCode::UNAUTHORIZED,
            ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(e) => match e {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Storage(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Repository(_) | ServiceError::Qr(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "The request could not be completed. Please try again.".to_string()
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
