// Mapping of domain errors onto HTTP responses
use crate::domain::report::ScopeError;
use crate::domain::widget::WidgetError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Widget(#[from] WidgetError),
    #[error("invalid report scope: {0}")]
    Scope(#[from] ScopeError),
    #[error("malformed request body: {0}")]
    Body(#[from] JsonRejection),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Widget(WidgetError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Widget(WidgetError::Duplicate(_)) => StatusCode::CONFLICT,
            ApiError::Widget(WidgetError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Scope(_) => StatusCode::BAD_REQUEST,
            ApiError::Body(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!("Request failed with {}: {}", status, self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
