// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::rag::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    Pipeline(PipelineError),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::Pipeline(err) => {
                let mut details = HashMap::new();
                details.insert(
                    "code".to_string(),
                    serde_json::Value::String(err.error_code().to_string()),
                );
                (pipeline_error_type(err), err.user_message(), Some(details))
            }
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::Pipeline(err) => match err {
                PipelineError::EmptyQuestion => 400,
                PipelineError::RequestTooLarge(_) => 413,
                PipelineError::ProviderUnavailable(_) | PipelineError::IndexLoadFailed(_) => 503,
                PipelineError::AuthMissing(_) | PipelineError::Unknown(_) => 502,
            },
        }
    }
}

fn pipeline_error_type(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::EmptyQuestion => "empty_question",
        PipelineError::ProviderUnavailable(_) => "provider_unavailable",
        PipelineError::AuthMissing(_) => "auth_missing",
        PipelineError::IndexLoadFailed(_) => "index_load_failed",
        PipelineError::RequestTooLarge(_) => "request_too_large",
        PipelineError::Unknown(_) => "unknown",
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::Pipeline(err) => write!(f, "{}", err.user_message()),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
