// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the question-answering pipeline
//!
//! Every failure of a single query ends up as one of these variants:
//! - Provider errors (embedding or completion endpoint unreachable)
//! - Credential errors (missing or rejected API token)
//! - Index errors (artifact missing, refused or corrupt)
//! - Request errors (prompt rejected as too large)
//!
//! Errors are never retried automatically.

use thiserror::Error;

use crate::inference::CompletionError;
use crate::vector::IndexError;

/// Errors that can occur while answering one question
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Question was empty or whitespace only
    #[error("Question is empty")]
    EmptyQuestion,

    /// Embedding or completion provider could not be reached
    #[error("{0}")]
    ProviderUnavailable(String),

    /// API token missing or rejected by the completion provider
    #[error("{0}")]
    AuthMissing(String),

    /// Vector index could not be loaded
    #[error("{0}")]
    IndexLoadFailed(String),

    /// Prompt rejected by the completion provider as too large
    #[error("{0}")]
    RequestTooLarge(String),

    /// Anything else
    #[error("{0}")]
    Unknown(String),
}

impl PipelineError {
    /// Generic user-facing message carrying the raw cause text
    pub fn user_message(&self) -> String {
        format!("Error: {}", self)
    }

    /// Get error code for logging and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuestion => "EMPTY_QUESTION",
            PipelineError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            PipelineError::AuthMissing(_) => "AUTH_MISSING",
            PipelineError::IndexLoadFailed(_) => "INDEX_LOAD_FAILED",
            PipelineError::RequestTooLarge(_) => "REQUEST_TOO_LARGE",
            PipelineError::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<CompletionError> for PipelineError {
    fn from(err: CompletionError) -> Self {
        let message = err.to_string();
        match err {
            CompletionError::MissingToken { .. } | CompletionError::Unauthorized { .. } => {
                PipelineError::AuthMissing(message)
            }
            CompletionError::PayloadTooLarge { .. } => PipelineError::RequestTooLarge(message),
            CompletionError::Unavailable { .. } => PipelineError::ProviderUnavailable(message),
            CompletionError::Api { .. } | CompletionError::InvalidResponse(_) => {
                PipelineError::Unknown(message)
            }
        }
    }
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        PipelineError::IndexLoadFailed(err.to_string())
    }
}
