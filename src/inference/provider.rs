// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Completion provider trait definition

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a completion provider
#[derive(Debug, Error)]
pub enum CompletionError {
    /// No API token configured; raised when a request is attempted
    #[error("No API token configured (set {env_var})")]
    MissingToken {
        /// Environment variable expected to hold the token
        env_var: String,
    },

    /// Provider rejected the token
    #[error("Completion provider rejected credentials: {status} - {message}")]
    Unauthorized {
        /// HTTP status code
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// Prompt too large for the model
    #[error("Prompt rejected as too large: {status} - {message}")]
    PayloadTooLarge {
        /// HTTP status code
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// Network failure, timeout, quota or server-side outage
    #[error("Completion provider unavailable: {message}")]
    Unavailable {
        /// Error message
        message: String,
    },

    /// Other API error
    #[error("Completion API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// Response body could not be understood
    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Trait for hosted text-generation endpoints
///
/// One synchronous request per call; implementations never retry.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate text for a fully formatted prompt
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Model identifier used for logging
    fn model_id(&self) -> &str;
}
