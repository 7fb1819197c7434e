// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hugging Face hosted inference endpoint
//!
//! Sends the formatted prompt to `{base_url}/{repo_id}` as a
//! text-generation request capped at `max_new_tokens`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::provider::{CompletionError, CompletionProvider};

pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_REPO_ID: &str = "mistralai/Mistral-7B-Instruct-v0.3";
pub const DEFAULT_TOKEN_ENV: &str = "HF_TOKEN";
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

/// Hugging Face text-generation client
pub struct HuggingFaceEndpoint {
    client: Client,
    base_url: String,
    repo_id: String,
    token: Option<String>,
    token_env: String,
    max_new_tokens: u32,
}

impl HuggingFaceEndpoint {
    /// Create a client
    ///
    /// A missing token is accepted here and reported on the first request.
    pub fn new(
        base_url: impl Into<String>,
        repo_id: impl Into<String>,
        token: Option<String>,
        max_new_tokens: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            repo_id: repo_id.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            max_new_tokens,
        }
    }

    /// Read the token from an environment variable
    pub fn from_env(
        base_url: impl Into<String>,
        repo_id: impl Into<String>,
        token_env: &str,
        max_new_tokens: u32,
    ) -> Self {
        let mut endpoint = Self::new(
            base_url,
            repo_id,
            std::env::var(token_env).ok(),
            max_new_tokens,
        );
        endpoint.token_env = token_env.to_string();
        endpoint
    }

    /// Bound each request; by default requests have no client-side timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, CompletionError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Unavailable {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(self)
    }

    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.repo_id.trim_start_matches('/')
        )
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl CompletionProvider for HuggingFaceEndpoint {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| CompletionError::MissingToken {
                env_var: self.token_env.clone(),
            })?;

        let body = GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens: self.max_new_tokens,
                return_full_text: false,
            },
        };

        debug!(
            "Sending {} prompt chars to {}",
            prompt.chars().count(),
            self.repo_id
        );

        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Unavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, provider_message(&raw)));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| CompletionError::Unavailable {
                message: e.to_string(),
            })?;

        parse_generated_text(&raw)
    }

    fn model_id(&self) -> &str {
        &self.repo_id
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Batch(Vec<Generation>),
    Single(Generation),
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorField,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderErrorField {
    One(String),
    Many(Vec<String>),
}

/// Extract the `error` field of a provider error body, or the raw text
fn provider_message(raw: &str) -> String {
    match serde_json::from_str::<ProviderErrorBody>(raw) {
        Ok(ProviderErrorBody {
            error: ProviderErrorField::One(message),
        }) => message,
        Ok(ProviderErrorBody {
            error: ProviderErrorField::Many(messages),
        }) => messages.join("; "),
        Err(_) => raw.trim().to_string(),
    }
}

/// Map an HTTP failure onto the completion error taxonomy
fn classify_failure(status: StatusCode, message: String) -> CompletionError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Unauthorized {
            status: code,
            message,
        },
        StatusCode::PAYLOAD_TOO_LARGE => CompletionError::PayloadTooLarge {
            status: code,
            message,
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
            if mentions_input_length(&message) =>
        {
            CompletionError::PayloadTooLarge {
                status: code,
                message,
            }
        }
        StatusCode::TOO_MANY_REQUESTS => CompletionError::Unavailable {
            message: format!("{} - {}", code, message),
        },
        s if s.is_server_error() => CompletionError::Unavailable {
            message: format!("{} - {}", code, message),
        },
        _ => CompletionError::Api {
            status: code,
            message,
        },
    }
}

fn mentions_input_length(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["too long", "too large", "max_new_tokens", "maximum context", "input tokens"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn parse_generated_text(raw: &str) -> Result<String, CompletionError> {
    let parsed: GenerationResponse = serde_json::from_str(raw)
        .map_err(|e| CompletionError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    match parsed {
        GenerationResponse::Single(generation) => Ok(generation.generated_text),
        GenerationResponse::Batch(generations) => generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| CompletionError::InvalidResponse("empty generation list".to_string())),
    }
}
