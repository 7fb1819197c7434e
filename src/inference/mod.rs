// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Hosted text generation and prompt formatting

pub mod huggingface;
pub mod prompt;
pub mod provider;

pub use huggingface::{
    HuggingFaceEndpoint, DEFAULT_INFERENCE_URL, DEFAULT_MAX_NEW_TOKENS, DEFAULT_REPO_ID,
    DEFAULT_TOKEN_ENV,
};
pub use prompt::{PromptRequest, PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
pub use provider::{CompletionError, CompletionProvider};
