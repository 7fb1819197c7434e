// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Whether an answer should be shown with its source snippets
//!
//! The decision is a plain case-insensitive substring match on refusal
//! phrases, kept here so it can be swapped without touching the pipeline.

use serde::{Deserialize, Serialize};

/// Phrases marking an answer as a refusal
pub const DEFAULT_REFUSAL_PHRASES: &[&str] = &["don't know", "does not provide"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePolicy {
    refusal_phrases: Vec<String>,
}

impl SourcePolicy {
    pub fn new(refusal_phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            refusal_phrases: refusal_phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    pub fn refusal_phrases(&self) -> &[String] {
        &self.refusal_phrases
    }

    /// True when the answer contains any refusal phrase, ignoring case
    pub fn is_refusal(&self, answer: &str) -> bool {
        let answer = answer.to_lowercase();
        self.refusal_phrases
            .iter()
            .any(|phrase| answer.contains(phrase.as_str()))
    }

    /// Sources are shown only if something was retrieved and the answer is not a refusal
    pub fn should_show_sources(&self, answer: &str, retrieved_count: usize) -> bool {
        retrieved_count > 0 && !self.is_refusal(answer)
    }
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REFUSAL_PHRASES.iter().copied())
    }
}
