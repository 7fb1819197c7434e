// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt template with `{context}` and `{question}` slots
//!
//! The template is formatted once per query. Nothing is truncated: an
//! oversized context goes to the completion provider as-is.

use serde::{Deserialize, Serialize};

/// Default template instructing the model to stay inside the retrieved context
pub const DEFAULT_PROMPT_TEMPLATE: &str = "
Use the pieces of information provided in the context to answer user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
Don't provide anything out of the given context.

Context: {context}
Question: {question}

Start the answer directly. No small talk please.
";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// Separator placed between retrieved passages in the context slot
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Values substituted into the template for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub context: String,
    pub question: String,
}

impl PromptRequest {
    /// Build a request by concatenating passage texts into the context
    pub fn new<'a>(passages: impl IntoIterator<Item = &'a str>, question: &str) -> Self {
        let context = passages.into_iter().collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
        Self {
            context,
            question: question.to_string(),
        }
    }
}

/// Static prompt template with two named slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Whether both slots appear in the template
    pub fn has_slots(&self) -> bool {
        self.template.contains(CONTEXT_SLOT) && self.template.contains(QUESTION_SLOT)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute both slots
    ///
    /// Slots are located in the template only; substituted text is never
    /// rescanned, so passages containing a literal `{question}` stay intact.
    pub fn format(&self, request: &PromptRequest) -> String {
        let mut out = String::with_capacity(
            self.template.len() + request.context.len() + request.question.len(),
        );
        let mut rest = self.template.as_str();

        loop {
            let next_context = rest.find(CONTEXT_SLOT);
            let next_question = rest.find(QUESTION_SLOT);
            let (pos, slot, value) = match (next_context, next_question) {
                (Some(c), Some(q)) if c < q => (c, CONTEXT_SLOT, &request.context),
                (Some(c), None) => (c, CONTEXT_SLOT, &request.context),
                (_, Some(q)) => (q, QUESTION_SLOT, &request.question),
                (None, None) => break,
            };
            out.push_str(&rest[..pos]);
            out.push_str(value);
            rest = &rest[pos + slot.len()..];
        }

        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TEMPLATE)
    }
}
