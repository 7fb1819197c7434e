// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Question -> embed -> retrieve -> prompt -> complete -> assistant turn
//!
//! Every stage failure aborts the query with a `PipelineError`; nothing is
//! retried and no partial answer is produced.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::context::RagContext;
use super::errors::PipelineError;
use super::policy::SourcePolicy;
use super::render::{compose_reply, truncate_snippet, SNIPPET_MAX_CHARS};
use super::session::ChatTurn;
use crate::inference::{PromptRequest, PromptTemplate};
use crate::vector::RetrievedDocument;

pub const DEFAULT_TOP_K: usize = 3;

/// Tunables of the query pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub snippet_max_chars: usize,
    pub template: PromptTemplate,
    pub policy: SourcePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            snippet_max_chars: SNIPPET_MAX_CHARS,
            template: PromptTemplate::default(),
            policy: SourcePolicy::default(),
        }
    }
}

/// Raw result of one completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub answer_text: String,
    pub source_documents: Vec<RetrievedDocument>,
}

/// Post-processed answer, ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub response: CompletionResponse,
    /// Truncated snippets to display; empty when the policy hides sources
    pub snippets: Vec<String>,
}

impl AnswerOutcome {
    pub fn answer(&self) -> &str {
        &self.response.answer_text
    }

    pub fn shows_sources(&self) -> bool {
        !self.snippets.is_empty()
    }

    /// Markup stored in the assistant turn
    pub fn to_html(&self) -> String {
        compose_reply(&self.response.answer_text, &self.snippets)
    }

    pub fn into_turn(self) -> ChatTurn {
        ChatTurn::assistant(self.to_html())
    }
}

/// Orchestrates one query against the shared resource context
pub struct QueryPipeline {
    context: Arc<RagContext>,
    settings: PipelineSettings,
}

impl QueryPipeline {
    pub fn new(context: Arc<RagContext>, settings: PipelineSettings) -> Self {
        Self { context, settings }
    }

    pub fn context(&self) -> &Arc<RagContext> {
        &self.context
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the pipeline and return the assistant turn to append
    pub async fn answer(&self, question: &str) -> Result<ChatTurn, PipelineError> {
        Ok(self.run(question).await?.into_turn())
    }

    /// Run the pipeline and return the structured outcome
    pub async fn run(&self, question: &str) -> Result<AnswerOutcome, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let started = Instant::now();

        let embedder = self.context.embedder().await?;
        let query_vector = embedder.embed(question).await.map_err(|e| {
            PipelineError::ProviderUnavailable(format!("Embedding failed: {:#}", e))
        })?;
        debug!("Embedded question into {} dimensions", query_vector.len());

        let retriever = self.context.retriever().await?;
        let documents = retriever
            .retrieve(&query_vector, self.settings.top_k)
            .map_err(|e| PipelineError::Unknown(format!("Retrieval failed: {}", e)))?;
        debug!("Retrieved {} documents", documents.len());

        let request = PromptRequest::new(documents.iter().map(|d| d.text.as_str()), question);
        let prompt = self.settings.template.format(&request);
        debug!("Formatted prompt of {} characters", prompt.chars().count());

        let completion = self.context.completion();
        let generated = completion.complete(&prompt).await?;

        let response = CompletionResponse {
            answer_text: generated.trim().to_string(),
            source_documents: documents,
        };
        let outcome = self.post_process(response);

        info!(
            "Answered with {} in {:?} (sources shown: {})",
            completion.model_id(),
            started.elapsed(),
            outcome.shows_sources()
        );
        Ok(outcome)
    }

    /// Apply the source policy and snippet truncation
    pub fn post_process(&self, response: CompletionResponse) -> AnswerOutcome {
        let snippets = if self
            .settings
            .policy
            .should_show_sources(&response.answer_text, response.source_documents.len())
        {
            response
                .source_documents
                .iter()
                .map(|doc| truncate_snippet(&doc.text, self.settings.snippet_max_chars))
                .collect()
        } else {
            Vec::new()
        };

        AnswerOutcome { response, snippets }
    }
}
