// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat session state: an append-only transcript kept in process memory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::errors::PipelineError;
use super::pipeline::{AnswerOutcome, QueryPipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of the conversation; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    role: ChatRole,
    content: String,
    created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered transcript of one interactive session
///
/// Turns are only ever appended; nothing is reordered, merged or removed.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Submit a question
    ///
    /// - Blank input: nothing is appended and the pipeline is not run
    ///   (`Ok(None)`).
    /// - Success: the user turn and the assistant turn are appended, in that
    ///   order, and the assistant turn is returned.
    /// - Failure: only the user turn stays; the error is returned for
    ///   transient display and is not stored.
    pub async fn submit(
        &mut self,
        pipeline: &QueryPipeline,
        question: &str,
    ) -> Result<Option<ChatTurn>, PipelineError> {
        Ok(self
            .submit_with_outcome(pipeline, question)
            .await?
            .map(|(turn, _)| turn))
    }

    /// Same as `submit`, also returning the structured outcome behind the turn
    pub async fn submit_with_outcome(
        &mut self,
        pipeline: &QueryPipeline,
        question: &str,
    ) -> Result<Option<(ChatTurn, AnswerOutcome)>, PipelineError> {
        if question.trim().is_empty() {
            return Ok(None);
        }

        self.push(ChatTurn::user(question));

        match pipeline.run(question).await {
            Ok(outcome) => {
                let turn = ChatTurn::assistant(outcome.to_html());
                self.push(turn.clone());
                info!("Session now holds {} turns", self.turns.len());
                Ok(Some((turn, outcome)))
            }
            Err(e) => {
                warn!("Query failed [{}]: {}", e.error_code(), e);
                Err(e)
            }
        }
    }
}
