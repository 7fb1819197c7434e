// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod inference;
pub mod rag;
pub mod vector;
pub mod version;

pub use config::AppConfig;
pub use embeddings::{EmbeddingProvider, HashingEmbedder, OnnxEmbeddingModel};
pub use inference::{CompletionError, CompletionProvider, HuggingFaceEndpoint};
pub use rag::{
    AnswerOutcome, ChatRole, ChatSession, ChatTurn, PipelineError, PipelineSettings,
    QueryPipeline, RagContext,
};
pub use vector::{DocumentRetriever, IndexError, RetrievedDocument, VectorStore};
