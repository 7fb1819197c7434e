// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) question answering
// Pipeline, session transcript and answer post-processing; no UI dependency

pub mod context;
pub mod errors;
pub mod pipeline;
pub mod policy;
pub mod render;
pub mod session;

pub use context::{DiskResourceLoader, RagContext, ResourceLoader};
pub use errors::PipelineError;
pub use pipeline::{AnswerOutcome, CompletionResponse, PipelineSettings, QueryPipeline};
pub use policy::SourcePolicy;
pub use session::{ChatRole, ChatSession, ChatTurn};
