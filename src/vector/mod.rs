// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pre-built document index and nearest-neighbour retrieval

pub mod hnsw;
pub mod ingest;
pub mod store;

pub use hnsw::{HnswIndex, IndexHit};
pub use ingest::{build_store, load_chunks, split_text, ChunkConfig, SourceChunk};
pub use store::{IndexLoadOptions, IndexManifest, StoredDocument, VectorStore};

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// A passage returned for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

impl RetrievedDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
            score: 0.0,
        }
    }
}

/// Errors raised while loading or searching an index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector index not found at path: {path}")]
    NotFound { path: String },

    #[error("Refusing to deserialize {path}: loading requires allow_dangerous_deserialization (only enable it for artifacts from a trusted pipeline)")]
    UntrustedArtifact { path: String },

    #[error("Failed to parse index manifest: {0}")]
    ManifestParse(String),

    #[error("Unsupported index format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Index payload checksum mismatch: {path}")]
    ChecksumMismatch { path: String },

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    #[error("Dimension mismatch: expected {expected}D, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Failed to build index: {0}")]
    Build(String),

    #[error("Index search failed: {0}")]
    Search(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Nearest-neighbour lookup over embedded documents
pub trait DocumentRetriever: Send + Sync {
    /// Up to `k` documents most similar to `query`, best first
    fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedDocument>, IndexError>;

    fn document_count(&self) -> usize;
}
