// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text embedding backends
//!
//! - `OnnxEmbeddingModel`: all-MiniLM-L6-v2 through ONNX Runtime
//! - `HashingEmbedder`: deterministic lexical embedder, no model files needed

pub mod hashing;
pub mod onnx_model;

pub use hashing::HashingEmbedder;
pub use onnx_model::OnnxEmbeddingModel;

use anyhow::Result;
use async_trait::async_trait;

/// Output dimension of all-MiniLM-L6-v2
pub const MINILM_DIMENSION: usize = 384;

/// Name recorded in index manifests built with the ONNX model
pub const MINILM_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Converts text into fixed-length vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Length of every produced vector
    fn dimension(&self) -> usize;

    /// Identifier stored alongside indexes built with this provider
    fn model_name(&self) -> &str;
}

/// L2-normalize in place; zero vectors are left untouched
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
