// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs the all-MiniLM-L6-v2 sentence transformer through ONNX Runtime.
//!
//! Features:
//! - ONNX model loading from disk (CPU execution provider)
//! - BERT tokenization with truncation
//! - Single and batch embedding generation
//! - Mean pooling over token embeddings, weighted by the attention mask
//! - L2-normalized 384-dimensional output vectors

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, ArrayView2, Axis};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::info;

use super::{normalize_in_place, EmbeddingProvider, MINILM_DIMENSION};

/// Maximum sequence length accepted by all-MiniLM-L6-v2
const MAX_SEQUENCE_LENGTH: usize = 256;

/// ONNX-based embedding model (all-MiniLM-L6-v2)
///
/// # Model Details
/// - Input: Text strings (truncated to 256 tokens)
/// - Output: 384-dimensional f32 vectors
/// - Provider: CPU (ONNX Runtime)
///
/// Clones share the same session and tokenizer.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    /// ONNX Runtime session; `run` needs exclusive access
    session: Arc<Mutex<Session>>,

    tokenizer: Arc<Tokenizer>,

    model_name: String,

    dimension: usize,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Token tensors for one batch, padded to the longest sequence
struct EncodedBatch {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl OnnxEmbeddingModel {
    /// Loads the model and tokenizer from disk
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - Model doesn't output 384 dimensions
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxEmbeddingModel::new(
    ///     "sentence-transformers/all-MiniLM-L6-v2",
    ///     "./models/all-MiniLM-L6-v2-onnx/model.onnx",
    ///     "./models/all-MiniLM-L6-v2-onnx/tokenizer.json"
    /// ).await?;
    /// ```
    pub async fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("Loading ONNX embedding model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load ONNX model from {}",
                model_path.display()
            ))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let model = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension: MINILM_DIMENSION,
        };

        // Validation inference; rejects models with another hidden size
        let sample = model.run_batch(&["validation test".to_string()])?;
        if sample.first().map(Vec::len) != Some(MINILM_DIMENSION) {
            anyhow::bail!(
                "Model outputs unexpected dimensions (expected {})",
                MINILM_DIMENSION
            );
        }

        info!("ONNX embedding model {} loaded", model.model_name);
        Ok(model)
    }

    fn encode(&self, texts: &[String]) -> Result<EncodedBatch> {
        let encodings = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let padding = max_len - ids.len();

            input_ids.extend(ids.iter().map(|&id| id as i64));
            input_ids.extend(std::iter::repeat(0i64).take(padding));
            attention_mask.extend(mask.iter().map(|&m| m as i64));
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
        }

        let shape = (texts.len(), max_len);
        Ok(EncodedBatch {
            input_ids: Array2::from_shape_vec(shape, input_ids)
                .context("Failed to create input_ids array")?,
            attention_mask: Array2::from_shape_vec(shape, attention_mask)
                .context("Failed to create attention_mask array")?,
            token_type_ids: Array2::zeros(shape),
        })
    }

    /// Tokenize, run the session and mean-pool every item of the batch
    fn run_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = self.encode(texts)?;
        let mask = batch.attention_mask.clone();

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => Value::from_array(batch.input_ids)?,
            "attention_mask" => Value::from_array(batch.attention_mask)?,
            "token_type_ids" => Value::from_array(batch.token_type_ids)?
        ])?;

        // Token-level embeddings: [batch, seq_len, hidden_dim]
        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;
        if output.ndim() != 3 {
            anyhow::bail!(
                "Model outputs unexpected shape: {:?} (expected [batch, seq_len, hidden])",
                output.shape()
            );
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_idx, item_mask) in mask.outer_iter().enumerate() {
            let item = output
                .index_axis(Axis(0), batch_idx)
                .into_dimensionality::<ndarray::Ix2>()
                .context("Failed to view token embeddings")?;
            let mut pooled = mean_pool(item, item_mask.as_slice().unwrap_or(&[]));
            normalize_in_place(&mut pooled);
            embeddings.push(pooled);
        }

        Ok(embeddings)
    }

    /// Counts non-padding tokens in a text string
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(encoding.get_attention_mask().iter().map(|&m| m as usize).sum())
    }
}

/// Average token vectors, ignoring padding positions
fn mean_pool(tokens: ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let hidden_dim = tokens.shape()[1];
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut sum_mask = 0.0f32;

    for (row, &mask_value) in tokens.outer_iter().zip(mask) {
        let weight = mask_value as f32;
        sum_mask += weight;
        for (acc, value) in pooled.iter_mut().zip(row.iter()) {
            *acc += value * weight;
        }
    }

    for value in &mut pooled {
        *value /= sum_mask.max(1e-9);
    }
    pooled
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("Model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.run_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
