// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Building artifacts from plain-text sources
//!
//! Files are split into overlapping character windows, preferring to cut
//! at paragraph, line, then word boundaries, and each chunk is embedded.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::store::{StoredDocument, VectorStore};
use crate::embeddings::EmbeddingProvider;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];
const EMBED_BATCH_SIZE: usize = 32;

/// Character-window chunking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("Chunk size must be greater than 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

/// A source passage before embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChunk {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// Split text into chunks of at most `chunk_size` characters
///
/// Consecutive chunks share roughly `chunk_overlap` characters. Cuts land on
/// the last blank line, newline or space inside the window when one exists
/// past the overlap; otherwise the window is cut hard.
pub fn split_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + config.chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars[start..hard_end], config.chunk_overlap)
                .map(|offset| start + offset)
                .unwrap_or(hard_end)
        };

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(config.chunk_overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Offset just past the preferred separator, searching from the end
fn find_break(window: &[char], min_offset: usize) -> Option<usize> {
    let is_blank_line = |i: usize| window[i] == '\n' && i > 0 && window[i - 1] == '\n';
    let candidates: [&dyn Fn(usize) -> bool; 3] = [
        &is_blank_line,
        &|i: usize| window[i] == '\n',
        &|i: usize| window[i] == ' ',
    ];

    candidates.iter().find_map(|matches| {
        (min_offset + 1..window.len())
            .rev()
            .find(|&i| matches(i))
            .map(|i| i + 1)
    })
}

/// Collect `.txt` and `.md` files under `input`, walked in file-name order
pub fn collect_source_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
        if entry.file_type().is_file() && has_supported_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load and chunk every supported file under `input`
pub fn load_chunks(input: &Path, config: &ChunkConfig) -> Result<Vec<SourceChunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for path in collect_source_files(input)? {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let pieces = split_text(&text, config);
        debug!("{}: {} chunks", path.display(), pieces.len());

        for (i, piece) in pieces.into_iter().enumerate() {
            let mut metadata = BTreeMap::new();
            metadata.insert("source".to_string(), path.display().to_string());
            metadata.insert("chunk".to_string(), i.to_string());
            chunks.push(SourceChunk {
                text: piece,
                metadata,
            });
        }
    }

    Ok(chunks)
}

/// Embed chunks and assemble a store
pub async fn build_store(
    chunks: Vec<SourceChunk>,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorStore> {
    let mut documents = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;
        for (chunk, vector) in batch.iter().zip(vectors) {
            documents.push(StoredDocument {
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                vector,
            });
        }
    }

    info!(
        "Embedded {} chunks with {}",
        documents.len(),
        embedder.model_name()
    );

    Ok(VectorStore::from_documents(
        documents,
        embedder.model_name(),
        embedder.dimension(),
    )?)
}
