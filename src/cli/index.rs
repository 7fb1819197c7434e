// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::config::AppConfig;
use crate::rag::context::load_configured_embedder;
use crate::vector::{build_store, load_chunks, ChunkConfig};
use crate::vector::ingest::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

/// Arguments for the build-index command
#[derive(Args, Debug)]
pub struct BuildIndexArgs {
    /// File or directory of .txt / .md sources
    #[arg(long)]
    pub input: PathBuf,

    /// Artifact directory (defaults to the configured index path)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,
}

pub async fn build_index(config: &AppConfig, args: BuildIndexArgs) -> Result<()> {
    let chunk_config = ChunkConfig {
        chunk_size: args.chunk_size,
        chunk_overlap: args.chunk_overlap,
    };
    let output = args.output.unwrap_or_else(|| config.index.path.clone());

    let input = args.input.clone();
    let chunks = tokio::task::spawn_blocking(move || load_chunks(&input, &chunk_config))
        .await
        .context("Chunking task failed")??;
    if chunks.is_empty() {
        anyhow::bail!("No .txt or .md content found under {}", args.input.display());
    }
    info!(
        "Loaded {} chunks from {}",
        chunks.len(),
        args.input.display()
    );

    let embedder = load_configured_embedder(&config.embedding)
        .await
        .context("Failed to load embedding model")?;
    let store = build_store(chunks, embedder.as_ref()).await?;

    store
        .save(&output)
        .with_context(|| format!("Failed to write index to {}", output.display()))?;

    println!(
        "Indexed {} chunks with {} into {}",
        store.len(),
        store.embedding_model(),
        output.display()
    );
    Ok(())
}
