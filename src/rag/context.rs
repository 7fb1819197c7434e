// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handles shared by every query of a session
//!
//! The embedding model and the index are expensive to load, so they are
//! loaded on first use (or by `warm`) and reused read-only afterwards.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::errors::PipelineError;
use crate::config::{EmbedderBackend, EmbeddingSettings};
use crate::embeddings::{EmbeddingProvider, HashingEmbedder, OnnxEmbeddingModel};
use crate::inference::CompletionProvider;
use crate::vector::{DocumentRetriever, IndexError, IndexLoadOptions, VectorStore};

/// Source of the embedding and index handles
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>>;

    async fn load_index(&self) -> Result<Arc<dyn DocumentRetriever>, IndexError>;
}

/// Loads the configured embedder and the artifact directory from disk
pub struct DiskResourceLoader {
    index_path: PathBuf,
    load_options: IndexLoadOptions,
    embedding: EmbeddingSettings,
}

impl DiskResourceLoader {
    pub fn new(
        index_path: impl Into<PathBuf>,
        load_options: IndexLoadOptions,
        embedding: EmbeddingSettings,
    ) -> Self {
        Self {
            index_path: index_path.into(),
            load_options,
            embedding,
        }
    }
}

/// Build the embedder described by the settings
pub async fn load_configured_embedder(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match settings.backend {
        EmbedderBackend::Onnx => Arc::new(
            OnnxEmbeddingModel::new(
                settings.model_name.clone(),
                &settings.model_path,
                &settings.tokenizer_path,
            )
            .await?,
        ),
        EmbedderBackend::Hashing => Arc::new(HashingEmbedder::new(settings.dimension)),
    };
    Ok(embedder)
}

#[async_trait]
impl ResourceLoader for DiskResourceLoader {
    async fn load_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        load_configured_embedder(&self.embedding).await
    }

    async fn load_index(&self) -> Result<Arc<dyn DocumentRetriever>, IndexError> {
        let path = self.index_path.clone();
        let options = self.load_options;
        let store = tokio::task::spawn_blocking(move || VectorStore::load(path, options))
            .await
            .map_err(|e| IndexError::Corrupt(format!("Index load task failed: {}", e)))??;

        let expected_model = self.embedding.expected_model_name();
        if store.embedding_model() != expected_model {
            warn!(
                "Index was built with '{}' but queries are embedded with '{}'",
                store.embedding_model(),
                expected_model
            );
        }

        Ok(Arc::new(store))
    }
}

/// Explicitly owned resource context, constructed once and shared by reference
pub struct RagContext {
    loader: Option<Arc<dyn ResourceLoader>>,
    embedder: OnceCell<Arc<dyn EmbeddingProvider>>,
    retriever: OnceCell<Arc<dyn DocumentRetriever>>,
    completion: Arc<dyn CompletionProvider>,
}

impl RagContext {
    /// Context whose embedder and index are loaded lazily through `loader`
    pub fn new(loader: Arc<dyn ResourceLoader>, completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            loader: Some(loader),
            embedder: OnceCell::new(),
            retriever: OnceCell::new(),
            completion,
        }
    }

    /// Context around handles that are already loaded
    pub fn with_resources(
        embedder: Arc<dyn EmbeddingProvider>,
        retriever: Arc<dyn DocumentRetriever>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            loader: None,
            embedder: OnceCell::new_with(Some(embedder)),
            retriever: OnceCell::new_with(Some(retriever)),
            completion,
        }
    }

    fn loader(&self) -> Result<&Arc<dyn ResourceLoader>, PipelineError> {
        self.loader
            .as_ref()
            .ok_or_else(|| PipelineError::Unknown("No resource loader configured".to_string()))
    }

    /// Memoized embedding provider
    pub async fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>, PipelineError> {
        self.embedder
            .get_or_try_init(|| async {
                let embedder = self.loader()?.load_embedder().await.map_err(|e| {
                    PipelineError::ProviderUnavailable(format!(
                        "Embedding model unavailable: {:#}",
                        e
                    ))
                })?;
                info!("Embedding model ready: {}", embedder.model_name());
                Ok(embedder)
            })
            .await
            .cloned()
    }

    /// Memoized vector index
    pub async fn retriever(&self) -> Result<Arc<dyn DocumentRetriever>, PipelineError> {
        self.retriever
            .get_or_try_init(|| async {
                let retriever = self.loader()?.load_index().await?;
                info!("Vector index ready: {} documents", retriever.document_count());
                Ok(retriever)
            })
            .await
            .cloned()
    }

    pub fn completion(&self) -> &Arc<dyn CompletionProvider> {
        &self.completion
    }

    /// Load both handles now instead of on the first query
    pub async fn warm(&self) -> Result<(), PipelineError> {
        self.embedder().await?;
        self.retriever().await?;
        Ok(())
    }

    /// Document count, if the index has been loaded
    pub fn document_count(&self) -> Option<usize> {
        self.retriever.get().map(|r| r.document_count())
    }
}
