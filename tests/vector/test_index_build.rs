// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Building an artifact from text files and querying it from disk

use crate::common::MockCompletion;
use medibot::config::{EmbedderBackend, EmbeddingSettings};
use medibot::embeddings::{EmbeddingProvider, HashingEmbedder};
use medibot::rag::{
    DiskResourceLoader, PipelineError, PipelineSettings, QueryPipeline, RagContext,
};
use medibot::vector::{
    build_store, load_chunks, ChunkConfig, IndexError, IndexLoadOptions, VectorStore,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: usize = 256;

fn write_sources(dir: &TempDir) {
    fs::write(
        dir.path().join("hypertension.txt"),
        "Hypertension is persistently high blood pressure in the arteries.\n\n\
         Untreated hypertension raises the risk of stroke and heart attack.",
    )
    .unwrap();
    fs::write(
        dir.path().join("diabetes.md"),
        "# Diabetes\n\nDiabetes mellitus causes high blood sugar because of insulin problems.",
    )
    .unwrap();
    fs::write(dir.path().join("notes.csv"), "ignored,file").unwrap();
}

fn hashing_settings() -> EmbeddingSettings {
    EmbeddingSettings {
        backend: EmbedderBackend::Hashing,
        dimension: DIMENSION,
        ..EmbeddingSettings::default()
    }
}

async fn build_artifact(sources: &TempDir, output: &TempDir) -> VectorStore {
    let chunks = load_chunks(
        sources.path(),
        &ChunkConfig {
            chunk_size: 80,
            chunk_overlap: 10,
        },
    )
    .unwrap();
    let embedder = HashingEmbedder::new(DIMENSION);
    let store = build_store(chunks, &embedder).await.unwrap();
    store.save(output.path()).unwrap();
    store
}

#[tokio::test]
async fn test_only_text_sources_are_chunked() {
    let sources = TempDir::new().unwrap();
    write_sources(&sources);

    let chunks = load_chunks(sources.path(), &ChunkConfig::default()).unwrap();

    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| !c.metadata["source"].ends_with(".csv")));
    assert!(chunks.iter().all(|c| c.metadata["chunk"] == "0"));
}

#[tokio::test]
async fn test_built_artifact_round_trips() {
    let sources = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_sources(&sources);

    let built = build_artifact(&sources, &output).await;
    let loaded = VectorStore::load(output.path(), IndexLoadOptions::trusted()).unwrap();

    assert!(built.len() > 2);
    assert_eq!(loaded.len(), built.len());
    assert_eq!(loaded.dimension(), DIMENSION);
    assert_eq!(loaded.embedding_model(), format!("feature-hashing-{}", DIMENSION));
    assert!(!loaded.uses_hnsw());
}

#[tokio::test]
async fn test_query_retrieves_matching_passage_first() {
    let sources = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_sources(&sources);
    let store = build_artifact(&sources, &output).await;

    let query = HashingEmbedder::new(DIMENSION)
        .embed("what raises blood sugar insulin diabetes")
        .await
        .unwrap();
    let hits = store.search(&query, 3).unwrap();

    assert_eq!(hits.len(), 3);
    assert!(hits[0].metadata["source"].ends_with("diabetes.md"));
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn test_pipeline_over_disk_artifact() {
    let sources = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_sources(&sources);
    build_artifact(&sources, &output).await;

    let loader = DiskResourceLoader::new(
        output.path(),
        IndexLoadOptions::trusted(),
        hashing_settings(),
    );
    let completion = Arc::new(MockCompletion::answering("Hypertension is high blood pressure."));
    let context = Arc::new(RagContext::new(Arc::new(loader), completion.clone()));
    let pipeline = QueryPipeline::new(context.clone(), PipelineSettings::default());

    let outcome = pipeline.run("What is hypertension?").await.unwrap();

    assert_eq!(outcome.snippets.len(), 3);
    assert!(completion.last_prompt().unwrap().contains("hypertension"));
    assert!(context.document_count().unwrap() > 2);
}

#[tokio::test]
async fn test_untrusted_artifact_fails_query() {
    let sources = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_sources(&sources);
    build_artifact(&sources, &output).await;

    let loader = DiskResourceLoader::new(
        output.path(),
        IndexLoadOptions::default(),
        hashing_settings(),
    );
    let context = RagContext::new(
        Arc::new(loader),
        Arc::new(MockCompletion::answering("unused")),
    );

    let err = context.warm().await.unwrap_err();
    assert!(matches!(err, PipelineError::IndexLoadFailed(_)));
    assert!(err.to_string().contains("allow_dangerous_deserialization"));
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let empty = TempDir::new().unwrap();
    let missing = empty.path().join("db_faiss");

    let err = VectorStore::load(&missing, IndexLoadOptions::trusted()).unwrap_err();
    assert!(matches!(err, IndexError::NotFound { .. }));
}
