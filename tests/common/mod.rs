// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Hand-written mock providers shared by the integration tests
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use medibot::embeddings::EmbeddingProvider;
use medibot::inference::{CompletionError, CompletionProvider};
use medibot::rag::{PipelineSettings, QueryPipeline, RagContext, ResourceLoader};
use medibot::vector::{DocumentRetriever, IndexError, RetrievedDocument};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MOCK_DIMENSION: usize = 8;

pub const HYPERTENSION_DOCS: [&str; 3] = [
    "Hypertension, also known as high blood pressure, is a long-term medical condition in which the blood pressure in the arteries is persistently elevated.",
    "High blood pressure typically does not cause symptoms, but it is a major risk factor for stroke and heart disease.",
    "Blood pressure is expressed by two measurements, the systolic and diastolic pressures.",
];

/// Embedder returning a constant unit vector
pub struct MockEmbedder {
    pub calls: AtomicUsize,
    fail: bool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("embedding backend offline");
        }
        let mut vector = vec![0.0; MOCK_DIMENSION];
        vector[0] = 1.0;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        MOCK_DIMENSION
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}

/// Retriever returning a fixed passage list, capped at `k`
pub struct MockRetriever {
    documents: Vec<RetrievedDocument>,
    pub calls: AtomicUsize,
}

impl MockRetriever {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            documents: texts
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    let mut doc = RetrievedDocument::new(*text);
                    doc.score = 1.0 - i as f32 * 0.1;
                    doc
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl DocumentRetriever for MockRetriever {
    fn retrieve(&self, _query: &[f32], k: usize) -> Result<Vec<RetrievedDocument>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.iter().take(k).cloned().collect())
    }

    fn document_count(&self) -> usize {
        self.documents.len()
    }
}

type Reply = Box<dyn Fn() -> Result<String, CompletionError> + Send + Sync>;

/// Completion provider with a scripted reply that records every prompt
pub struct MockCompletion {
    reply: Reply,
    pub prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn answering(text: &str) -> Self {
        let text = text.to_string();
        Self {
            reply: Box::new(move || Ok(text.clone())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> CompletionError + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(move || Err(error())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.reply)()
    }

    fn model_id(&self) -> &str {
        "mock-llm"
    }
}

/// Loader counting how often each handle is built
pub struct CountingLoader {
    pub embedder_loads: AtomicUsize,
    pub index_loads: AtomicUsize,
    documents: Vec<&'static str>,
    fail_index: bool,
}

impl CountingLoader {
    pub fn new(documents: &[&'static str]) -> Self {
        Self {
            embedder_loads: AtomicUsize::new(0),
            index_loads: AtomicUsize::new(0),
            documents: documents.to_vec(),
            fail_index: false,
        }
    }

    pub fn missing_index() -> Self {
        Self {
            fail_index: true,
            ..Self::new(&[])
        }
    }
}

#[async_trait]
impl ResourceLoader for CountingLoader {
    async fn load_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedder_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockEmbedder::new()))
    }

    async fn load_index(&self) -> Result<Arc<dyn DocumentRetriever>, IndexError> {
        self.index_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_index {
            return Err(IndexError::NotFound {
                path: "vectorstore/db_faiss".to_string(),
            });
        }
        Ok(Arc::new(MockRetriever::new(&self.documents)))
    }
}

/// Pipeline over preloaded mocks
pub fn mock_pipeline(documents: &[&str], completion: Arc<MockCompletion>) -> QueryPipeline {
    let context = RagContext::with_resources(
        Arc::new(MockEmbedder::new()),
        Arc::new(MockRetriever::new(documents)),
        completion,
    );
    QueryPipeline::new(Arc::new(context), PipelineSettings::default())
}
