// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Application configuration
//!
//! Layering: built-in defaults, then an optional TOML file, then environment
//! variables. `.env` files are read by the binaries before this runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::embeddings::{MINILM_DIMENSION, MINILM_MODEL_NAME};
use crate::inference::{
    HuggingFaceEndpoint, PromptTemplate, DEFAULT_INFERENCE_URL, DEFAULT_MAX_NEW_TOKENS,
    DEFAULT_PROMPT_TEMPLATE, DEFAULT_REPO_ID, DEFAULT_TOKEN_ENV,
};
use crate::rag::pipeline::DEFAULT_TOP_K;
use crate::rag::policy::DEFAULT_REFUSAL_PHRASES;
use crate::rag::render::SNIPPET_MAX_CHARS;
use crate::rag::{DiskResourceLoader, PipelineSettings, QueryPipeline, RagContext, SourcePolicy};
use crate::vector::IndexLoadOptions;

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "MEDIBOT_CONFIG";

pub const DEFAULT_INDEX_PATH: &str = "vectorstore/db_faiss";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8501";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub pipeline: PipelineConfig,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Directory holding the prebuilt index artifact
    pub path: PathBuf,
    /// Opt in to decoding the artifact payload
    pub allow_dangerous_deserialization: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_INDEX_PATH),
            allow_dangerous_deserialization: true,
        }
    }
}

impl IndexSettings {
    pub fn load_options(&self) -> IndexLoadOptions {
        IndexLoadOptions {
            allow_dangerous_deserialization: self.allow_dangerous_deserialization,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    Onnx,
    Hashing,
}

impl FromStr for EmbedderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "hashing" => Ok(Self::Hashing),
            other => Err(format!(
                "Unknown embedder backend '{}' (expected onnx or hashing)",
                other
            )),
        }
    }
}

impl fmt::Display for EmbedderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Hashing => write!(f, "hashing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbedderBackend,
    pub model_name: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Onnx,
            model_name: MINILM_MODEL_NAME.to_string(),
            model_path: PathBuf::from("./models/all-MiniLM-L6-v2-onnx/model.onnx"),
            tokenizer_path: PathBuf::from("./models/all-MiniLM-L6-v2-onnx/tokenizer.json"),
            dimension: MINILM_DIMENSION,
        }
    }
}

impl EmbeddingSettings {
    /// Model name the configured backend records in index manifests
    pub fn expected_model_name(&self) -> String {
        match self.backend {
            EmbedderBackend::Onnx => self.model_name.clone(),
            EmbedderBackend::Hashing => format!("feature-hashing-{}", self.dimension),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub base_url: String,
    pub repo_id: String,
    /// Environment variable holding the API token
    pub token_env: String,
    pub max_new_tokens: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            repo_id: DEFAULT_REPO_ID.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            timeout_secs: None,
        }
    }
}

impl CompletionSettings {
    /// Endpoint client; the token is read now but only checked per request
    pub fn endpoint(&self) -> Result<HuggingFaceEndpoint> {
        let endpoint = HuggingFaceEndpoint::from_env(
            self.base_url.clone(),
            self.repo_id.clone(),
            &self.token_env,
            self.max_new_tokens,
        );
        match self.timeout_secs {
            Some(secs) => endpoint
                .with_timeout(Duration::from_secs(secs))
                .context("Failed to configure completion client"),
            None => Ok(endpoint),
        }
    }
}

/// Serializable form of the pipeline tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub snippet_max_chars: usize,
    pub prompt_template: String,
    pub refusal_phrases: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            snippet_max_chars: SNIPPET_MAX_CHARS,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            refusal_phrases: DEFAULT_REFUSAL_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl PipelineConfig {
    pub fn to_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.top_k,
            snippet_max_chars: self.snippet_max_chars,
            template: PromptTemplate::new(self.prompt_template.clone()),
            policy: SourcePolicy::new(self.refusal_phrases.iter().cloned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` (or `MEDIBOT_CONFIG`), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match file {
            Some(file) => {
                info!("Loading configuration from {}", file.display());
                Self::from_file(&file)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment-style overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup("MEDIBOT_INDEX_PATH") {
            self.index.path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("MEDIBOT_EMBEDDER") {
            self.embedding.backend = backend
                .parse()
                .map_err(|e: String| anyhow::anyhow!("MEDIBOT_EMBEDDER: {}", e))?;
        }
        if let Some(path) = lookup("EMBEDDING_MODEL_PATH") {
            self.embedding.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("EMBEDDING_TOKENIZER_PATH") {
            self.embedding.tokenizer_path = PathBuf::from(path);
        }
        if let Some(repo) = lookup("HUGGINGFACE_REPO_ID") {
            self.completion.repo_id = repo;
        }
        if let Some(url) = lookup("HF_INFERENCE_URL") {
            self.completion.base_url = url;
        }
        if let Some(value) = lookup("MAX_NEW_TOKENS") {
            self.completion.max_new_tokens = value
                .trim()
                .parse()
                .with_context(|| format!("MAX_NEW_TOKENS is not a number: {}", value))?;
        }
        if let Some(value) = lookup("RAG_TOP_K") {
            self.pipeline.top_k = value
                .trim()
                .parse()
                .with_context(|| format!("RAG_TOP_K is not a number: {}", value))?;
        }
        if let Some(port) = lookup("API_PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("API_PORT is not a port: {}", port))?;
            let host = self
                .server
                .listen_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "127.0.0.1".to_string());
            self.server.listen_addr = format!("{}:{}", host, port);
        }
        if let Some(addr) = lookup("MEDIBOT_LISTEN") {
            self.server.listen_addr = addr;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pipeline.top_k == 0 {
            return Err("pipeline.top_k must be greater than 0".to_string());
        }
        if self.pipeline.snippet_max_chars == 0 {
            return Err("pipeline.snippet_max_chars must be greater than 0".to_string());
        }
        if self.completion.max_new_tokens == 0 {
            return Err("completion.max_new_tokens must be greater than 0".to_string());
        }
        if self.completion.repo_id.trim().is_empty() {
            return Err("completion.repo_id must not be empty".to_string());
        }
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be greater than 0".to_string());
        }
        if !PromptTemplate::new(self.pipeline.prompt_template.clone()).has_slots() {
            return Err(
                "pipeline.prompt_template must contain {context} and {question}".to_string(),
            );
        }
        Ok(())
    }

    /// Resource context wired to the configured index, embedder and endpoint
    pub fn build_context(&self) -> Result<RagContext> {
        let loader = DiskResourceLoader::new(
            self.index.path.clone(),
            self.index.load_options(),
            self.embedding.clone(),
        );
        let completion = self.completion.endpoint()?;
        Ok(RagContext::new(Arc::new(loader), Arc::new(completion)))
    }

    pub fn build_pipeline(&self) -> Result<QueryPipeline> {
        let context = self.build_context()?;
        Ok(QueryPipeline::new(
            Arc::new(context),
            self.pipeline.to_settings(),
        ))
    }
}
