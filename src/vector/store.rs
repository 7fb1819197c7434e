// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! On-disk document store with top-k similarity search
//!
//! An artifact is a directory holding:
//! - `index.json`: manifest (format version, embedding model, dimension,
//!   document count, SHA-256 of the payload, creation time)
//! - `docs.bin`: bincode-encoded documents with their vectors
//!
//! Loading deserializes whatever the payload contains, so callers must opt
//! in with `IndexLoadOptions::allow_dangerous_deserialization`. Only load
//! artifacts produced by a pipeline you trust.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::hnsw::{is_zero_norm, HnswIndex};
use super::{DocumentRetriever, IndexError, RetrievedDocument};

pub const INDEX_FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "index.json";
pub const PAYLOAD_FILE: &str = "docs.bin";

/// Stores at least this large are searched through HNSW instead of a scan
pub const HNSW_MIN_DOCUMENTS: usize = 1_000;

/// Manifest written next to the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimension: usize,
    pub document_count: usize,
    pub payload_sha256: String,
    pub created_at: DateTime<Utc>,
}

/// A document chunk and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub vector: Vec<f32>,
}

/// Options controlling how an artifact is loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexLoadOptions {
    /// Accept deserializing the payload; the artifact must come from a trusted pipeline
    pub allow_dangerous_deserialization: bool,
}

impl IndexLoadOptions {
    pub fn trusted() -> Self {
        Self {
            allow_dangerous_deserialization: true,
        }
    }
}

/// Document store loaded in memory
pub struct VectorStore {
    manifest: IndexManifest,
    documents: Vec<StoredDocument>,
    hnsw: Option<HnswIndex>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("manifest", &self.manifest)
            .field("hnsw", &self.hnsw.is_some())
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Build a store from embedded documents
    pub fn from_documents(
        documents: Vec<StoredDocument>,
        embedding_model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, IndexError> {
        let payload = encode_payload(&documents)?;
        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimension,
            document_count: documents.len(),
            payload_sha256: hex::encode(Sha256::digest(&payload)),
            created_at: Utc::now(),
        };
        Self::assemble(manifest, documents)
    }

    fn assemble(manifest: IndexManifest, documents: Vec<StoredDocument>) -> Result<Self, IndexError> {
        for doc in &documents {
            if doc.vector.len() != manifest.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: manifest.dimension,
                    actual: doc.vector.len(),
                });
            }
        }

        let hnsw = if documents.len() >= HNSW_MIN_DOCUMENTS {
            let vectors: Vec<Vec<f32>> = documents.iter().map(|d| d.vector.clone()).collect();
            let index = HnswIndex::build(&vectors, manifest.dimension)
                .map_err(|e| IndexError::Build(e.to_string()))?;
            Some(index)
        } else {
            None
        };

        Ok(Self {
            manifest,
            documents,
            hnsw,
        })
    }

    /// Write the artifact directory, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), IndexError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let payload = encode_payload(&self.documents)?;
        let mut manifest = self.manifest.clone();
        manifest.payload_sha256 = hex::encode(Sha256::digest(&payload));
        manifest.document_count = self.documents.len();

        let manifest_json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| IndexError::Corrupt(format!("Failed to serialize manifest: {}", e)))?;

        fs::write(dir.join(PAYLOAD_FILE), payload)?;
        fs::write(dir.join(MANIFEST_FILE), manifest_json)?;

        info!(
            "Saved vector store with {} documents to {}",
            manifest.document_count,
            dir.display()
        );
        Ok(())
    }

    /// Load an artifact directory
    ///
    /// # Errors
    /// - `UntrustedArtifact` unless deserialization was explicitly allowed
    /// - `NotFound` if the directory or its files are missing
    /// - `ChecksumMismatch`, `Corrupt`, `UnsupportedVersion`,
    ///   `DimensionMismatch` for damaged or incompatible artifacts
    pub fn load(dir: impl AsRef<Path>, options: IndexLoadOptions) -> Result<Self, IndexError> {
        let dir = dir.as_ref();

        if !options.allow_dangerous_deserialization {
            warn!(
                "Refusing to load {} without allow_dangerous_deserialization",
                dir.display()
            );
            return Err(IndexError::UntrustedArtifact {
                path: dir.display().to_string(),
            });
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        let payload_path = dir.join(PAYLOAD_FILE);
        for path in [&manifest_path, &payload_path] {
            if !path.exists() {
                return Err(IndexError::NotFound {
                    path: path.display().to_string(),
                });
            }
        }

        let manifest: IndexManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)
            .map_err(|e| IndexError::ManifestParse(e.to_string()))?;

        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedVersion {
                found: manifest.format_version,
                expected: INDEX_FORMAT_VERSION,
            });
        }

        let payload = fs::read(&payload_path)?;
        if hex::encode(Sha256::digest(&payload)) != manifest.payload_sha256 {
            return Err(IndexError::ChecksumMismatch {
                path: payload_path.display().to_string(),
            });
        }

        let documents: Vec<StoredDocument> = bincode::deserialize(&payload)
            .map_err(|e| IndexError::Corrupt(format!("Failed to decode documents: {}", e)))?;

        if documents.len() != manifest.document_count {
            return Err(IndexError::Corrupt(format!(
                "Manifest lists {} documents, payload holds {}",
                manifest.document_count,
                documents.len()
            )));
        }

        info!(
            "Loaded vector store from {} ({} documents, {}D, model {})",
            dir.display(),
            documents.len(),
            manifest.dimension,
            manifest.embedding_model
        );

        Self::assemble(manifest, documents)
    }

    /// Top-k documents by cosine similarity, best first; no score threshold
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedDocument>, IndexError> {
        if query.len() != self.manifest.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.manifest.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.documents.is_empty() {
            return Ok(vec![]);
        }

        // A zero query has no direction; the exact scan scores it 0 everywhere
        let ranked: Vec<(usize, f32)> = match &self.hnsw {
            Some(index) if !is_zero_norm(query) => index
                .search(query, k)
                .map_err(|e| IndexError::Search(e.to_string()))?
                .into_iter()
                .map(|hit| (hit.position, hit.score))
                .collect(),
            _ => {
                let mut scored: Vec<(usize, f32)> = self
                    .documents
                    .iter()
                    .enumerate()
                    .map(|(i, doc)| (i, cosine_similarity(query, &doc.vector)))
                    .collect();
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(k);
                scored
            }
        };

        Ok(ranked
            .into_iter()
            .filter_map(|(position, score)| {
                self.documents.get(position).map(|doc| RetrievedDocument {
                    text: doc.text.clone(),
                    metadata: doc.metadata.clone(),
                    score,
                })
            })
            .collect())
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    pub fn embedding_model(&self) -> &str {
        &self.manifest.embedding_model
    }

    pub fn uses_hnsw(&self) -> bool {
        self.hnsw.is_some()
    }
}

impl DocumentRetriever for VectorStore {
    fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedDocument>, IndexError> {
        self.search(query, k)
    }

    fn document_count(&self) -> usize {
        self.len()
    }
}

fn encode_payload(documents: &[StoredDocument]) -> Result<Vec<u8>, IndexError> {
    bincode::serialize(documents)
        .map_err(|e| IndexError::Corrupt(format!("Failed to encode documents: {}", e)))
}

/// Cosine similarity; 0.0 when either vector has zero length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
