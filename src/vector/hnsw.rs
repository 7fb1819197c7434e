// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HNSW Index for Fast Vector Search
//!
//! Hierarchical Navigable Small World graph for approximate nearest
//! neighbour search over large document stores. Small stores use an exact
//! scan instead (see `VectorStore`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medibot::vector::hnsw::HnswIndex;
//!
//! let index = HnswIndex::build(&vectors, 384)?;
//! for hit in index.search(&query, 3)? {
//!     println!("{}: {:.3}", hit.position, hit.score);
//! }
//! ```

use anyhow::{anyhow, Result};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;

use tracing::debug;

use crate::embeddings::normalize_in_place;

/// One neighbour found by the index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Position of the vector in the slice the index was built from
    pub position: usize,

    /// Cosine similarity
    pub score: f32,
}

/// HNSW index over cosine distance
pub struct HnswIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    len: usize,
    dimensions: usize,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("len", &self.len)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl HnswIndex {
    /// Build HNSW index from vectors
    ///
    /// Zero-norm vectors have no direction and are left out of the graph;
    /// they are never returned by `search`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Vectors have wrong dimensions
    /// - Vectors contain NaN or Infinity values
    pub fn build(vectors: &[Vec<f32>], dimensions: usize) -> Result<Self> {
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != dimensions {
                return Err(anyhow!(
                    "Vector {} has wrong dimensions: expected {}, got {}",
                    i,
                    dimensions,
                    vector.len()
                ));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(anyhow!("Vector {} contains NaN or Infinity values", i));
            }
        }

        let max_nb_connection = 16; // M parameter: connections per layer
        let ef_construction = 200;
        // log2(n) layers, clamped to what hnsw_rs supports
        let nb_layer = ((vectors.len().max(2) as f32).log2().ceil() as usize).clamp(4, 16);

        let mut hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
            max_nb_connection,
            vectors.len().max(1),
            nb_layer,
            ef_construction,
            DistCosine,
        );

        let mut skipped = 0;
        for (position, vector) in vectors.iter().enumerate() {
            if is_zero_norm(vector) {
                skipped += 1;
                continue;
            }
            let mut normalized = vector.clone();
            normalize_in_place(&mut normalized);
            hnsw.insert((normalized.as_slice(), position));
        }
        if skipped > 0 {
            debug!("Left {} zero-norm vectors out of the HNSW graph", skipped);
        }

        hnsw.set_searching_mode(true);

        Ok(Self {
            hnsw,
            len: vectors.len() - skipped,
            dimensions,
        })
    }

    /// Search for the k nearest neighbours, best first
    ///
    /// A zero-norm query matches nothing and yields no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dimensions {
            return Err(anyhow!(
                "Query has wrong dimensions: expected {}, got {}",
                self.dimensions,
                query.len()
            ));
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("Query contains NaN or Infinity values"));
        }
        if self.len == 0 || k == 0 || is_zero_norm(query) {
            return Ok(vec![]);
        }

        let mut normalized = query.to_vec();
        normalize_in_place(&mut normalized);

        let ef_search = (k * 2).max(50);
        let neighbours: Vec<Neighbour> = self.hnsw.search(&normalized, k, ef_search);

        // cosine distance -> similarity
        let mut hits: Vec<IndexHit> = neighbours
            .into_iter()
            .map(|n| IndexHit {
                position: n.d_id,
                score: 1.0 - n.distance,
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);

        Ok(hits)
    }

    /// Number of vectors in the graph
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// True when the vector has no usable direction
pub fn is_zero_norm(vector: &[f32]) -> bool {
    vector.iter().map(|x| x * x).sum::<f32>() <= f32::EPSILON * f32::EPSILON
}
