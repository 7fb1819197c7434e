// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for medibot

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "retrieval-augmented-answers",
    "source-snippets",
    "huggingface-inference",
    "onnx-embeddings",
    "hnsw-index",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("medibot {}", VERSION_NUMBER)
}
