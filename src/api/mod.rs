// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod http_server;
pub mod ui;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{
    build_router, serve, AppState, ChatRequest, ChatResponse, HealthResponse, MessagesResponse,
};
