// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{rejection::JsonRejection, Form, Json, State},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::errors::ApiError;
use super::ui::render_page;
use crate::rag::{ChatSession, ChatTurn, PipelineError, QueryPipeline};
use crate::version;

/// Shared by every handler; one transcript per server process
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QueryPipeline>,
    session: Arc<Mutex<ChatSession>>,
}

impl AppState {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            session: Arc::new(Mutex::new(ChatSession::new())),
        }
    }

    pub fn pipeline(&self) -> &Arc<QueryPipeline> {
        &self.pipeline
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub turn: ChatTurn,
    pub messages: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_documents: Option<usize>,
    pub features: Vec<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Chat page
        .route("/", get(page_handler))
        .route("/chat", post(chat_form_handler))
        // JSON API
        .route("/v1/chat", post(chat_handler))
        .route("/v1/messages", get(messages_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("API server listening on {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::VERSION_NUMBER.to_string(),
        indexed_documents: state.pipeline.context().document_count(),
        features: version::FEATURES.iter().map(|f| f.to_string()).collect(),
    })
}

async fn page_handler(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_page(session.turns(), None))
}

async fn chat_form_handler(
    State(state): State<AppState>,
    Form(request): Form<ChatRequest>,
) -> Html<String> {
    let mut session = state.session.lock().await;
    let banner = match session.submit(&state.pipeline, &request.question).await {
        Ok(_) => None,
        Err(e) => {
            error!("Chat request failed: {}", e);
            Some(e.user_message())
        }
    };
    Html(render_page(session.turns(), banner.as_deref()))
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    // Held for the whole run so queries are answered one at a time
    let mut session = state.session.lock().await;
    let turn = match session.submit(&state.pipeline, &request.question).await {
        Ok(Some(turn)) => turn,
        Ok(None) => return Err(PipelineError::EmptyQuestion.into()),
        Err(e) => {
            error!("Chat request failed: {}", e);
            return Err(e.into());
        }
    };

    Ok(Json(ChatResponse {
        turn,
        messages: session.turns().to_vec(),
    }))
}

async fn messages_handler(State(state): State<AppState>) -> Json<MessagesResponse> {
    let session = state.session.lock().await;
    Json(MessagesResponse {
        messages: session.turns().to_vec(),
    })
}
