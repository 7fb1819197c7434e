// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use medibot::{
    api::{serve, AppState},
    config::AppConfig,
    version,
};
use std::{env, path::PathBuf};
use tokio::{net::TcpListener, signal};
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("Starting {}...\n", version::get_version_string());

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let pipeline = config.build_pipeline()?;

    // Load the embedder and index now; a broken artifact stops startup
    println!("Loading embedding model and vector index...");
    if let Err(e) = pipeline.context().warm().await {
        error!("Startup failed [{}]: {}", e.error_code(), e);
        return Err(anyhow::anyhow!(e.user_message()));
    }
    let documents = pipeline.context().document_count().unwrap_or(0);
    println!("Index ready: {} documents", documents);

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    let addr = listener.local_addr()?;

    let separator = "=".repeat(60);
    println!("\n{}", separator);
    println!("Model:          {}", config.completion.repo_id);
    println!("Index:          {}", config.index.path.display());
    println!("\nEndpoints:");
    println!("  Chat UI:      http://{}/", addr);
    println!("  Health:       http://{}/health", addr);
    println!("  Chat API:     POST http://{}/v1/chat", addr);
    println!("  Transcript:   http://{}/v1/messages", addr);
    println!("\nPress Ctrl+C to shutdown...");
    println!("{}\n", separator);

    serve(listener, AppState::new(pipeline), async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        println!("\nShutting down...");
    })
    .await?;

    println!("Goodbye!");
    Ok(())
}
