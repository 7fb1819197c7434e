// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::config::AppConfig;
use crate::rag::{AnswerOutcome, ChatSession};

/// Arguments for the ask command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// Question to answer
    pub question: String,
}

/// Plain-text rendering of an outcome for the terminal
pub fn format_outcome(outcome: &AnswerOutcome) -> String {
    let mut out = format!("Answer: {}\n", outcome.answer());
    if outcome.shows_sources() {
        out.push_str("\nSource Docs:\n");
        for (i, snippet) in outcome.snippets.iter().enumerate() {
            out.push_str(&format!("  [{}] {}\n", i + 1, snippet));
        }
    }
    out
}

pub async fn ask(config: &AppConfig, args: AskArgs) -> Result<()> {
    let pipeline = config.build_pipeline()?;
    let outcome = pipeline
        .run(&args.question)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    print!("{}", format_outcome(&outcome));
    Ok(())
}

pub async fn chat(config: &AppConfig) -> Result<()> {
    let pipeline = config.build_pipeline()?;
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Ask Chatbot! Type a question, or an empty line to skip. Ctrl-D exits.");
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        match session.submit_with_outcome(&pipeline, &line).await {
            Ok(Some((_, outcome))) => println!("{}", format_outcome(&outcome)),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }

    info!("Chat ended after {} turns", session.len());
    Ok(())
}
