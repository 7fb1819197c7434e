// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Query pipeline: retrieval, prompt formatting, source policy, error mapping

use crate::common::*;
use medibot::inference::CompletionError;
use medibot::rag::{PipelineError, PipelineSettings, QueryPipeline, RagContext};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_hypertension_answer_shows_three_sources() {
    let completion = Arc::new(MockCompletion::answering(
        "Hypertension is high blood pressure.",
    ));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion.clone());

    let outcome = pipeline.run("What is hypertension?").await.unwrap();

    assert_eq!(outcome.answer(), "Hypertension is high blood pressure.");
    assert_eq!(outcome.response.source_documents.len(), 3);
    assert_eq!(outcome.snippets.len(), 3);

    let html = outcome.to_html();
    assert!(html.starts_with("<p><b>Answer:</b> Hypertension is high blood pressure.</p>"));
    assert!(html.contains("<b>Source Docs:</b>"));
    assert_eq!(html.matches("<div style=").count(), 3);
}

#[tokio::test]
async fn test_refusal_hides_sources() {
    let completion = Arc::new(MockCompletion::answering("I don't know the answer."));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion);

    let turn = pipeline.answer("What is the capital of Mars?").await.unwrap();

    assert_eq!(turn.content(), "<p><b>Answer:</b> I don't know the answer.</p>");
}

#[tokio::test]
async fn test_refusal_match_ignores_case() {
    let completion = Arc::new(MockCompletion::answering(
        "The context DOES NOT PROVIDE that information.",
    ));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion);

    let outcome = pipeline.run("Who discovered insulin?").await.unwrap();
    assert!(!outcome.shows_sources());
}

#[tokio::test]
async fn test_no_documents_no_source_block() {
    let completion = Arc::new(MockCompletion::answering("Blood pressure is measured in mmHg."));
    let pipeline = mock_pipeline(&[], completion.clone());

    let outcome = pipeline.run("How is blood pressure measured?").await.unwrap();

    assert!(!outcome.shows_sources());
    assert!(!outcome.to_html().contains("Source Docs"));
    // The prompt is still sent, with an empty context
    assert!(completion.last_prompt().unwrap().contains("Context: \n"));
}

#[tokio::test]
async fn test_prompt_carries_context_and_question() {
    let completion = Arc::new(MockCompletion::answering("Yes."));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion.clone());

    pipeline.run("What is hypertension?").await.unwrap();

    let prompt = completion.last_prompt().unwrap();
    assert!(prompt.contains("Question: What is hypertension?"));
    for doc in HYPERTENSION_DOCS {
        assert!(prompt.contains(doc));
    }
}

#[tokio::test]
async fn test_top_k_limits_retrieval() {
    let completion = Arc::new(MockCompletion::answering("Yes."));
    let docs = ["one", "two", "three", "four", "five"];
    let pipeline = mock_pipeline(&docs, completion.clone());

    let outcome = pipeline.run("Count?").await.unwrap();
    assert_eq!(outcome.response.source_documents.len(), 3);
    assert!(!completion.last_prompt().unwrap().contains("four"));
}

#[tokio::test]
async fn test_long_sources_truncated() {
    let long = "x".repeat(900);
    let completion = Arc::new(MockCompletion::answering("Yes."));
    let pipeline = mock_pipeline(&[long.as_str()], completion);

    let outcome = pipeline.run("Long?").await.unwrap();
    assert_eq!(outcome.snippets[0].chars().count(), 403);
    assert!(outcome.snippets[0].ends_with("..."));
    assert_eq!(outcome.response.source_documents[0].text.len(), 900);
}

#[tokio::test]
async fn test_answer_is_trimmed() {
    let completion = Arc::new(MockCompletion::answering("\n  Rest and fluids.  \n"));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion);

    let outcome = pipeline.run("Treatment?").await.unwrap();
    assert_eq!(outcome.answer(), "Rest and fluids.");
}

#[tokio::test]
async fn test_empty_question_rejected_before_completion() {
    let completion = Arc::new(MockCompletion::answering("unused"));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion.clone());

    let err = pipeline.run("   ").await.unwrap_err();
    assert_eq!(err, PipelineError::EmptyQuestion);
    assert_eq!(completion.prompt_count(), 0);
}

#[tokio::test]
async fn test_missing_token_maps_to_auth_missing() {
    let completion = Arc::new(MockCompletion::failing(|| CompletionError::MissingToken {
        env_var: "HF_TOKEN".to_string(),
    }));
    let pipeline = mock_pipeline(&HYPERTENSION_DOCS, completion);

    let err = pipeline.run("What is hypertension?").await.unwrap_err();
    assert!(matches!(err, PipelineError::AuthMissing(_)));
    assert!(err.user_message().starts_with("Error: "));
    assert!(err.user_message().contains("HF_TOKEN"));
}

#[tokio::test]
async fn test_provider_errors_map_to_variants() {
    let cases: Vec<(fn() -> CompletionError, &str)> = vec![
        (
            || CompletionError::Unauthorized {
                status: 401,
                message: "bad token".into(),
            },
            "AUTH_MISSING",
        ),
        (
            || CompletionError::PayloadTooLarge {
                status: 413,
                message: "input too long".into(),
            },
            "REQUEST_TOO_LARGE",
        ),
        (
            || CompletionError::Unavailable {
                message: "connection refused".into(),
            },
            "PROVIDER_UNAVAILABLE",
        ),
        (
            || CompletionError::InvalidResponse("not json".into()),
            "UNKNOWN",
        ),
    ];

    for (error, code) in cases {
        let pipeline = mock_pipeline(&HYPERTENSION_DOCS, Arc::new(MockCompletion::failing(error)));
        let err = pipeline.run("What is hypertension?").await.unwrap_err();
        assert_eq!(err.error_code(), code);
    }
}

#[tokio::test]
async fn test_embedding_failure_is_provider_unavailable() {
    let completion = Arc::new(MockCompletion::answering("unused"));
    let context = RagContext::with_resources(
        Arc::new(MockEmbedder::failing()),
        Arc::new(MockRetriever::new(&HYPERTENSION_DOCS)),
        completion.clone(),
    );
    let pipeline = QueryPipeline::new(Arc::new(context), PipelineSettings::default());

    let err = pipeline.run("What is hypertension?").await.unwrap_err();
    assert!(matches!(err, PipelineError::ProviderUnavailable(_)));
    assert_eq!(completion.prompt_count(), 0);
}

#[tokio::test]
async fn test_handles_loaded_once_across_queries() {
    let loader = Arc::new(CountingLoader::new(&HYPERTENSION_DOCS));
    let completion = Arc::new(MockCompletion::answering("Yes."));
    let context = Arc::new(RagContext::new(loader.clone(), completion));
    let pipeline = QueryPipeline::new(context.clone(), PipelineSettings::default());

    assert_eq!(context.document_count(), None);
    for _ in 0..5 {
        pipeline.run("What is hypertension?").await.unwrap();
    }

    assert_eq!(loader.embedder_loads.load(Ordering::SeqCst), 1);
    assert_eq!(loader.index_loads.load(Ordering::SeqCst), 1);
    assert_eq!(context.document_count(), Some(3));
}

#[tokio::test]
async fn test_warm_loads_before_first_query() {
    let loader = Arc::new(CountingLoader::new(&HYPERTENSION_DOCS));
    let context = RagContext::new(loader.clone(), Arc::new(MockCompletion::answering("Yes.")));

    context.warm().await.unwrap();
    context.warm().await.unwrap();

    assert_eq!(loader.embedder_loads.load(Ordering::SeqCst), 1);
    assert_eq!(loader.index_loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_index_is_index_load_failed() {
    let loader = Arc::new(CountingLoader::missing_index());
    let context = Arc::new(RagContext::new(
        loader.clone(),
        Arc::new(MockCompletion::answering("unused")),
    ));
    let pipeline = QueryPipeline::new(context.clone(), PipelineSettings::default());

    let err = pipeline.run("What is hypertension?").await.unwrap_err();
    assert!(matches!(err, PipelineError::IndexLoadFailed(_)));
    assert!(context.warm().await.is_err());

    // A failed load is not memoized
    assert_eq!(loader.index_loads.load(Ordering::SeqCst), 2);
}
