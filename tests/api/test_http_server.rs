// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// HTTP routes over a mocked pipeline

use crate::common::*;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use medibot::api::{build_router, AppState};
use medibot::inference::CompletionError;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_answering(answer: &str) -> Router {
    let completion = Arc::new(MockCompletion::answering(answer));
    build_router(AppState::new(mock_pipeline(&HYPERTENSION_DOCS, completion)))
}

fn app_failing() -> Router {
    let completion = Arc::new(MockCompletion::failing(|| CompletionError::MissingToken {
        env_var: "HF_TOKEN".into(),
    }));
    build_router(AppState::new(mock_pipeline(&HYPERTENSION_DOCS, completion)))
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn form_request(question: &str) -> Request<Body> {
    let encoded: String = question
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => (b as char).to_string(),
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect();
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("question={}", encoded)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_health_reports_document_count() {
    let response = app_answering("Yes.").oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["indexed_documents"], 3);
    assert!(body["features"]
        .as_array()
        .unwrap()
        .contains(&json!("source-snippets")));
}

#[tokio::test]
async fn test_chat_returns_turn_and_transcript() {
    let app = app_answering("Hypertension is high blood pressure.");

    let response = app
        .clone()
        .oneshot(json_request("/v1/chat", json!({ "question": "What is hypertension?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["turn"]["role"], "assistant");
    assert!(body["turn"]["content"]
        .as_str()
        .unwrap()
        .contains("Source Docs"));
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "What is hypertension?");

    let response = app.oneshot(get("/v1/messages")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_blank_question_rejected() {
    let app = app_answering("unused");

    let response = app
        .clone()
        .oneshot(json_request("/v1/chat", json!({ "question": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_type"], "empty_question");

    let response = app.oneshot(get("/v1/messages")).await.unwrap();
    assert!(body_json(response).await["messages"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_malformed_json_body_rejected() {
    let app = app_answering("unused");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"question\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error_type"], "invalid_request");
    assert!(!body["message"].as_str().unwrap().is_empty());

    let response = app.oneshot(get("/v1/messages")).await.unwrap();
    assert!(body_json(response).await["messages"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_missing_question_field_rejected() {
    let response = app_answering("unused")
        .oneshot(json_request("/v1/chat", json!({ "query": "What is hypertension?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error_type"], "invalid_request");
}

#[tokio::test]
async fn test_failed_chat_keeps_user_turn() {
    let app = app_failing();

    let response = app
        .clone()
        .oneshot(json_request("/v1/chat", json!({ "question": "What is hypertension?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["error_type"], "auth_missing");
    assert!(body["message"].as_str().unwrap().starts_with("Error: "));

    let response = app.oneshot(get("/v1/messages")).await.unwrap();
    let messages = body_json(response).await["messages"].clone();
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn test_form_submit_renders_page() {
    let app = app_answering("I don't know the answer.");

    let response = app
        .clone()
        .oneshot(form_request("What is the capital of Mars?"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("What is the capital of Mars?"));
    assert!(page.contains("<p><b>Answer:</b> I don't know the answer.</p>"));
    assert!(!page.contains("Source Docs"));
    assert!(!page.contains("class=\"error\""));

    let page = body_text(app.oneshot(get("/")).await.unwrap()).await;
    assert!(page.contains("I don't know the answer."));
}

#[tokio::test]
async fn test_form_failure_shows_banner_once() {
    let app = app_failing();

    let page = body_text(
        app.clone()
            .oneshot(form_request("What is hypertension?"))
            .await
            .unwrap(),
    )
    .await;
    assert!(page.contains("class=\"error\""));
    assert!(page.contains("HF_TOKEN"));

    // The banner is transient; the stored transcript only has the question
    let page = body_text(app.oneshot(get("/")).await.unwrap()).await;
    assert!(!page.contains("class=\"error\""));
    assert!(page.contains("What is hypertension?"));
}
