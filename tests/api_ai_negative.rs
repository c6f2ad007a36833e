// tests/api_ai_negative.rs
//
// Provider failure paths through the real app() wiring (AI_TEST_MODE) and
// through injected scripted providers.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use social_studio::compliance::{BannedPhrases, MANUAL_REVIEW_REASON};
use social_studio::config::ai::{AiConfig, GeminiConfig, OllamaConfig};
use social_studio::providers::MockProvider;
use social_studio::{api, app, AppState, ProviderError, ProviderFallbackInvoker, ProviderKind};
use std::env;
use tower::ServiceExt; // for `oneshot`

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request");
    let resp = app.oneshot(req).await.expect("request failed");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[serial_test::serial]
#[tokio::test]
async fn compliance_with_both_providers_down_is_200_and_not_compliant() {
    env::set_var("AI_TEST_MODE", "error");
    let app = app().await.expect("failed to build app");
    env::remove_var("AI_TEST_MODE");

    let (status, v) = post(
        app,
        "/api/social/compliance",
        json!({ "content": "Data shows the Fed held rates steady." }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["isCompliant"], false);
    assert_eq!(v["reason"], MANUAL_REVIEW_REASON);
}

#[serial_test::serial]
#[tokio::test]
async fn generation_with_both_providers_down_surfaces_error() {
    env::set_var("AI_TEST_MODE", "error");
    let app = app().await.expect("failed to build app");
    env::remove_var("AI_TEST_MODE");

    let (status, v) = post(
        app,
        "/api/social",
        json!({
            "topic": "Risk management",
            "platform": "linkedin",
            "persona": "Coach",
            "includeEmojis": true,
            "additionalContext": null
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["kind"], "network_failure");
    assert!(!v["error"].as_str().unwrap_or("").is_empty());
}

#[serial_test::serial]
#[tokio::test]
async fn mock_mode_app_answers_compliant() {
    env::set_var("AI_TEST_MODE", "mock");
    let app = app().await.expect("failed to build app");
    env::remove_var("AI_TEST_MODE");

    let (status, v) = post(
        app,
        "/api/social/compliance",
        json!({ "content": "What is a volatility index?" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["isCompliant"], true);
}

#[serial_test::serial]
#[tokio::test]
async fn mock_mode_app_generates_and_discovers() {
    env::set_var("AI_TEST_MODE", "mock");
    let app = app().await.expect("failed to build app");
    env::remove_var("AI_TEST_MODE");

    let (status, v) = post(
        app.clone(),
        "/api/social",
        json!({
            "topic": "Volatility",
            "platform": "twitter",
            "persona": "Coach",
            "includeEmojis": false
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{v}");
    assert_eq!(v["provider"], "Gemini");
    assert!(!v["content"].as_str().unwrap_or("").is_empty());

    let (status, v) = post(app, "/api/social/topics", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["source"], "gemini");
}

#[serial_test::serial]
#[tokio::test]
async fn unreachable_providers_never_echo_the_api_key() {
    env::remove_var("AI_TEST_MODE");
    let cfg = AiConfig {
        gemini: GeminiConfig {
            api_key: "SECRET".into(),
            model: "gemini-pro".into(),
            base_url: "http://127.0.0.1:9".into(),
        },
        ollama: OllamaConfig {
            base_url: "http://127.0.0.1:9".into(),
            model: "llama3.2:3b".into(),
        },
        request_timeout_secs: 5,
    };
    let state = AppState::from_config(&cfg, BannedPhrases::default()).expect("state");

    let (status, v) = post(
        api::router(state),
        "/api/social",
        json!({
            "topic": "Rate decisions",
            "platform": "linkedin",
            "persona": "Coach",
            "includeEmojis": false
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["kind"], "network_failure");
    assert!(!v.to_string().contains("SECRET"), "{v}");
}

#[tokio::test]
async fn primary_failure_hits_fallback_once_with_same_prompt() {
    let primary = Arc::new(MockProvider::failing(
        ProviderKind::Gemini,
        ProviderError::QuotaExceeded("429 quota".into()),
    ));
    let fallback = Arc::new(MockProvider::always(
        ProviderKind::Ollama,
        r#"{"isCompliant": false, "reason": "Implied trade signal"}"#,
    ));
    let inv = ProviderFallbackInvoker::new(primary.clone(), fallback.clone());
    let app = api::router(AppState::new(inv, BannedPhrases::default()));

    let (status, v) = post(
        app,
        "/api/social/compliance",
        json!({ "content": "This chart pattern never fails." }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["isCompliant"], false);
    assert_eq!(v["reason"], "Implied trade signal");
    assert_eq!(primary.call_count(), 1);
    assert_eq!(fallback.call_count(), 1);
    assert_eq!(primary.calls(), fallback.calls());
}

#[tokio::test]
async fn malformed_primary_reply_is_not_retried() {
    let primary = Arc::new(MockProvider::always(ProviderKind::Gemini, "Sure, looks compliant to me!"));
    let fallback = Arc::new(MockProvider::always(
        ProviderKind::Ollama,
        r#"{"isCompliant": true, "reason": ""}"#,
    ));
    let inv = ProviderFallbackInvoker::new(primary.clone(), fallback.clone());
    let app = api::router(AppState::new(inv, BannedPhrases::default()));

    let (status, v) = post(
        app,
        "/api/social/compliance",
        json!({ "content": "Understanding margin requirements." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["isCompliant"], true);
    assert_eq!(primary.call_count(), 1);
    assert_eq!(fallback.call_count(), 1);
}
