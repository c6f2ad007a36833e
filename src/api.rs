use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::compliance::{BannedPhrases, ComplianceChecker, TECHNICAL_ERROR_REASON};
use crate::config::ai::AiConfig;
use crate::config::compliance::load_banned_phrases_default;
use crate::error::ErrorKind;
use crate::generation::{ContentGenerator, ContentRequest};
use crate::invoker::ProviderFallbackInvoker;
use crate::providers::ProviderSet;
use crate::topics::TopicService;

#[derive(Clone)]
pub struct AppState {
    pub compliance: Arc<ComplianceChecker>,
    pub generator: Arc<ContentGenerator>,
    pub topics: Arc<TopicService>,
}

impl AppState {
    /// Wire every service to the same injected provider pair.
    pub fn new(invoker: ProviderFallbackInvoker, banned: BannedPhrases) -> Self {
        Self {
            compliance: Arc::new(ComplianceChecker::new(invoker.clone(), banned)),
            generator: Arc::new(ContentGenerator::new(invoker.clone())),
            topics: Arc::new(TopicService::new(invoker)),
        }
    }

    pub fn from_config(cfg: &AiConfig, banned: BannedPhrases) -> anyhow::Result<Self> {
        let set = ProviderSet::from_config(cfg)?;
        Ok(Self::new(ProviderFallbackInvoker::from_set(set), banned))
    }

    /// `config/ai.json` + `config/compliance.toml` (or their env overrides / defaults).
    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = AiConfig::load_default()?;
        info!(
            "AI cfg loaded: gemini_model={}, ollama={} ({}), key_len={}",
            cfg.gemini.model,
            cfg.ollama.base_url,
            cfg.ollama.model,
            cfg.gemini.api_key.len()
        );
        let banned = BannedPhrases::new(load_banned_phrases_default()?);
        Self::from_config(&cfg, banned)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/social", post(generate))
        .route("/api/social/compliance", post(check_compliance))
        .route("/api/social/topics", get(topics_passive).post(topics_forced))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn error_json(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn check_compliance(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(target: "api", error = %e, "compliance body unreadable");
            return error_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Failed to check compliance",
                    "isCompliant": false,
                    "reason": TECHNICAL_ERROR_REASON,
                }),
            );
        }
    };

    let content = match parsed.get("content").and_then(Value::as_str) {
        Some(c) if !c.trim().is_empty() => c,
        _ => {
            return error_json(
                StatusCode::BAD_REQUEST,
                json!({ "error": "Content is required and must be a string" }),
            )
        }
    };

    let outcome = state.compliance.check(content).await;
    info!(
        target: "api",
        compliant = outcome.verdict.is_compliant,
        provider = ?outcome.provider,
        policy = ?outcome.policy_applied,
        "compliance checked"
    );
    Json(outcome.verdict).into_response()
}

async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let validation = |detail: String| {
        error_json(
            StatusCode::BAD_REQUEST,
            json!({
                "error": ErrorKind::ValidationFailure.toast(),
                "kind": ErrorKind::ValidationFailure,
                "detail": detail,
            }),
        )
    };

    let req: ContentRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return validation(format!("invalid request body (missing field?): {e}")),
    };
    if let Err(e) = req.validate() {
        return validation(e.to_string());
    }

    match state.generator.generate(&req).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_json(
            StatusCode::BAD_GATEWAY,
            json!({
                "error": e.toast(),
                "kind": e.kind(),
                "detail": e.to_string(),
            }),
        ),
    }
}

async fn topics_passive(State(state): State<AppState>) -> Response {
    Json(state.topics.current(Utc::now()).await).into_response()
}

async fn topics_forced(State(state): State<AppState>) -> Response {
    Json(state.topics.refresh(Utc::now()).await).into_response()
}
