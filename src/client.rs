//! HTTP client for the social endpoints (what the dashboard calls).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::compliance::{ComplianceCheck, ComplianceVerdict, FallbackPolicy};
use crate::error::{classify_message, ErrorKind};
use crate::generation::{ContentRequest, GenerationResult, Platform};
use crate::topics::cache::TopicFetcher;
use crate::topics::TopicsPayload;

#[derive(Clone)]
pub struct SocialClient {
    base_url: String,
    http: Client,
}

/// Generation failure as the dashboard sees it: the server's message plus a toast class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_message(&message),
            message,
        }
    }

    pub fn toast(&self) -> &'static str {
        self.kind.toast()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    detail: String,
    #[serde(default)]
    kind: Option<ErrorKind>,
}

/// One post per platform from a single generation action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPair {
    pub linkedin: GenerationResult,
    pub twitter: GenerationResult,
}

impl SocialClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent("social-studio-client/0.1")
            .connect_timeout(Duration::from_secs(4))
            .build()?;
        Ok(Self::with_http(base_url, http))
    }

    pub fn with_http(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Client pre-check. Any request/decode error yields the permissive policy verdict.
    pub async fn check_compliance(&self, content: &str) -> ComplianceVerdict {
        match self.try_check_compliance(content).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "client", error = %format!("{e:#}"), "compliance pre-check failed");
                FallbackPolicy::ClientPrecheckPermissive.verdict()
            }
        }
    }

    async fn try_check_compliance(&self, content: &str) -> Result<ComplianceVerdict> {
        let resp = self
            .http
            .post(self.url("/api/social/compliance"))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .context("post /api/social/compliance")?
            .error_for_status()
            .context("compliance non-2xx")?;
        resp.json().await.context("decode compliance verdict")
    }

    pub async fn generate(&self, req: &ContentRequest) -> Result<GenerationResult, ClientError> {
        let resp = self
            .http
            .post(self.url("/api/social"))
            .json(req)
            .send()
            .await
            .map_err(|e| ClientError::from_message(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body: Option<ErrorBody> = resp.json().await.ok();
            let kind = body.as_ref().and_then(|b| b.kind);
            let msg = match body {
                Some(b) if !b.detail.is_empty() => b.detail,
                Some(b) if !b.error.is_empty() => b.error,
                _ => format!("generation failed with status {status}"),
            };
            let mut err = ClientError::from_message(msg);
            if let Some(k) = kind {
                err.kind = k;
            }
            return Err(err);
        }
        resp.json()
            .await
            .map_err(|e| ClientError::from_message(format!("unexpected response json: {e}")))
    }

    /// LinkedIn + Twitter concurrently; either failing fails the whole attempt.
    pub async fn generate_both(
        &self,
        topic: &str,
        persona: &str,
        include_emojis: bool,
        additional_context: Option<&str>,
    ) -> Result<PlatformPair, ClientError> {
        let make = |platform: Platform| ContentRequest {
            topic: topic.to_string(),
            platform,
            persona: persona.to_string(),
            include_emojis,
            additional_context: additional_context.map(str::to_string),
        };
        let li = make(Platform::Linkedin);
        let tw = make(Platform::Twitter);
        let (linkedin, twitter) = tokio::try_join!(self.generate(&li), self.generate(&tw))?;
        Ok(PlatformPair { linkedin, twitter })
    }

    pub async fn topics(&self, force: bool) -> Result<TopicsPayload> {
        let url = self.url("/api/social/topics");
        let req = if force {
            self.http.post(url)
        } else {
            self.http.get(url)
        };
        let resp = req
            .send()
            .await
            .context("request /api/social/topics")?
            .error_for_status()
            .context("topics non-2xx")?;
        resp.json().await.context("decode topics payload")
    }
}

#[async_trait::async_trait]
impl TopicFetcher for SocialClient {
    async fn fetch_topics(&self, force: bool) -> Result<TopicsPayload> {
        self.topics(force).await
    }
}

#[async_trait::async_trait]
impl ComplianceCheck for SocialClient {
    async fn check_content(&self, content: &str) -> ComplianceVerdict {
        self.check_compliance(content).await
    }
}
