use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{build_http, snippet, CallOptions, LlmProvider, ProviderKind};
use crate::config::ai::GeminiConfig;
use crate::error::ProviderError;

/// Google Gemini via the `generateContent` REST endpoint.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(cfg: &GeminiConfig, timeout: Option<Duration>) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<RespContent>,
}

#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: String,
}

/// Concatenated text of the first candidate, or `None` when the reply was blocked/empty.
fn first_candidate_text(resp: Resp) -> Option<String> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Unavailable("GEMINI_API_KEY not set".into()));
        }

        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: opts.temperature,
                max_output_tokens: opts.max_tokens,
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::QuotaExceeded(format!(
                "gemini 429: {}",
                snippet(&body)
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Network(format!(
                "gemini {status}: {}",
                snippet(&body)
            )));
        }

        let body: Resp = resp.json().await?;
        first_candidate_text(body)
            .ok_or_else(|| ProviderError::MalformedResponse("gemini returned no candidate text".into()))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}
