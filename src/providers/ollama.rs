use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{build_http, snippet, CallOptions, LlmProvider, ProviderKind};
use crate::config::ai::OllamaConfig;
use crate::error::ProviderError;

/// Local Ollama daemon, non-streaming `/api/generate`.
pub struct OllamaProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(cfg: &OllamaConfig, timeout: Option<Duration>) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError> {
        let req = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: opts.temperature,
                num_predict: opts.max_tokens,
            },
        };

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::QuotaExceeded(format!(
                "ollama 429: {}",
                snippet(&body)
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Network(format!(
                "ollama {status}: {}",
                snippet(&body)
            )));
        }

        let body: OllamaResponse = resp.json().await?;
        Ok(body.response.trim().to_string())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }
}
