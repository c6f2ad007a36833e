//! LLM provider handles: Gemini (primary), Ollama (local fallback), and a scripted mock.
//!
//! Handles are built explicitly from [`AiConfig`] and injected wherever a call is made;
//! nothing here is a process-wide global.

pub mod gemini;
pub mod mock;
pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ai::AiConfig;
use crate::error::ProviderError;

pub use gemini::GeminiProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Ollama => "Ollama",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling knobs passed unchanged to whichever provider serves the call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CallOptions {
    /// Near-deterministic, short JSON verdicts.
    pub const COMPLIANCE: CallOptions = CallOptions {
        temperature: 0.1,
        max_tokens: 100,
    };
    pub const GENERATION: CallOptions = CallOptions {
        temperature: 0.7,
        max_tokens: 1024,
    };
    pub const TOPICS: CallOptions = CallOptions {
        temperature: 0.4,
        max_tokens: 1024,
    };
}

/// A single remote (or fake) text-completion backend.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt` and return the raw free-text reply.
    async fn complete(&self, prompt: &str, opts: &CallOptions) -> Result<String, ProviderError>;
    fn kind(&self) -> ProviderKind;
}

pub type DynProvider = Arc<dyn LlmProvider>;

/// Canned mock-mode reply; parses as a compliance verdict, a generated post and a
/// topic list, so every action succeeds offline.
pub const MOCK_REPLY: &str = r#"{
  "isCompliant": true,
  "reason": "",
  "content": "Volatility is information, not a signal. What do you check before a big data release?",
  "topics": [
    { "label": "Volatility around data releases", "newsSource": "Mock Wire" },
    { "label": "Position sizing basics", "newsSource": "Mock Wire" }
  ]
}"#;

/// Primary + fallback pair as configured for this process.
#[derive(Clone)]
pub struct ProviderSet {
    pub primary: DynProvider,
    pub fallback: DynProvider,
}

impl ProviderSet {
    /// Build the provider pair according to config and environment variables.
    ///
    /// * `AI_TEST_MODE=mock`  → both providers are deterministic mocks answering [`MOCK_REPLY`].
    /// * `AI_TEST_MODE=error` → both providers fail with a network error.
    /// * otherwise Gemini primary + Ollama fallback.
    pub fn from_config(cfg: &AiConfig) -> anyhow::Result<Self> {
        match std::env::var("AI_TEST_MODE").ok().as_deref() {
            Some("mock") => {
                info!("AI_TEST_MODE=mock: using mock providers");
                return Ok(Self {
                    primary: Arc::new(MockProvider::always(ProviderKind::Gemini, MOCK_REPLY)),
                    fallback: Arc::new(MockProvider::always(ProviderKind::Ollama, MOCK_REPLY)),
                });
            }
            Some("error") => {
                info!("AI_TEST_MODE=error: using failing providers");
                return Ok(Self {
                    primary: Arc::new(MockProvider::failing(
                        ProviderKind::Gemini,
                        ProviderError::Network("AI_TEST_MODE=error".into()),
                    )),
                    fallback: Arc::new(MockProvider::failing(
                        ProviderKind::Ollama,
                        ProviderError::Network("AI_TEST_MODE=error".into()),
                    )),
                });
            }
            _ => {}
        }

        let timeout = (cfg.request_timeout_secs > 0)
            .then(|| Duration::from_secs(cfg.request_timeout_secs));
        let primary = GeminiProvider::new(&cfg.gemini, timeout)?;
        let fallback = OllamaProvider::new(&cfg.ollama, timeout)?;
        Ok(Self {
            primary: Arc::new(primary),
            fallback: Arc::new(fallback),
        })
    }
}

pub(crate) fn build_http(timeout: Option<Duration>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent("social-studio/0.1")
        .connect_timeout(Duration::from_secs(4));
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    Ok(builder.build()?)
}

/// First ~200 chars of an error body, single line, for error messages.
pub(crate) fn snippet(body: &str) -> String {
    let one_line: String = body
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(200)
        .collect();
    one_line.trim().to_string()
}

/// One-route HTTP stub on an ephemeral port, answering every request the same way.
#[cfg(test)]
pub(crate) async fn stub_server(status: axum::http::StatusCode, body: &'static str) -> String {
    let app = axum::Router::new().fallback(move || async move { (status, body) });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });
    format!("http://{addr}")
}
