//! Provider-fallback invoker: primary → fallback → caller-supplied default.
//!
//! A reply that does not parse is treated exactly like a failed call: it sends the
//! request to the fallback and is never retried against the same provider.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{ErrorKind, ProviderError};
use crate::providers::{CallOptions, DynProvider, ProviderKind, ProviderSet};

/// What the call is for. Used for logs and metric labels only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Generate,
    CheckCompliance,
    DiscoverTopics,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Generate => "generate",
            Action::CheckCompliance => "check_compliance",
            Action::DiscoverTopics => "discover_topics",
        }
    }
}

/// A parsed value plus the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoked<T> {
    pub value: T,
    pub provider: ProviderKind,
}

/// Both providers failed. Both errors are kept for diagnostics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("all providers failed (primary: {primary}; fallback: {fallback})")]
pub struct FallbackFailure {
    pub primary: ProviderError,
    pub fallback: ProviderError,
}

impl FallbackFailure {
    /// Classification of the last error seen (the fallback's).
    pub fn kind(&self) -> ErrorKind {
        self.fallback.kind()
    }

    pub fn toast(&self) -> &'static str {
        self.kind().toast()
    }
}

#[derive(Clone)]
pub struct ProviderFallbackInvoker {
    primary: DynProvider,
    fallback: DynProvider,
}

impl ProviderFallbackInvoker {
    pub fn new(primary: DynProvider, fallback: DynProvider) -> Self {
        Self { primary, fallback }
    }

    pub fn from_set(set: ProviderSet) -> Self {
        Self::new(set.primary, set.fallback)
    }

    /// Run `prompt` through primary, then fallback, parsing each reply with `parse`.
    pub async fn invoke<T, F>(
        &self,
        action: Action,
        prompt: &str,
        opts: &CallOptions,
        parse: F,
    ) -> Result<Invoked<T>, FallbackFailure>
    where
        F: Fn(&str) -> Result<T, ProviderError>,
    {
        let primary_err = match attempt(&self.primary, action, prompt, opts, &parse).await {
            Ok(value) => {
                return Ok(Invoked {
                    value,
                    provider: self.primary.kind(),
                })
            }
            Err(e) => e,
        };

        warn!(
            target: "invoker",
            action = action.as_str(),
            provider = %self.primary.kind(),
            error = %primary_err,
            "primary provider failed, falling back"
        );
        counter!("llm_fallback_total", "action" => action.as_str()).increment(1);

        match attempt(&self.fallback, action, prompt, opts, &parse).await {
            Ok(value) => Ok(Invoked {
                value,
                provider: self.fallback.kind(),
            }),
            Err(fallback_err) => {
                warn!(
                    target: "invoker",
                    action = action.as_str(),
                    primary = %primary_err,
                    fallback = %fallback_err,
                    "both providers failed"
                );
                Err(FallbackFailure {
                    primary: primary_err,
                    fallback: fallback_err,
                })
            }
        }
    }
}

async fn attempt<T, F>(
    provider: &DynProvider,
    action: Action,
    prompt: &str,
    opts: &CallOptions,
    parse: &F,
) -> Result<T, ProviderError>
where
    F: Fn(&str) -> Result<T, ProviderError>,
{
    let kind = provider.kind();
    let result = match provider.complete(prompt, opts).await {
        Ok(text) => parse(&text),
        Err(e) => Err(e),
    };
    let outcome = match &result {
        Ok(_) => "ok",
        Err(ProviderError::MalformedResponse(_)) => "malformed",
        Err(_) => "error",
    };
    counter!(
        "llm_provider_calls_total",
        "provider" => kind.as_str(),
        "action" => action.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    if result.is_ok() {
        info!(target: "invoker", action = action.as_str(), provider = %kind, "provider call succeeded");
    }
    result
}

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("fence regex"));

/// Pull the single JSON object out of a model reply.
/// Tolerates surrounding whitespace, a Markdown code fence, and chatter around the braces.
pub fn extract_json_object(text: &str) -> Result<&str, ProviderError> {
    let mut t = text.trim();
    if let Some(c) = RE_FENCE.captures(t).and_then(|c| c.get(1)) {
        t = c.as_str();
    }
    let start = t.find('{');
    let end = t.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&t[s..=e]),
        _ => Err(ProviderError::MalformedResponse(format!(
            "no JSON object in reply: {}",
            crate::providers::snippet(text)
        ))),
    }
}

/// `extract_json_object` + typed deserialization; any failure is `MalformedResponse`.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    let obj = extract_json_object(text)?;
    serde_json::from_str(obj)
        .map_err(|e| ProviderError::MalformedResponse(format!("json parse: {e}")))
}
