//! Compliance screening for generated social copy.
//!
//! Order of checks:
//! 1. local banned-phrase screen (deterministic, no provider call),
//! 2. LLM verdict through the fallback invoker,
//! 3. `FallbackPolicy::ServerFailSafe` when both providers fail.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::compliance::DEFAULT_BANNED_PHRASES;
use crate::error::ProviderError;
use crate::invoker::{parse_json_reply, Action, ProviderFallbackInvoker};
use crate::providers::{CallOptions, ProviderKind};

pub const MANUAL_REVIEW_REASON: &str =
    "Unable to verify compliance due to technical issues. Please review content manually.";
pub const TECHNICAL_ERROR_REASON: &str = "Technical error occurred during compliance check";
const GENERIC_FLAG_REASON: &str = "Flagged by compliance check";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub is_compliant: bool,
    #[serde(default)]
    pub reason: String,
}

impl ComplianceVerdict {
    pub fn compliant() -> Self {
        Self {
            is_compliant: true,
            reason: String::new(),
        }
    }

    pub fn flagged(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            is_compliant: false,
            reason: if reason.trim().is_empty() {
                GENERIC_FLAG_REASON.to_string()
            } else {
                reason
            },
        }
    }

    /// Compliant verdicts never carry a reason; flagged ones always do.
    fn normalized(self) -> Self {
        if self.is_compliant {
            Self::compliant()
        } else {
            Self::flagged(self.reason)
        }
    }
}

/// What to answer when no provider produced a verdict.
///
/// The two policies disagree: the server fails safe, the client's pre-check lets
/// content through. Both stay as-is pending a product decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// `POST /api/social/compliance` when both providers fail.
    ServerFailSafe,
    /// Client-side pre-check when the compliance request itself errors.
    ClientPrecheckPermissive,
}

impl FallbackPolicy {
    pub fn verdict(self) -> ComplianceVerdict {
        match self {
            FallbackPolicy::ServerFailSafe => ComplianceVerdict {
                is_compliant: false,
                reason: MANUAL_REVIEW_REASON.to_string(),
            },
            FallbackPolicy::ClientPrecheckPermissive => ComplianceVerdict::compliant(),
        }
    }
}

/// Anything that can produce a verdict for a piece of content.
#[async_trait::async_trait]
pub trait ComplianceCheck: Send + Sync {
    async fn check_content(&self, content: &str) -> ComplianceVerdict;
}

// ------------------------------------------------------------
// Banned-phrase screen
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BannedPhrases {
    phrases: Vec<String>,
}

impl Default for BannedPhrases {
    fn default() -> Self {
        Self::new(DEFAULT_BANNED_PHRASES.iter().map(|s| s.to_string()))
    }
}

impl BannedPhrases {
    pub fn new<I: IntoIterator<Item = String>>(phrases: I) -> Self {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(&p))
            .filter(|p| !p.trim().is_empty())
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> Vec<String> {
        self.phrases.iter().map(|p| p.trim().to_string()).collect()
    }

    /// First banned phrase found in `text` (whole words, case/whitespace-insensitive).
    pub fn first_hit(&self, text: &str) -> Option<String> {
        let t = normalize(text);
        self.phrases
            .iter()
            .find(|p| t.contains(p.as_str()))
            .map(|p| p.trim().to_string())
    }
}

/// Lowercase, map punctuation to spaces, collapse runs, and pad with one space on
/// each side so `contains(" go long ")` only matches whole words.
fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for ch in input.chars() {
        let lc = ch.to_lowercase().next().unwrap_or(ch);
        if lc.is_alphanumeric() || lc == '\'' {
            out.push(lc);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

// ------------------------------------------------------------
// Prompt
// ------------------------------------------------------------

pub fn build_compliance_prompt(content: &str, banned: &BannedPhrases) -> String {
    let phrase_list = banned
        .phrases()
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a compliance checker for financial content. Analyze the following content and determine if it contains direct buy/sell signals, investment advice, or trading recommendations.

CONTENT TO CHECK:
"{content}"

COMPLIANCE RULES:
1. Content should NOT contain direct buy/sell recommendations
2. Content should NOT tell people to invest in specific assets
3. Content should NOT use phrases like {phrase_list}
4. Content should focus on education, analysis, and general market insights
5. Neutral language like "analysts suggest", "data shows", "according to reports" is acceptable
6. Questions to engage discussion are acceptable

RESPONSE FORMAT:
Respond with ONLY a JSON object in this exact format:
{{
  "isCompliant": true/false,
  "reason": "Brief explanation if not compliant, empty string if compliant"
}}

Do not include any other text, explanations, or formatting - just the JSON object."#
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    is_compliant: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub fn parse_verdict(text: &str) -> Result<ComplianceVerdict, ProviderError> {
    let raw: RawVerdict = parse_json_reply(text)?;
    Ok(ComplianceVerdict {
        is_compliant: raw.is_compliant,
        reason: raw.reason.unwrap_or_default(),
    }
    .normalized())
}

// ------------------------------------------------------------
// Checker
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub verdict: ComplianceVerdict,
    /// Provider that produced the verdict; `None` for the local screen or a fallback policy.
    pub provider: Option<ProviderKind>,
    pub policy_applied: Option<FallbackPolicy>,
}

#[derive(Clone)]
pub struct ComplianceChecker {
    invoker: ProviderFallbackInvoker,
    banned: BannedPhrases,
}

impl ComplianceChecker {
    pub fn new(invoker: ProviderFallbackInvoker, banned: BannedPhrases) -> Self {
        Self { invoker, banned }
    }

    pub async fn check(&self, content: &str) -> CheckOutcome {
        if let Some(phrase) = self.banned.first_hit(content) {
            info!(target: "compliance", phrase = %phrase, "banned phrase hit");
            return CheckOutcome {
                verdict: ComplianceVerdict::flagged(format!(
                    "Contains direct financial advice phrasing: \"{phrase}\""
                )),
                provider: None,
                policy_applied: None,
            };
        }

        let prompt = build_compliance_prompt(content, &self.banned);
        match self
            .invoker
            .invoke(
                Action::CheckCompliance,
                &prompt,
                &CallOptions::COMPLIANCE,
                parse_verdict,
            )
            .await
        {
            Ok(out) => CheckOutcome {
                verdict: out.value,
                provider: Some(out.provider),
                policy_applied: None,
            },
            Err(e) => {
                warn!(target: "compliance", error = %e, "falling back to manual review verdict");
                metrics::counter!("compliance_safe_default_total").increment(1);
                CheckOutcome {
                    verdict: FallbackPolicy::ServerFailSafe.verdict(),
                    provider: None,
                    policy_applied: Some(FallbackPolicy::ServerFailSafe),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ComplianceCheck for ComplianceChecker {
    async fn check_content(&self, content: &str) -> ComplianceVerdict {
        self.check(content).await.verdict
    }
}
