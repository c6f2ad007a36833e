//! Social post generation (LinkedIn / Twitter) through the fallback invoker.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProviderError;
use crate::invoker::{parse_json_reply, Action, FallbackFailure, ProviderFallbackInvoker};
use crate::providers::{CallOptions, ProviderKind};
use crate::topics::detect_topic_category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Twitter,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
        }
    }

    pub fn max_chars(self) -> usize {
        match self {
            Platform::Linkedin => 1300,
            Platform::Twitter => 280,
        }
    }

    fn style_rules(self) -> &'static str {
        match self {
            Platform::Linkedin => {
                "- Professional, insightful tone\n\
                 - 3 to 5 short paragraphs separated by blank lines\n\
                 - End with a question that invites discussion\n\
                 - At most 3 relevant hashtags at the end"
            }
            Platform::Twitter => {
                "- Punchy, conversational tone\n\
                 - A single tweet, no thread numbering\n\
                 - At most 2 relevant hashtags"
            }
        }
    }
}

/// One user-initiated generation action. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub topic: String,
    pub platform: Platform,
    pub persona: String,
    #[serde(default)]
    pub include_emojis: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl ContentRequest {
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.topic.trim().is_empty() {
            return Err(ProviderError::Validation("topic".into()));
        }
        if self.persona.trim().is_empty() {
            return Err(ProviderError::Validation("persona".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub provider: ProviderKind,
}

pub fn build_generation_prompt(req: &ContentRequest) -> String {
    let platform = req.platform;
    let emoji_rule = if req.include_emojis {
        "Use a few relevant emojis where they add clarity."
    } else {
        "Do not use any emojis."
    };
    let context = match req.additional_context.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => format!("\nADDITIONAL CONTEXT:\n{c}\n"),
        _ => String::new(),
    };
    let category = detect_topic_category(&req.topic)
        .map(|c| format!("CATEGORY: {c}\n"))
        .unwrap_or_default();

    format!(
        r#"You are writing a {platform_name} post for a trading-education brand, in the voice of: {persona}.

TOPIC:
{topic}
{category}{context}
PLATFORM RULES:
{style}
- Maximum {max} characters
- {emoji_rule}

COMPLIANCE RULES:
1. Educational and analytical only; never recommend buying or selling anything
2. Never tell readers to invest in specific assets
3. Attribute views neutrally ("analysts suggest", "data shows")

RESPONSE FORMAT:
Respond with ONLY a JSON object in this exact format:
{{
  "content": "the post text"
}}"#,
        platform_name = platform.as_str(),
        persona = req.persona.trim(),
        topic = req.topic.trim(),
        style = platform.style_rules(),
        max = platform.max_chars(),
    )
}

#[derive(Deserialize)]
struct GeneratedPost {
    content: String,
}

pub fn parse_generated(text: &str) -> Result<String, ProviderError> {
    let post: GeneratedPost = parse_json_reply(text)?;
    let content = post.content.trim().to_string();
    if content.is_empty() {
        return Err(ProviderError::MalformedResponse("empty content".into()));
    }
    Ok(content)
}

#[derive(Clone)]
pub struct ContentGenerator {
    invoker: ProviderFallbackInvoker,
}

impl ContentGenerator {
    pub fn new(invoker: ProviderFallbackInvoker) -> Self {
        Self { invoker }
    }

    /// No default content on failure: the error is the caller's to surface.
    pub async fn generate(&self, req: &ContentRequest) -> Result<GenerationResult, FallbackFailure> {
        let prompt = build_generation_prompt(req);
        let out = self
            .invoker
            .invoke(
                Action::Generate,
                &prompt,
                &CallOptions::GENERATION,
                parse_generated,
            )
            .await?;
        info!(
            target: "generation",
            platform = req.platform.as_str(),
            provider = %out.provider,
            chars = out.value.chars().count(),
            "content generated"
        );
        Ok(GenerationResult {
            content: out.value,
            provider: out.provider,
        })
    }
}
