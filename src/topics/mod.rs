//! Topic model, seed defaults, keyword categorisation, and server-side discovery.

pub mod cache;
pub mod store;

use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ProviderError;
use crate::invoker::{parse_json_reply, Action, ProviderFallbackInvoker};
use crate::providers::CallOptions;

/// Topics older than this are rediscovered on the next passive load.
pub const STALE_AFTER_MS: i64 = 6 * 60 * 60 * 1000;
pub const DEFAULT_SOURCE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNews {
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicItem {
    /// Stable identifier; selection is matched on this.
    pub value: String,
    pub label: String,
    pub news_source: String,
    #[serde(default)]
    pub actual_sources: Vec<String>,
    pub primary_source: String,
    /// Unix millis.
    pub last_updated: i64,
    /// Unix millis.
    pub news_release_date: i64,
    #[serde(default)]
    pub source_news: Vec<SourceNews>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicsPayload {
    pub topics: Vec<TopicItem>,
    /// Unix millis.
    pub last_updated: i64,
    pub source: String,
}

impl TopicsPayload {
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            topics: default_topics(now),
            last_updated: now.timestamp_millis(),
            source: DEFAULT_SOURCE.to_string(),
        }
    }

    pub fn find(&self, value: &str) -> Option<&TopicItem> {
        self.topics.iter().find(|t| t.value == value)
    }

    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.last_updated
    }

    /// Future timestamps (clock skew) count as fresh.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after_ms: i64) -> bool {
        self.age_ms(now) >= stale_after_ms
    }
}

/// Hardcoded seed list, used until a discovery succeeds.
pub fn default_topics(now: DateTime<Utc>) -> Vec<TopicItem> {
    const SEED: &[(&str, &str)] = &[
        ("risk-management", "Risk Management Fundamentals"),
        ("position-sizing", "Position Sizing Strategies"),
        ("volatility-indices", "Understanding Volatility Indices"),
        ("multipliers", "How Multipliers Work"),
        ("technical-analysis", "Reading Candlestick Charts"),
        ("trading-psychology", "Trading Psychology and Discipline"),
    ];
    let ts = now.timestamp_millis();
    SEED.iter()
        .map(|(value, label)| TopicItem {
            value: value.to_string(),
            label: label.to_string(),
            news_source: "Editorial".to_string(),
            actual_sources: Vec::new(),
            primary_source: "Editorial".to_string(),
            last_updated: ts,
            news_release_date: ts,
            source_news: Vec::new(),
        })
        .collect()
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Risk Management",
        &["risk", "management", "position size", "stop loss", "losing", "loss"],
    ),
    ("Multipliers", &["multiplier", "leverage"]),
    ("Volatility", &["volatility", "volatile", "vol index"]),
    (
        "Technical Analysis",
        &["technical", "chart", "candlestick", "pattern", "indicator"],
    ),
    ("Platform", &["mt5", "platform", "deriv app", "dtrader"]),
];

/// Map free text to a topic category; first category in table order wins.
pub fn detect_topic_category(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, kws)| kws.iter().any(|kw| lower.contains(kw)))
        .map(|(cat, _)| *cat)
}

/// `"Fed Rate Decision: What's Next?"` → `"fed-rate-decision-what-s-next"`.
pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

// ------------------------------------------------------------
// Discovery (server side)
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveredTopic {
    label: String,
    #[serde(default)]
    news_source: String,
    #[serde(default)]
    primary_source: String,
    #[serde(default)]
    actual_sources: Vec<String>,
    #[serde(default)]
    news_release_date: Option<String>,
    #[serde(default)]
    source_news: Vec<SourceNews>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryReply {
    topics: Vec<DiscoveredTopic>,
}

pub fn build_discovery_prompt(now: DateTime<Utc>) -> String {
    format!(
        r#"You curate discussion topics for a trading-education social media team. Today is {date}.

List 6 timely, educational topics drawn from recent financial market news (rates, inflation, volatility, major indices, commodities, FX). Topics must be educational, never trade recommendations.

RESPONSE FORMAT:
Respond with ONLY a JSON object in this exact format:
{{
  "topics": [
    {{
      "label": "Short topic title",
      "newsSource": "Outlet that reported it",
      "primarySource": "Main outlet",
      "actualSources": ["Outlet A", "Outlet B"],
      "newsReleaseDate": "YYYY-MM-DD",
      "sourceNews": [{{ "title": "Headline", "source": "Outlet", "url": "https://..." }}]
    }}
  ]
}}"#,
        date = now.format("%Y-%m-%d")
    )
}

fn parse_release_date(raw: Option<&str>, fallback_ms: i64) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback_ms;
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.timestamp_millis();
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(fallback_ms)
}

/// Parse a discovery reply into topic items, deduplicated by `value`.
pub fn parse_discovery(text: &str, now: DateTime<Utc>) -> Result<Vec<TopicItem>, ProviderError> {
    let reply: DiscoveryReply = parse_json_reply(text)?;
    let ts = now.timestamp_millis();
    let mut out: Vec<TopicItem> = Vec::with_capacity(reply.topics.len());
    for t in reply.topics {
        let label = t.label.trim().to_string();
        let value = slugify(&label);
        if value.is_empty() || out.iter().any(|o| o.value == value) {
            continue;
        }
        let primary = if t.primary_source.trim().is_empty() {
            t.news_source.trim().to_string()
        } else {
            t.primary_source.trim().to_string()
        };
        out.push(TopicItem {
            value,
            label,
            news_source: t.news_source.trim().to_string(),
            actual_sources: t.actual_sources,
            primary_source: primary,
            last_updated: ts,
            news_release_date: parse_release_date(t.news_release_date.as_deref(), ts),
            source_news: t.source_news,
        });
    }
    if out.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "discovery returned no usable topics".into(),
        ));
    }
    Ok(out)
}

/// Server-side holder behind `GET|POST /api/social/topics`.
pub struct TopicService {
    invoker: ProviderFallbackInvoker,
    current: RwLock<Option<TopicsPayload>>,
    stale_after_ms: i64,
}

impl TopicService {
    pub fn new(invoker: ProviderFallbackInvoker) -> Self {
        Self {
            invoker,
            current: RwLock::new(None),
            stale_after_ms: STALE_AFTER_MS,
        }
    }

    pub fn with_stale_after_ms(mut self, ms: i64) -> Self {
        self.stale_after_ms = ms;
        self
    }

    fn snapshot(&self) -> Option<TopicsPayload> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Passive load: current payload unless missing or stale.
    pub async fn current(&self, now: DateTime<Utc>) -> TopicsPayload {
        match self.snapshot() {
            Some(p) if !p.is_stale(now, self.stale_after_ms) => p,
            _ => self.refresh(now).await,
        }
    }

    /// Forced discovery. On failure keeps whatever is current, else seeds defaults.
    pub async fn refresh(&self, now: DateTime<Utc>) -> TopicsPayload {
        let prompt = build_discovery_prompt(now);
        let parsed = self
            .invoker
            .invoke(Action::DiscoverTopics, &prompt, &CallOptions::TOPICS, |text| {
                parse_discovery(text, now)
            })
            .await;

        let payload = match parsed {
            Ok(out) => {
                let source = out.provider.as_str().to_lowercase();
                info!(target: "topics", count = out.value.len(), source = %source, "topics discovered");
                TopicsPayload {
                    topics: out.value,
                    last_updated: now.timestamp_millis(),
                    source,
                }
            }
            Err(e) => {
                warn!(target: "topics", error = %e, "topic discovery failed");
                match self.snapshot() {
                    Some(p) => return p,
                    None => TopicsPayload::defaults(now),
                }
            }
        };

        counter!("topics_refresh_total", "source" => payload.source.clone()).increment(1);
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(payload.clone());
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockProvider, ProviderKind};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    const REPLY: &str = r#"{"topics":[
        {"label":"Fed Rate Decision: What's Next?","newsSource":"Reuters","actualSources":["Reuters","FT"],"newsReleaseDate":"2026-03-01","sourceNews":[{"title":"Fed holds","source":"Reuters"}]},
        {"label":"Fed rate decision - what's next","newsSource":"FT"},
        {"label":"Gold volatility spikes","newsSource":"Bloomberg","primarySource":"Bloomberg"}
    ]}"#;

    #[test]
    fn slugs_are_stable() {
        assert_eq!(slugify("Fed Rate Decision: What's Next?"), "fed-rate-decision-what-s-next");
        assert_eq!(slugify("  --  "), "");
    }

    #[test]
    fn discovery_parse_dedups_and_fills_fields() {
        let items = parse_discovery(REPLY, t0()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value, "fed-rate-decision-what-s-next");
        assert_eq!(items[0].primary_source, "Reuters");
        assert_eq!(
            items[0].news_release_date,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap().timestamp_millis()
        );
        assert_eq!(items[1].news_release_date, t0().timestamp_millis());
        assert!(parse_discovery(r#"{"topics":[]}"#, t0()).is_err());
    }

    #[test]
    fn category_detection_follows_table_order() {
        assert_eq!(detect_topic_category("Stop loss placement"), Some("Risk Management"));
        assert_eq!(detect_topic_category("Leverage on multipliers"), Some("Multipliers"));
        assert_eq!(detect_topic_category("Candlestick basics"), Some("Technical Analysis"));
        assert_eq!(detect_topic_category("Weekend brunch"), None);
    }

    #[tokio::test]
    async fn service_caches_until_stale_and_keeps_last_on_failure() {
        let primary = Arc::new(MockProvider::scripted(
            ProviderKind::Gemini,
            vec![
                Ok(REPLY.into()),
                Err(ProviderError::Network("down".into())),
            ],
        ));
        let fallback = Arc::new(MockProvider::failing(
            ProviderKind::Ollama,
            ProviderError::Network("down".into()),
        ));
        let svc = TopicService::new(ProviderFallbackInvoker::new(primary.clone(), fallback));

        let first = svc.current(t0()).await;
        assert_eq!(first.source, "gemini");
        let again = svc.current(t0() + chrono::Duration::hours(1)).await;
        assert_eq!(again, first);
        assert_eq!(primary.call_count(), 1);

        // stale → rediscovery fails → last payload kept
        let later = svc.current(t0() + chrono::Duration::hours(7)).await;
        assert_eq!(later, first);
        assert_eq!(primary.call_count(), 2);
    }

    #[tokio::test]
    async fn service_seeds_defaults_when_nothing_discovered() {
        let p = Arc::new(MockProvider::failing(ProviderKind::Gemini, ProviderError::Network("x".into())));
        let f = Arc::new(MockProvider::always(ProviderKind::Ollama, "no json"));
        let svc = TopicService::new(ProviderFallbackInvoker::new(p, f));
        let out = svc.refresh(t0()).await;
        assert_eq!(out.source, DEFAULT_SOURCE);
        assert_eq!(out.topics, default_topics(t0()));
    }
}
