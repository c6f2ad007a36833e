// src/config/compliance.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "COMPLIANCE_RULES_PATH";
const DEFAULT_PATH: &str = "config/compliance.toml";

/// Phrases that always mark content as direct financial advice.
pub const DEFAULT_BANNED_PHRASES: &[&str] = &[
    "buy now",
    "sell now",
    "sell immediately",
    "invest in",
    "purchase",
    "go long",
    "go short",
    "guaranteed returns",
];

/// Load banned phrases from an explicit TOML file (`banned_phrases = [...]`).
pub fn load_banned_phrases_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading compliance rules from {}", path.display()))?;
    parse_banned_phrases(&content)
}

/// Load banned phrases using env var + fallbacks:
/// 1) $COMPLIANCE_RULES_PATH
/// 2) config/compliance.toml
/// 3) built-in list
pub fn load_banned_phrases_default() -> Result<Vec<String>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            anyhow::bail!("COMPLIANCE_RULES_PATH points to non-existent path");
        }
        return load_banned_phrases_from(&pb);
    }
    let p = PathBuf::from(DEFAULT_PATH);
    if p.exists() {
        return load_banned_phrases_from(&p);
    }
    Ok(DEFAULT_BANNED_PHRASES.iter().map(|s| s.to_string()).collect())
}

fn parse_banned_phrases(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct Rules {
        banned_phrases: Vec<String>,
    }
    let rules: Rules = toml::from_str(s)?;
    Ok(clean_list(rules.banned_phrases))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() {
            set.insert(t);
        }
    }
    set.into_iter().collect()
}
