// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_gemini_model() -> String {
    "gemini-pro".to_string()
}
fn default_ollama_base() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// "ENV" means: read from GEMINI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_base")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: "ENV".to_string(),
            model: default_gemini_model(),
            base_url: default_gemini_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base(),
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Per-request timeout applied to both providers. 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// `config/ai.json` if present, otherwise defaults; env overrides applied either way.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var("AI_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_AI_CONFIG_PATH.into());
        if Path::new(&path).exists() {
            return Self::load_from_file(path);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        // Resolve api key if "ENV" (or blank); an explicit env var always wins.
        let key = self.gemini.api_key.trim();
        if key.is_empty() || key.eq_ignore_ascii_case("env") {
            self.gemini.api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        } else if let Ok(k) = env::var("GEMINI_API_KEY") {
            if !k.trim().is_empty() {
                self.gemini.api_key = k;
            }
        }

        if let Ok(v) = env::var("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Ok(v) = env::var("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
        if let Ok(v) = env::var("OLLAMA_MODEL") {
            self.ollama.model = v;
        }

        self.gemini.base_url = self.gemini.base_url.trim_end_matches('/').to_string();
        self.ollama.base_url = self.ollama.base_url.trim_end_matches('/').to_string();
    }
}
