//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HONYAKU_*)
//! 2. TOML config file (if HONYAKU_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Default system prompt for the translator chat.
pub const DEFAULT_SYSTEM_PROMPT: &str = r###"You are a translator (English ↔︎ Japanese).

Rules:
1. If input is Japanese: Translate to English
2. If input is English: Translate to Japanese
3. Keep all code blocks (```) exactly as-is
4. Keep inline code (`text`) exactly as-is
5. Translate only narrative text to natural Japanese
6. Preserve markdown formatting

Examples:
  Input: "Create a `config.py` file."
  Output: "`config.py`ファイルを作成します。"

  Input: "## Installation
```bash
npm install
```"
  Output: "## インストール
```bash
npm install
```"

  Input: "`config.py`ファイルを作成します。"
  Output:  "Create a `config.py` file."

  Input: "## インストール
```bash
npm install
```"
  Output: "## Installation
```bash
npm install
```"

Provide only the translation for the given input."###;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HONYAKU_*)
/// 2. TOML config file (if HONYAKU_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache bucket. Bumping it invalidates every
    /// previously cached static asset on the next activation.
    ///
    /// Set via HONYAKU_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin of the controlled scope, e.g. `https://translate.example`.
    ///
    /// Set via HONYAKU_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Same-origin paths fetched and stored on install.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Hosts (substring match) that are never intercepted.
    #[serde(default = "default_bypass_domains")]
    pub bypass_domains: Vec<String>,

    /// Path suffixes that are never intercepted.
    #[serde(default = "default_bypass_extensions")]
    pub bypass_extensions: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via HONYAKU_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// System prompt placed at the head of every chat session.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Inference engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Connection settings for the inference engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of an OpenAI-compatible API (HONYAKU_ENGINE__BASE_URL).
    #[serde(default = "default_engine_base_url")]
    pub base_url: String,

    /// Model identifier sent with every completion request.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Optional bearer token (HONYAKU_ENGINE__API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_cache_version() -> String {
    "honyaku-v4".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_static_assets() -> Vec<String> {
    ["/", "/index.html", "/index.css", "/index.js", "/assets/logo.png", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_bypass_domains() -> Vec<String> {
    ["huggingface.co", "cdn-lfs.huggingface.co", "cdn-lfs-us-1.huggingface.co", "raw.githubusercontent.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_bypass_extensions() -> Vec<String> {
    [".bin", ".wasm", ".safetensors", ".gguf", ".onnx"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./honyaku-cache.sqlite")
}

fn default_user_agent() -> String {
    "honyaku/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

fn default_engine_base_url() -> String {
    "http://localhost:8000/v1".into()
}

fn default_model_id() -> String {
    "gemma-2-2b-jpn-it-q4f16_1-MLC".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { base_url: default_engine_base_url(), model_id: default_model_id(), api_key: None }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            origin: default_origin(),
            static_assets: default_static_assets(),
            bypass_domains: default_bypass_domains(),
            bypass_extensions: default_bypass_extensions(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            system_prompt: default_system_prompt(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The layered figment behind [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HONYAKU_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("HONYAKU_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
