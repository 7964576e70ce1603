//! Configuration (layered: defaults < TOML file < environment < code).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ToolstreamError;
use crate::types::GenerationSettings;
use crate::util::retry::RetryPolicy;

const ENV_PREFIX: &str = "TOOLSTREAM_";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on model rounds per attempt.
    pub max_rounds: u32,
    pub retry: RetryPolicy,
    pub stream_open_timeout_ms: u64,
    /// Longest allowed silence between two stream signals.
    pub stream_idle_timeout_ms: u64,
    pub operation_timeout_ms: u64,
    /// JSON key scraped early from the streaming text; `None` disables it.
    pub extraction_anchor: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            retry: RetryPolicy::default(),
            stream_open_timeout_ms: 30_000,
            stream_idle_timeout_ms: 60_000,
            operation_timeout_ms: 30_000,
            extraction_anchor: Some("go_to".to_string()),
            system_prompt: None,
            model: None,
            max_tokens: None,
        }
    }
}

impl OrchestratorConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ToolstreamError> {
        let config: Self = toml::from_str(source)
            .map_err(|e| ToolstreamError::Configuration(format!("invalid config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ToolstreamError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ToolstreamError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// `<config dir>/toolstream/config.toml` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "toolstream")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, overlaid by the default config file (if present), overlaid
    /// by `TOOLSTREAM_*` environment variables.
    pub fn load() -> Result<Self, ToolstreamError> {
        let mut config = match Self::default_path().filter(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid by the environment only.
    pub fn from_env() -> Result<Self, ToolstreamError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `TOOLSTREAM_*` variables, loading `.env` first if present.
    pub fn apply_env(&mut self) -> Result<(), ToolstreamError> {
        let _ = dotenvy::dotenv();
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup (keys include the prefix).
    pub fn apply_vars(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ToolstreamError> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("MAX_ROUNDS") {
            self.max_rounds = parse_var("MAX_ROUNDS", &v)?;
        }
        if let Some(v) = var("MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_var("MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("RETRY_DELAYS_MS") {
            self.retry.delays = v
                .split(',')
                .map(|part| parse_var::<u64>("RETRY_DELAYS_MS", part.trim()))
                .map(|ms| ms.map(Duration::from_millis))
                .collect::<Result<Vec<_>, ToolstreamError>>()?;
        }
        if let Some(v) = var("STREAM_OPEN_TIMEOUT_MS") {
            self.stream_open_timeout_ms = parse_var("STREAM_OPEN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("STREAM_IDLE_TIMEOUT_MS") {
            self.stream_idle_timeout_ms = parse_var("STREAM_IDLE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("OPERATION_TIMEOUT_MS") {
            self.operation_timeout_ms = parse_var("OPERATION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("EXTRACTION_ANCHOR") {
            self.extraction_anchor = Some(v).filter(|anchor| !anchor.trim().is_empty());
        }
        if let Some(v) = var("SYSTEM_PROMPT") {
            self.system_prompt = Some(v);
        }
        if let Some(v) = var("MODEL") {
            self.model = Some(v);
        }
        if let Some(v) = var("MAX_TOKENS") {
            self.max_tokens = Some(parse_var("MAX_TOKENS", &v)?);
        }

        self.validate()
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ToolstreamError> {
        if self.max_rounds == 0 {
            return Err(ToolstreamError::Configuration(
                "max_rounds must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ToolstreamError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.stream_open_timeout_ms == 0
            || self.stream_idle_timeout_ms == 0
            || self.operation_timeout_ms == 0
        {
            return Err(ToolstreamError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }
        if matches!(&self.extraction_anchor, Some(anchor) if anchor.trim().is_empty()) {
            return Err(ToolstreamError::Configuration(
                "extraction_anchor must not be blank".into(),
            ));
        }
        Ok(())
    }

    pub fn stream_open_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_open_timeout_ms)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_idle_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Per-round generation settings derived from this config.
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ToolstreamError> {
    value.trim().parse().map_err(|_| {
        ToolstreamError::Configuration(format!("{ENV_PREFIX}{name}: invalid value {value:?}"))
    })
}

/// Credentials and endpoint for the Anthropic transport.
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used when the round settings do not name one.
    pub model: String,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"..")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Load from `ANTHROPIC_API_KEY` and `ANTHROPIC_BASE_URL` (`.env` honored).
    pub fn from_env() -> Result<Self, ToolstreamError> {
        let _ = dotenvy::dotenv();
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ToolstreamError::Configuration("ANTHROPIC_API_KEY is not set".into())
            })?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = url;
        }
        Ok(config)
    }
}
