//! Configuration loading.
//!
//! Precedence, highest first: command-line flags, environment variables
//! (a `.env` file is loaded into the environment at startup), the JSON5
//! config file, built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgoraError, Result};
use crate::protocol::StreamMode;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:2024";
pub const DEFAULT_ASSISTANT: &str = "ace-base-agent";
pub const DEFAULT_USER_EMAIL: &str = "test@example.com";
pub const DEFAULT_BACKEND_URL: &str = "https://api-prod.nvidia.com";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_GATEWAY_PORT: u16 = 2024;
pub const THREAD_FILE_NAME: &str = "saved_thread_id.txt";

/// Top-level Agora configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Defaults for the streaming client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_mode: Option<StreamMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_file: Option<String>,
}

/// The proxied query backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key (default: `IRBOT_API_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// The LLM used by the persona and explanation paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key (default: `OPENAI_API_KEY`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "agora_client=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "plain".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}

/// Load a `.env` file from the working directory, overriding existing variables.
pub fn load_env_file() {
    match dotenvy::dotenv_override() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(%e, "Failed to load .env file"),
    }
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the default config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        json5::from_str(&substituted).map_err(|e| AgoraError::Config(e.to_string()))
    }

    /// Default config file path: `~/.agora/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn base_url(&self) -> String {
        env_value("LANGGRAPH_BASE_URL")
            .or_else(|| self.client.as_ref().and_then(|c| c.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn assistant(&self) -> String {
        env_value("LANGGRAPH_ASSISTANT")
            .or_else(|| self.client.as_ref().and_then(|c| c.assistant.clone()))
            .unwrap_or_else(|| DEFAULT_ASSISTANT.to_string())
    }

    pub fn user_email(&self) -> String {
        env_value("USER_EMAIL")
            .or_else(|| self.client.as_ref().and_then(|c| c.user_email.clone()))
            .unwrap_or_else(|| DEFAULT_USER_EMAIL.to_string())
    }

    pub fn stream_mode(&self) -> StreamMode {
        env_value("STREAM_MODE")
            .and_then(|v| v.parse().ok())
            .or_else(|| self.client.as_ref().and_then(|c| c.stream_mode))
            .unwrap_or_default()
    }

    pub fn thread_file(&self) -> PathBuf {
        self.client
            .as_ref()
            .and_then(|c| c.thread_file.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join(THREAD_FILE_NAME))
    }

    pub fn backend_base_url(&self) -> String {
        env_value("IRBOT_BASE_URL")
            .or_else(|| self.backend.as_ref().and_then(|b| b.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn backend_api_key(&self) -> Option<String> {
        let backend = self.backend.clone().unwrap_or_default();
        let env = backend.api_key_env.or_else(|| Some("IRBOT_API_KEY".into()));
        resolve_secret_field(&backend.api_key, &env)
    }

    pub fn backend_timeout_secs(&self) -> u64 {
        env_value("IRBOT_TIMEOUT")
            .and_then(|v| v.parse().ok())
            .or_else(|| self.backend.as_ref().and_then(|b| b.timeout_secs))
            .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS)
    }

    pub fn model_name(&self) -> String {
        self.model
            .as_ref()
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn model_base_url(&self) -> Option<String> {
        self.model.as_ref().and_then(|m| m.base_url.clone())
    }

    pub fn model_api_key(&self) -> Option<String> {
        let model = self.model.clone().unwrap_or_default();
        let env = model.api_key_env.or_else(|| Some("OPENAI_API_KEY".into()));
        resolve_secret_field(&model.api_key, &env)
    }

    pub fn model_max_tokens(&self) -> u32 {
        self.model
            .as_ref()
            .and_then(|m| m.max_tokens)
            .unwrap_or(4096)
    }

    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string())
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway
            .as_ref()
            .and_then(|g| g.port)
            .unwrap_or(DEFAULT_GATEWAY_PORT)
    }
}

/// Base directory for Agora data: `~/.agora/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agora")
}
