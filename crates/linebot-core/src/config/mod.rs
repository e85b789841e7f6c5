use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_PROJECT_ID: &str = "linebot-dev";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "あなたは親しみやすいAIアシスタントです。日本語で丁寧に、でも親近感のある口調で返答してください。";

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "申し訳ございません。現在、AIサービスに接続できません。後ほどお試しください。";

/// Root configuration for linebot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// GCP project that owns the secrets and the warehouse dataset.
    pub project_id: String,
    pub secrets: SecretsConfig,
    pub line: LineConfig,
    pub completion: CompletionConfig,
    pub warehouse: WarehouseConfig,
    pub gateway: GatewayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            secrets: SecretsConfig::default(),
            line: LineConfig::default(),
            completion: CompletionConfig::default(),
            warehouse: WarehouseConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    /// Fully-qualified warehouse table id (`project.dataset.table`).
    pub fn table_id(&self) -> String {
        format!(
            "{}.{}.{}",
            self.project_id, self.warehouse.dataset, self.warehouse.table
        )
    }

    /// Socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

/// Where secrets are resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    /// GCP Secret Manager, `versions/latest`.
    Gcp,
    /// Process environment, for local development.
    Env,
}

impl std::str::FromStr for SecretBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gcp" | "secretmanager" => Ok(Self::Gcp),
            "env" => Ok(Self::Env),
            other => Err(ConfigError::Invalid(format!("unknown secret backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretsConfig {
    pub backend: SecretBackend,
    pub channel_access_token: String,
    pub channel_secret: String,
    pub completion_api_key: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::Gcp,
            channel_access_token: "line-channel-access-token".to_string(),
            channel_secret: "line-channel-secret".to_string(),
            completion_api_key: "openai-api-key".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineConfig {
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.line.me".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionConfig {
    pub model: String,
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompt: String,
    pub fallback_message: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            api_base: None,
            max_tokens: 500,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Warehouse sink for usage rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    Bigquery,
    /// Rows are only written to the process log.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarehouseConfig {
    pub backend: WarehouseBackend,
    pub dataset: String,
    pub table: String,
    pub api_base: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            backend: WarehouseBackend::Bigquery,
            dataset: "autostudio_line".to_string(),
            table: "line_bot_logs".to_string(),
            api_base: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Largest webhook body read, in bytes. Larger bodies answer 500.
    pub body_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            body_limit: 1024 * 1024,
        }
    }
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `LINEBOT_CONFIG` env var: full JSON config
/// 2. Individual env vars (merged on top of the file or defaults)
/// 3. File fallback (`~/.linebot/config.json`)
pub fn load_config_from_env() -> Config {
    load_config_with(None, |key| std::env::var(key).ok())
}

/// Same as [`load_config_from_env`], with variables resolved through
/// `lookup` and the file read from `config_path` when given.
pub fn load_config_with(
    config_path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Config {
    if let Some(json) = lookup("LINEBOT_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse LINEBOT_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(config_path);
    apply_env_overrides(&mut cfg, &lookup);
    cfg
}

fn apply_env_overrides(cfg: &mut Config, lookup: &impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GCP_PROJECT") {
        if !v.is_empty() {
            cfg.project_id = v;
        }
    }
    if let Some(v) = lookup("PORT") {
        match v.parse() {
            Ok(port) => cfg.gateway.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", v),
        }
    }

    if let Some(v) = lookup("LINEBOT_SECRET_BACKEND") {
        match v.parse() {
            Ok(backend) => cfg.secrets.backend = backend,
            Err(e) => tracing::warn!("{}", e),
        }
    }

    if let Some(v) = lookup("LINEBOT_MODEL") {
        cfg.completion.model = v;
    }
    if let Some(v) = lookup("OPENAI_API_BASE") {
        cfg.completion.api_base = Some(v);
    }

    if let Some(v) = lookup("LINEBOT_WAREHOUSE") {
        match v.to_lowercase().as_str() {
            "bigquery" => cfg.warehouse.backend = WarehouseBackend::Bigquery,
            "none" | "off" => cfg.warehouse.backend = WarehouseBackend::None,
            other => tracing::warn!("Ignoring unknown LINEBOT_WAREHOUSE value: {}", other),
        }
    }
    if let Some(v) = lookup("BIGQUERY_DATASET") {
        cfg.warehouse.dataset = v;
    }
    if let Some(v) = lookup("BIGQUERY_TABLE") {
        cfg.warehouse.table = v;
    }
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".linebot")
        .join("config.json")
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
