use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Settings for the tiered translator chain.
///
/// Remote tiers are opt-in: a tier whose section is absent is never
/// probed and never called. The pattern tier is always present.
#[derive(Debug, Deserialize, Clone)]
pub struct TranslatorConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub hosted: Option<HostedTierConfig>,
    #[serde(default)]
    pub local: Option<LocalTierConfig>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            hosted: None,
            local: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostedTierConfig {
    #[serde(default = "default_hosted_model")]
    pub model: String,
    #[serde(default = "default_hosted_url")]
    pub url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_hosted_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_hosted_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalTierConfig {
    #[serde(default = "default_local_model")]
    pub model: String,
    #[serde(default = "default_local_url")]
    pub url: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_local_model() -> String {
    "llama3.2".to_string()
}
fn default_local_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_probe_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StreamingConfig {
    /// Pause between `token` events, in milliseconds. Zero disables pacing.
    #[serde(default)]
    pub token_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartsConfig {
    #[serde(default = "default_charts_enabled")]
    pub enabled: bool,
    #[serde(default = "default_charts_dir")]
    pub dir: PathBuf,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: default_charts_enabled(),
            dir: default_charts_dir(),
        }
    }
}

fn default_charts_enabled() -> bool {
    true
}
fn default_charts_dir() -> PathBuf {
    PathBuf::from("./charts")
}

impl Config {
    /// All-defaults configuration pointing at `db_path`, with no remote tiers.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig::default(),
            translator: TranslatorConfig::default(),
            streaming: StreamingConfig::default(),
            charts: ChartsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.translator.timeout_secs == 0 {
        anyhow::bail!("translator.timeout_secs must be > 0");
    }

    if config.streaming.token_delay_ms > 1000 {
        anyhow::bail!("streaming.token_delay_ms must be <= 1000");
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if let Some(hosted) = &config.translator.hosted {
        if hosted.api_key_env.trim().is_empty() {
            anyhow::bail!("translator.hosted.api_key_env must name an environment variable");
        }
    }

    if let Some(local) = &config.translator.local {
        if local.probe_timeout_secs == 0 {
            anyhow::bail!("translator.local.probe_timeout_secs must be > 0");
        }
    }

    Ok(())
}
