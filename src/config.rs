use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Longest video accepted for processing, in seconds.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration(),
        }
    }
}

fn default_max_duration() -> i64 {
    1200
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
        }
    }
}

fn default_session_timeout() -> u64 {
    1800
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
    "127.0.0.1:8088".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    /// Base URL of the transcript service. Ingestion of unseen videos fails
    /// when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Name of an environment variable holding a bearer token for the service.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_fetch_timeout(),
            api_key_env: None,
        }
    }
}

fn default_fetch_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_generator_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            endpoint: default_generator_endpoint(),
            timeout_secs: default_generator_timeout(),
            system_prompt: None,
        }
    }
}

impl GeneratorConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generator_timeout() -> u64 {
    120
}
fn default_generator_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            client_id: None,
            redirect_uri: None,
            client_secret_env: default_client_secret_env(),
        }
    }
}

impl IdentityConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_client_secret_env() -> String {
    "GOOGLE_CLIENT_SECRET".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.ingest.max_duration_secs <= 0 {
        anyhow::bail!("ingest.max_duration_secs must be > 0");
    }

    if config.session.timeout_secs == 0 {
        anyhow::bail!("session.timeout_secs must be > 0");
    }

    match config.generator.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.generator.model.is_none() {
                anyhow::bail!("generator.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown generator provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    match config.identity.provider.as_str() {
        "disabled" => {}
        "google" => {
            if config.identity.client_id.is_none() || config.identity.redirect_uri.is_none() {
                anyhow::bail!(
                    "identity.client_id and identity.redirect_uri are required when provider is 'google'"
                );
            }
        }
        other => anyhow::bail!(
            "Unknown identity provider: '{}'. Must be disabled or google.",
            other
        ),
    }

    if let Some(endpoint) = &config.fetcher.endpoint {
        url::Url::parse(endpoint)
            .with_context(|| format!("fetcher.endpoint is not a valid URL: {}", endpoint))?;
    }

    Ok(())
}
