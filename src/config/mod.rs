use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod duration_serde;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL prefix used in returned image paths
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in the X-API-KEY header on uploads
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Object store root directory
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a cached response stays authoritative (also the
    /// s-maxage advertised on served images)
    #[serde(default = "default_cache_max_age", with = "duration_serde::duration")]
    pub max_age: Duration,
    /// How often the background sweeper purges expired entries
    #[serde(
        default = "default_cache_sweep_interval",
        with = "duration_serde::duration"
    )]
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Timeout for outbound image fetches in URL-list mode
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub fetch_timeout: Duration,
    /// Upper bound on upload request bodies
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

// Web defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

// Storage defaults
fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/images")
}

// Cache defaults
fn default_cache_max_age() -> Duration {
    Duration::from_secs(3600)
}

fn default_cache_sweep_interval() -> Duration {
    Duration::from_secs(300)
}

// Ingest defaults
fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: default_cache_max_age(),
            sweep_interval: default_cache_sweep_interval(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.web.base_url.trim().is_empty() {
            anyhow::bail!("web.base_url must be set");
        }
        if self.auth.api_key.trim().is_empty() {
            anyhow::bail!("auth.api_key must be set");
        }
        Ok(())
    }
}
