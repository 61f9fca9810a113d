use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variables checked, in order, for the Gemini credential.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_VAR: &str = "DECIPHER_CONFIG";

#[derive(Deserialize, Clone, Default, Debug)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL up to and including the API version segment.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

// Keeps the key out of logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("key", &if self.key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// When set, uploads are written here instead of being held in memory.
    pub spool_dir: Option<PathBuf>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Also write `decipher.log` into this directory.
    pub directory: Option<PathBuf>,
}

fn default_model() -> String { "gemini-2.5-flash".into() }
fn default_endpoint() -> String { "https://generativelanguage.googleapis.com/v1beta".into() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_tokens() -> u32 { 2048 }
fn default_bind() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 8080)) }
fn default_max_upload_bytes() -> usize { 20 * 1024 * 1024 }
fn default_level() -> String { "info".into() }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            spool_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
        }
    }
}

impl Config {
    /// Load the config file named by `DECIPHER_CONFIG` (or `./config.toml`), then
    /// fill the API key from the environment. Never fails: a missing or broken
    /// file falls back to defaults.
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        let mut config = Self::from_file(&path);
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Runs before tracing is initialised, so problems go to stderr.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("[decipher] Failed to parse {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                eprintln!(
                    "[decipher] {} not found, using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// An empty key in the file is filled from the first non-empty credential variable.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if !self.api.key.is_empty() {
            return;
        }
        if let Some(key) = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(*name))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
        {
            self.api.key = key;
        }
    }
}
