//! Server configuration, read once from the environment at startup.

use homework_grading::ModelConfig;

use crate::types::{Implementation, SERVER_NAME};

pub const ENV_API_KEY: &str = "MODELSCOPE_API_KEY";
pub const ENV_SERVER_NAME: &str = "MCP_SERVER_NAME";
pub const ENV_SERVER_VERSION: &str = "MCP_SERVER_VERSION";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Placeholder key shipped in sample `.env` files; treated as no key.
const DEMO_API_KEY: &str = "demo-key";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub api_key: Option<String>,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: SERVER_NAME.to_string(),
            server_version: DEFAULT_SERVER_VERSION.to_string(),
            api_key: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Read from the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup, so tests need not touch the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            server_name: non_empty(ENV_SERVER_NAME).unwrap_or(defaults.server_name),
            server_version: non_empty(ENV_SERVER_VERSION).unwrap_or(defaults.server_version),
            api_key: non_empty(ENV_API_KEY).filter(|k| k != DEMO_API_KEY),
            log_level: non_empty(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model settings with the fixed endpoint and model id.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.api_key.clone())
    }

    /// Name and version advertised during `initialize`.
    pub fn implementation(&self) -> Implementation {
        Implementation {
            name: self.server_name.clone(),
            version: self.server_version.clone(),
        }
    }
}
