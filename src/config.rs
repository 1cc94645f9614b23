//! GuardChat configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main GuardChat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardChatConfig {
    /// Proxy process configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Chat session configuration
    #[serde(default)]
    pub chat: ChatConfig,
}

impl GuardChatConfig {
    /// Load configuration from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("invalid {}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate field values before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        if self.proxy.port == 0 {
            return Err(Error::Config("proxy.port must be non-zero".to_string()));
        }
        if self.proxy.poll_interval_ms == 0 {
            return Err(Error::Config(
                "proxy.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.proxy.startup_timeout_secs == 0 {
            return Err(Error::Config(
                "proxy.startup_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.chat.default_model.is_empty() {
            return Err(Error::Config("chat.default_model must be set".to_string()));
        }
        Ok(())
    }
}

/// Proxy process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Host the proxy listens on
    pub host: String,

    /// Port the proxy listens on
    pub port: u16,

    /// Health endpoint path
    pub health_path: String,

    /// Chat completions endpoint path
    pub chat_path: String,

    /// Proxy executable (None = search PATH and common install locations)
    pub executable: Option<PathBuf>,

    /// Extra arguments placed before the generated `--config`/`--port` pair
    pub extra_args: Vec<String>,

    /// Proxy configuration file, handed to the child via `--config`
    pub config_file: Option<PathBuf>,

    /// Working directory for the proxy process
    pub working_dir: Option<PathBuf>,

    /// PID marker file (None = default state directory)
    pub pid_file: Option<PathBuf>,

    /// Maximum time to wait for the health endpoint on startup
    pub startup_timeout_secs: u64,

    /// Interval between readiness polls
    pub poll_interval_ms: u64,

    /// Grace period between termination signal and force kill
    pub stop_grace_secs: u64,

    /// Timeout for a single health probe
    pub probe_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            health_path: "/health".to_string(),
            chat_path: "/v1/chat/completions".to_string(),
            executable: None,
            extra_args: Vec::new(),
            config_file: None,
            working_dir: None,
            pid_file: None,
            startup_timeout_secs: 30,
            poll_interval_ms: 500,
            stop_grace_secs: 5,
            probe_timeout_secs: 2,
        }
    }
}

impl ProxyConfig {
    /// Base URL of the proxy server
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Bearer token sent to the proxy (a local proxy accepts a dummy key)
    pub api_key: String,

    /// Model used when no `--model` override is given
    pub default_model: String,

    /// Guardrail names requested on every chat call
    pub guardrails: Vec<String>,

    /// Per-request timeout for chat completions
    pub request_timeout_secs: u64,

    /// System message seeded at the start of every session
    pub system: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: "dummy-key".to_string(),
            default_model: "gpt-3.5-turbo".to_string(),
            guardrails: vec!["lakera-guard".to_string()],
            request_timeout_secs: 60,
            system: None,
        }
    }
}

/// Default location for the PID marker file
pub fn default_pid_file() -> PathBuf {
    dirs_next::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("guardchat")
        .join("proxy.pid")
}
