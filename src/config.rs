use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

const ENV_PREFIX: &str = "CPUE_";
const DEFAULT_WORKER_INTERVAL_SECS: u64 = 3600;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_API_VERSION: &str = "2022-11-28";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),
    #[error("{name} must be an integer, got {value:?}")]
    InvalidInteger { name: String, value: String },
    #[error("{name} must be a boolean, got {value:?}")]
    InvalidBool { name: String, value: String },
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: String, reason: String },
    #[error("{name} is not a valid socket address: {value:?}")]
    InvalidAddr { name: String, value: String },
}

/// GitHub API settings used by the REST client.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: String,
    pub enterprise: String,
    pub api_url: String,
    pub api_version: String,
    pub user_agent: String,
    /// `None` disables the per-request timeout.
    pub timeout: Option<Duration>,
}

/// Runtime configuration for the exporter.
/// Values are sourced from `CPUE_`-prefixed environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_debug: bool,
    pub worker_interval: Duration,
    pub listen_addr: SocketAddr,
    pub github: GithubConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Env vars:
    /// - CPUE_GITHUB_TOKEN [required]
    /// - CPUE_GITHUB_ENTERPRISE [required]
    /// - CPUE_WORKER_INTERVAL (seconds, default: 3600)
    /// - CPUE_LOG_LEVEL (default: info)
    /// - CPUE_LOG_DEBUG (default: false)
    /// - CPUE_LISTEN_ADDR (default: 0.0.0.0:8080)
    /// - CPUE_GITHUB_API_URL (default: https://api.github.com)
    /// - CPUE_GITHUB_API_VERSION (default: 2022-11-28)
    /// - CPUE_GITHUB_HTTP_TIMEOUT_SECS (default: 30, 0 disables)
    /// - CPUE_GITHUB_USER_AGENT (default: copilot-usage-exporter/<version>)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup, keyed by the unprefixed
    /// variable name plus [`ENV_PREFIX`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<(String, String)> {
            let name = format!("{ENV_PREFIX}{key}");
            lookup(&name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (name, v))
        };
        let required = |key: &str| -> Result<String, ConfigError> {
            get(key)
                .map(|(_, v)| v)
                .ok_or_else(|| ConfigError::Missing(format!("{ENV_PREFIX}{key}")))
        };

        let token = required("GITHUB_TOKEN")?;
        let enterprise = required("GITHUB_ENTERPRISE")?;

        let worker_secs = match get("WORKER_INTERVAL") {
            Some((name, v)) => parse_u64(&name, &v)?,
            None => 0,
        };
        let worker_secs = if worker_secs == 0 {
            DEFAULT_WORKER_INTERVAL_SECS
        } else {
            worker_secs
        };

        let log_level = get("LOG_LEVEL")
            .map(|(_, v)| v)
            .unwrap_or_else(|| "info".to_string());
        let log_debug = match get("LOG_DEBUG") {
            Some((name, v)) => parse_bool(&name, &v)?,
            None => false,
        };

        let (addr_name, addr_value) = get("LISTEN_ADDR").unwrap_or_else(|| {
            (
                format!("{ENV_PREFIX}LISTEN_ADDR"),
                DEFAULT_LISTEN_ADDR.to_string(),
            )
        });
        let listen_addr = addr_value
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddr {
                name: addr_name,
                value: addr_value.clone(),
            })?;

        let api_url = match get("GITHUB_API_URL") {
            Some((name, v)) => {
                url::Url::parse(&v).map_err(|e| ConfigError::InvalidUrl {
                    name,
                    reason: e.to_string(),
                })?;
                v.trim_end_matches('/').to_string()
            }
            None => DEFAULT_API_URL.to_string(),
        };
        let api_version = get("GITHUB_API_VERSION")
            .map(|(_, v)| v)
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let timeout_secs = match get("GITHUB_HTTP_TIMEOUT_SECS") {
            Some((name, v)) => parse_u64(&name, &v)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let user_agent = get("GITHUB_USER_AGENT")
            .map(|(_, v)| v)
            .unwrap_or_else(|| format!("copilot-usage-exporter/{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            log_level,
            log_debug,
            worker_interval: Duration::from_secs(worker_secs),
            listen_addr,
            github: GithubConfig {
                token,
                enterprise,
                api_url,
                api_version,
                user_agent,
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            },
        })
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidInteger {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
