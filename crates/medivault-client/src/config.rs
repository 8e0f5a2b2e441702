//! Client configuration
//!
//! Defaults, overridable from the environment and then from CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_SECS: u64 = 30;

pub const ENV_API_URL: &str = "MEDIVAULT_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "MEDIVAULT_TIMEOUT_SECS";
pub const ENV_POLL_SECS: &str = "MEDIVAULT_POLL_SECS";
pub const ENV_TOKEN_FILE: &str = "MEDIVAULT_TOKEN_FILE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, validated, without trailing slash
    pub base_url: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Where tokens persist between runs; None keeps them in memory only
    pub token_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            token_file: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Defaults overridden by `MEDIVAULT_*` environment variables
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an explicit variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL) {
            config.base_url = parse_base_url(&url)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(parse_secs(ENV_TIMEOUT_SECS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_POLL_SECS) {
            config.poll_interval = Duration::from_secs(parse_secs(ENV_POLL_SECS, &raw)?);
        }
        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|p| !p.trim().is_empty()) {
            config.token_file = Some(PathBuf::from(path));
        }
        log::debug!("Client config: base_url={} timeout={:?}", config.base_url, config.timeout);
        Ok(config)
    }

    /// Absolute URL for an API path such as `/access/request/`
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base_url,
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ApiError::Config(format!("Invalid endpoint '{}': {}", joined, e)))
    }
}

/// Validate an API root: http(s) only, trailing slash dropped
pub fn parse_base_url(raw: &str) -> Result<String, ApiError> {
    let cleaned = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(cleaned).map_err(|e| ApiError::Config(format!("Invalid URL '{}': {}", cleaned, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Config(format!(
            "URL must use http or https scheme, got: {}",
            parsed.scheme()
        )));
    }
    Ok(cleaned.to_string())
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, ApiError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ApiError::Config(format!("{} must be a positive number of seconds, got '{}'", key, raw))),
    }
}
