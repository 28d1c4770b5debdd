//! Configuration loading.
//!
//! The gateway reads a YAML file (`config.yml` by default, or the path in
//! `CONFIG_FILE`) and then applies a small set of environment overrides.
//! Everything the request path depends on is checked once by
//! [`Config::validate`] before the listener is bound.

use std::env;
use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::relay::{parse_target, TargetError};
use crate::wechat::KeyError;

/// Default config file path, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Length in bytes of a WeChat Pay API v3 key.
pub const API_V3_KEY_LEN: usize = 32;

/// Errors that make the gateway refuse to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no forward targets configured")]
    NoForwardTargets,

    #[error("invalid forward target {url:?}: {source}")]
    InvalidForwardTarget {
        url: String,
        #[source]
        source: TargetError,
    },

    #[error("wechat.apiV3Key must be {API_V3_KEY_LEN} bytes, got {len}")]
    InvalidApiV3Key { len: usize },

    #[error("wechat.publicKeyID is empty")]
    MissingPublicKeyId,

    #[error("forward.timeoutMs must be greater than zero")]
    ZeroForwardTimeout,

    #[error("invalid listen address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to load wechat pay public key {path}: {source}")]
    PublicKey {
        path: PathBuf,
        #[source]
        source: KeyError,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Listen address for the HTTP server
    #[serde(default = "default_address")]
    pub address: String,

    /// Verbose logging and route listing at startup
    #[serde(default)]
    pub debug: bool,

    /// WeChat Pay key material
    pub wechat: WechatConfig,

    /// Outbound HTTP client tuning
    #[serde(default)]
    pub forward: ForwardConfig,

    /// Static forward targets, attempted in order
    #[serde(default)]
    pub forwards: Vec<String>,
}

/// WeChat Pay verification settings.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WechatConfig {
    /// Path to the platform public key PEM file
    pub public_key: PathBuf,

    /// Identifier of the platform public key, matched against `Wechatpay-Serial`
    #[serde(rename = "publicKeyID")]
    pub public_key_id: String,

    /// Symmetric key used to decrypt notification resources
    pub api_v3_key: String,

    /// Maximum clock skew in seconds for `Wechatpay-Timestamp`
    #[serde(default = "default_signature_max_age")]
    pub signature_max_age: u64,
}

// The API v3 key never reaches the logs.
impl fmt::Debug for WechatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WechatConfig")
            .field("public_key", &self.public_key)
            .field("public_key_id", &self.public_key_id)
            .field("api_v3_key", &"<redacted>")
            .field("signature_max_age", &self.signature_max_age)
            .finish()
    }
}

/// Timeout and retry budget for each forward.
///
/// The provider expects an answer within 5 seconds, so a single attempt is
/// capped below that.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForwardConfig {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Extra attempts after a transport failure
    pub retries: u32,

    /// Initial backoff between attempts in milliseconds
    pub retry_wait_ms: u64,

    /// Upper bound for the backoff in milliseconds
    pub retry_max_wait_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 4000,
            retries: 5,
            retry_wait_ms: 100,
            retry_max_wait_ms: 2000,
        }
    }
}

impl ForwardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    pub fn retry_max_wait(&self) -> Duration {
        Duration::from_millis(self.retry_max_wait_ms)
    }
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_signature_max_age() -> u64 {
    300
}

impl Config {
    /// Load configuration from `CONFIG_FILE` (or `config.yml`) and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// Parse a YAML config file without applying overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Apply `ADDRESS`, `DEBUG` and `FORWARDS` overrides.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("ADDRESS").filter(|v| !v.trim().is_empty()) {
            self.address = address.trim().to_string();
        }

        if let Some(raw) = lookup("DEBUG") {
            match parse_bool(&raw) {
                Some(debug) => self.debug = debug,
                None => warn!(env_var = "DEBUG", value = %raw, "invalid_bool_override_ignored"),
            }
        }

        if let Some(forwards) = lookup("FORWARDS").map(|raw| parse_csv(&raw)) {
            self.forwards = forwards;
        }
    }

    /// Check every startup invariant at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        self.forward_targets()?;

        if self.wechat.public_key_id.trim().is_empty() {
            return Err(ConfigError::MissingPublicKeyId);
        }

        let len = self.wechat.api_v3_key.len();
        if len != API_V3_KEY_LEN {
            return Err(ConfigError::InvalidApiV3Key { len });
        }

        if self.forward.timeout_ms == 0 {
            return Err(ConfigError::ZeroForwardTimeout);
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address
            .parse()
            .map_err(|source| ConfigError::InvalidAddress {
                address: self.address.clone(),
                source,
            })
    }

    /// Parsed static forward targets, in configured order.
    ///
    /// An empty list is rejected here so a request can never resolve to
    /// zero targets.
    pub fn forward_targets(&self) -> Result<Vec<Url>, ConfigError> {
        if self.forwards.is_empty() {
            return Err(ConfigError::NoForwardTargets);
        }

        self.forwards
            .iter()
            .map(|raw| {
                parse_target(raw).map_err(|source| ConfigError::InvalidForwardTarget {
                    url: raw.clone(),
                    source,
                })
            })
            .collect()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
