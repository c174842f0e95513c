//! Configuration management for doclimit.

use config::{Config as ConfigLoader, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{DoclimitError, Result};
use crate::ratelimit::{TimeWindow, WindowPolicy};

/// Prefix for environment overrides, e.g. `DOCLIMIT__LIMITER__REQUEST_LIMIT`.
const ENV_PREFIX: &str = "DOCLIMIT";

/// Main configuration for doclimit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoclimitConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Document client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Shutdown behaviour
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum submissions per window
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,

    /// Window length in milliseconds, ignored when `unit` is set
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Preset window (second, minute, hour, day)
    #[serde(default)]
    pub unit: Option<TimeWindow>,

    /// Fixed or sliding window accounting
    #[serde(default)]
    pub policy: WindowPolicy,

    /// How long a submission may wait for capacity; unbounded when unset
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            request_limit: default_request_limit(),
            window_ms: default_window_ms(),
            unit: None,
            policy: WindowPolicy::default(),
            acquire_timeout_ms: None,
        }
    }
}

impl LimiterConfig {
    /// The configured window length.
    pub fn window(&self) -> Duration {
        match self.unit {
            Some(unit) => unit.duration(),
            None => Duration::from_millis(self.window_ms),
        }
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

fn default_request_limit() -> u32 {
    10
}

fn default_window_ms() -> u64 {
    1000
}

/// Document client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Document creation endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

fn default_endpoint() -> String {
    "https://ismp.crpt.ru/api/v3/lk/documents/create".to_string()
}

/// Shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long waiters and in-flight submissions get before being aborted
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period(),
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

fn default_grace_period() -> u64 {
    60
}

impl DoclimitConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DoclimitError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from an optional YAML file layered with
    /// `DOCLIMIT__*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&str>, env: Environment) -> Result<Self> {
        let mut builder = ConfigLoader::builder();
        if let Some(path) = path {
            info!(path = %path, "Loading configuration");
            builder = builder.add_source(File::with_name(path));
        }

        let config: DoclimitConfig = builder.add_source(env).build()?.try_deserialize()?;

        Ok(config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
