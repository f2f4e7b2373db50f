//! Kernel configuration: defaults, environment variables and TOML files.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: fields assigned after loading, or builder methods
//!    such as [`NodeBuilder::firing_budget`](crate::NodeBuilder::firing_budget)
//! 2. **Environment variables**: values from `PINFLOW_*` variables
//! 3. **Config file**: values loaded from a TOML file (requires the
//!    `config-file` feature)
//! 4. **Defaults**: [`KernelConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `PINFLOW_POOL_MIN_THREADS` | `usize` | `pool.min_threads` |
//! | `PINFLOW_POOL_MAX_THREADS` | `usize` | `pool.max_threads` |
//! | `PINFLOW_POOL_IDLE_TIMEOUT_MS` | `u64` | `pool.idle_timeout` |
//! | `PINFLOW_THREAD_NAME_PREFIX` | `String` | `pool.thread_name_prefix` |
//! | `PINFLOW_FIRING_BUDGET` | `u32` | `firing_budget` |

use std::time::Duration;

use thiserror::Error;

/// Environment variable name for the pool's minimum thread count.
pub const ENV_POOL_MIN_THREADS: &str = "PINFLOW_POOL_MIN_THREADS";
/// Environment variable name for the pool's maximum thread count.
pub const ENV_POOL_MAX_THREADS: &str = "PINFLOW_POOL_MAX_THREADS";
/// Environment variable name for the idle timeout in milliseconds.
pub const ENV_POOL_IDLE_TIMEOUT_MS: &str = "PINFLOW_POOL_IDLE_TIMEOUT_MS";
/// Environment variable name for the worker thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "PINFLOW_THREAD_NAME_PREFIX";
/// Environment variable name for the firing budget.
pub const ENV_FIRING_BUDGET: &str = "PINFLOW_FIRING_BUDGET";

/// Error raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidValue {
        /// Variable or key name.
        var: &'static str,
        /// Expected type.
        expected: &'static str,
        /// Raw value.
        value: String,
    },
    /// The settings are individually valid but inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A config file is not valid TOML for this schema.
    #[cfg(feature = "config-file")]
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Threads kept alive while idle.
    pub min_threads: usize,
    /// Upper bound on live threads.
    pub max_threads: usize,
    /// Idle time after which threads above `min_threads` exit.
    pub idle_timeout: Duration,
    /// Worker names are `{prefix}-worker-{n}`.
    pub thread_name_prefix: String,
}

impl PoolConfig {
    /// Default idle timeout before retiring excess threads.
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Raises `max_threads` to at least one and to at least `min_threads`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_threads = self.max_threads.max(self.min_threads).max(1);
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(4, usize::from);
        Self {
            min_threads: 1,
            max_threads: parallelism,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            thread_name_prefix: "pinflow".to_string(),
        }
    }
}

/// Settings shared by nodes and pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Settings for [`WorkerPool::with_config`](crate::WorkerPool::with_config).
    pub pool: PoolConfig,
    /// Consecutive in-place firings before an actor yields its executor.
    pub firing_budget: u32,
}

impl KernelConfig {
    /// Default firing budget.
    pub const DEFAULT_FIRING_BUDGET: u32 = 64;

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the TOML file, then environment overrides.
    #[cfg(feature = "config-file")]
    pub fn from_file_and_env(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_toml_config(&mut config, &parse_toml_file(path)?);
        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.firing_budget == 0 {
            return Err(ConfigError::Invalid("firing_budget must be at least 1".into()));
        }
        if self.pool.max_threads == 0 {
            return Err(ConfigError::Invalid("pool.max_threads must be at least 1".into()));
        }
        if self.pool.min_threads > self.pool.max_threads {
            return Err(ConfigError::Invalid(format!(
                "pool.min_threads ({}) exceeds pool.max_threads ({})",
                self.pool.min_threads, self.pool.max_threads
            )));
        }
        Ok(())
    }

    /// Clamps settings into range instead of rejecting them.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        self.firing_budget = self.firing_budget.max(1);
        self.pool = self.pool.normalized();
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            firing_budget: Self::DEFAULT_FIRING_BUDGET,
        }
    }
}

/// Apply environment variable overrides to a [`KernelConfig`].
///
/// Only variables that are set are applied. A set variable that does not
/// parse is an error.
pub fn apply_env_overrides(config: &mut KernelConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_POOL_MIN_THREADS) {
        config.pool.min_threads = parse_usize(ENV_POOL_MIN_THREADS, &val)?;
    }
    if let Some(val) = read_env(ENV_POOL_MAX_THREADS) {
        config.pool.max_threads = parse_usize(ENV_POOL_MAX_THREADS, &val)?;
    }
    if let Some(val) = read_env(ENV_POOL_IDLE_TIMEOUT_MS) {
        config.pool.idle_timeout =
            Duration::from_millis(parse_u64(ENV_POOL_IDLE_TIMEOUT_MS, &val)?);
    }
    if let Some(val) = read_env(ENV_THREAD_NAME_PREFIX) {
        config.pool.thread_name_prefix = val;
    }
    if let Some(val) = read_env(ENV_FIRING_BUDGET) {
        config.firing_budget = parse_u32(ENV_FIRING_BUDGET, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn invalid(var: &'static str, expected: &'static str, val: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        expected,
        value: val.to_string(),
    }
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| invalid(var, "unsigned integer", val))
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|_| invalid(var, "unsigned integer", val))
}

fn parse_u32(var: &'static str, val: &str) -> Result<u32, ConfigError> {
    val.trim().parse::<u32>().map_err(|_| invalid(var, "u32", val))
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable kernel configuration.
///
/// ```toml
/// firing_budget = 32
///
/// [pool]
/// min_threads = 1
/// max_threads = 8
/// idle_timeout_ms = 5000
/// thread_name_prefix = "myapp"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct KernelTomlConfig {
    /// Consecutive in-place firings.
    pub firing_budget: Option<u32>,
    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolToml,
}

/// Pool section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct PoolToml {
    /// Minimum number of threads.
    pub min_threads: Option<usize>,
    /// Maximum number of threads.
    pub max_threads: Option<usize>,
    /// Idle timeout in milliseconds.
    pub idle_timeout_ms: Option<u64>,
    /// Thread name prefix.
    pub thread_name_prefix: Option<String>,
}

/// Apply a parsed TOML config. Only fields present in the file override.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut KernelConfig, toml: &KernelTomlConfig) {
    if let Some(v) = toml.firing_budget {
        config.firing_budget = v;
    }
    if let Some(v) = toml.pool.min_threads {
        config.pool.min_threads = v;
    }
    if let Some(v) = toml.pool.max_threads {
        config.pool.max_threads = v;
    }
    if let Some(v) = toml.pool.idle_timeout_ms {
        config.pool.idle_timeout = Duration::from_millis(v);
    }
    if let Some(ref v) = toml.pool.thread_name_prefix {
        config.pool.thread_name_prefix.clone_from(v);
    }
}

/// Parse a TOML string.
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<KernelTomlConfig, ConfigError> {
    Ok(toml::from_str(toml_str)?)
}

/// Read and parse a TOML file.
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<KernelTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_toml_str(&content)
}
