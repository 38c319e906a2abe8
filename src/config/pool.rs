//! Worker pool configuration.

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

/// Environment variable overriding [`WorkerPoolConfig::worker_count`].
pub const ENV_WORKER_COUNT: &str = "PROMETHEUS_WORKER_COUNT";
/// Environment variable overriding [`WorkerPoolConfig::thread_stack_size`].
pub const ENV_WORKER_STACK_SIZE: &str = "PROMETHEUS_WORKER_STACK_SIZE";

const DEFAULT_THREAD_PREFIX: &str = "pc-worker";

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads. Defaults to the number of logical CPUs.
    pub worker_count: usize,
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes; platform default when unset.
    pub thread_stack_size: Option<usize>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_owned(),
            thread_stack_size: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Build a config from the defaults, overridden by `PROMETHEUS_WORKER_COUNT`
    /// and `PROMETHEUS_WORKER_STACK_SIZE`. A `.env` file in the working
    /// directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// `ConfigError::Env` when a variable is set but not a number, and
    /// `ConfigError::Invalid` when the resulting config does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(count) = read_usize(ENV_WORKER_COUNT)? {
            cfg.worker_count = count;
        }
        if let Some(bytes) = read_usize(ENV_WORKER_STACK_SIZE)? {
            cfg.thread_stack_size = Some(bytes);
        }
        cfg.validate().map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }
}

fn read_usize(name: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Env {
            name: name.to_owned(),
            value: raw,
        }),
        Err(_) => Ok(None),
    }
}
