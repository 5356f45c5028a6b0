//! Layered settings: built-in defaults, then an optional TOML file, then
//! `CHOLERA__*` environment variables (`__` separates nested keys, e.g.
//! `CHOLERA__RETRY__ATTEMPTS=3`).

use crate::error::{ProcessingError, Result};
use crate::sources::RetryPolicy;
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    CONFIG_ENV_PREFIX, DEFAULT_MIN_TTL_MINUTES, DEFAULT_RESOURCES_DIR,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use validator::{Validate, ValidationError};

/// Upper bound on `auth.min_ttl_minutes` (one year).
pub const MAX_MIN_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    pub resources_dir: PathBuf,

    #[validate(range(min = 1, max = 1024))]
    pub max_workers: usize,

    #[validate(nested)]
    pub retry: RetrySettings,

    #[validate(nested)]
    pub auth: AuthSettings,

    #[validate(nested)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_retry_finite"))]
pub struct RetrySettings {
    #[validate(range(min = 1, max = 1000))]
    pub attempts: u32,
    #[validate(range(min = 0.0, max = 86400.0))]
    pub timeout_secs: f64,
    #[validate(range(min = 0.0, max = 86400.0))]
    pub wait_initial_secs: f64,
    #[validate(range(min = 0.0, max = 86400.0))]
    pub wait_max_secs: f64,
    #[validate(range(min = 0.0, max = 86400.0))]
    pub wait_jitter_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthSettings {
    #[validate(range(min = 0, max = 525600))]
    pub min_ttl_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputSettings {
    #[validate(custom(function = "validate_compression"))]
    pub compression: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from(DEFAULT_RESOURCES_DIR),
            max_workers: num_cpus::get(),
            retry: RetrySettings::default(),
            auth: AuthSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            timeout_secs: policy.timeout.as_secs_f64(),
            wait_initial_secs: policy.wait_initial.as_secs_f64(),
            wait_max_secs: policy.wait_max.as_secs_f64(),
            wait_jitter_secs: policy.wait_jitter.as_secs_f64(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            min_ttl_minutes: DEFAULT_MIN_TTL_MINUTES,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            compression: COMPRESSION_SNAPPY.to_string(),
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new()
            .with_attempts(self.attempts)
            .with_timeout(seconds("retry.timeout_secs", self.timeout_secs)?)
            .with_wait_initial(seconds("retry.wait_initial_secs", self.wait_initial_secs)?)
            .with_wait_max(seconds("retry.wait_max_secs", self.wait_max_secs)?)
            .with_wait_jitter(seconds("retry.wait_jitter_secs", self.wait_jitter_secs)?))
    }
}

impl AuthSettings {
    pub fn min_ttl(&self) -> Result<chrono::Duration> {
        min_ttl_from_minutes(self.min_ttl_minutes)
    }
}

/// Minimum remaining certificate lifetime, rejecting negative or
/// out-of-range minute counts.
pub fn min_ttl_from_minutes(minutes: i64) -> Result<chrono::Duration> {
    if !(0..=MAX_MIN_TTL_MINUTES).contains(&minutes) {
        return Err(ProcessingError::Config(format!(
            "min_ttl_minutes must be between 0 and {}, got {}",
            MAX_MIN_TTL_MINUTES, minutes
        )));
    }
    chrono::Duration::try_minutes(minutes)
        .ok_or_else(|| ProcessingError::Config(format!("min_ttl_minutes out of range: {}", minutes)))
}

fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ProcessingError::Config(format!("{} = {}: {}", key, value, e)))
}

impl Settings {
    /// Load settings, reading `file` when given and present.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!(?settings, "Loaded settings");
        Ok(settings)
    }
}

// range checks let NaN through
fn validate_retry_finite(retry: &RetrySettings) -> std::result::Result<(), ValidationError> {
    let values = [
        retry.timeout_secs,
        retry.wait_initial_secs,
        retry.wait_max_secs,
        retry.wait_jitter_secs,
    ];
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ValidationError::new("non_finite_duration"))
    }
}

fn validate_compression(compression: &str) -> std::result::Result<(), ValidationError> {
    match compression.to_lowercase().as_str() {
        COMPRESSION_SNAPPY | COMPRESSION_GZIP | COMPRESSION_LZ4 | COMPRESSION_ZSTD
        | COMPRESSION_NONE => Ok(()),
        _ => Err(ValidationError::new("unsupported_compression")),
    }
}
