//! Error types for ec2-replacement-sim
//!
//! There are two error types: `SimError` (main error enum) and `ConfigError`
//! (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Library code uses `crate::error::Result<T>` which returns `SimError`.
//! The binary maps a `SimError` to a process exit code at the top level
//! (see `exit_codes`), so every failure surfaces verbatim to the caller.
//!
//! ## Fatal vs non-fatal
//!
//! - `Config`: bad flexibility pattern, missing replacement type, unknown
//!   capacity type or output mode. Raised before any pricing work begins.
//! - `PriceNotFound`: the replacement type has no quote, so there is no
//!   reference price and the run aborts.
//! - `StalledReadiness`: the price source did not finish its initial load
//!   within the configured maximum wait.
//!
//! A candidate without a quote is not an error at all. The selector records a
//! `Diagnostic::PriceMissing` and keeps going.
//!
//! ## Retry Awareness
//!
//! Errors implement `IsRetryable` so the pricing source's `RetryPolicy`
//! (`src/retry.rs`) can tell transient AWS failures from permanent ones.

use thiserror::Error;

/// Main error type for ec2-replacement-sim
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("can't find pricing info for {instance_type}")]
    PriceNotFound { instance_type: String },

    #[error("Pricing data was not ready after {waited_secs}s")]
    StalledReadiness { waited_secs: u64 },

    #[error("Pricing source error: {0}")]
    Pricing(String),

    #[error("Retryable error (attempt {attempt}/{max_attempts}): {reason}")]
    Retryable {
        attempt: u32,
        max_attempts: u32,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("AWS SDK error: {0}")]
    Aws(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SimError>;

/// Trait for determining if an error is retryable
///
/// Used by `RetryPolicy` implementations to determine whether an error
/// should trigger a retry attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for SimError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SimError::Retryable { .. } | SimError::Aws(_) | SimError::Io(_)
        )
    }
}
