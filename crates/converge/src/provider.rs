//! Provider abstraction and provider-call error taxonomy.
//!
//! A [`Provider`] realizes resources on a target platform. The engine only
//! ever talks to providers through this trait, which keeps the core free of
//! any cloud API surface. Errors are categorized so the executor can retry
//! transient failures (network, quota) with exponential backoff.

use serde_json::Map;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Attribute map realized by a provider
pub type AttrMap = Map<String, serde_json::Value>;

/// Categories of provider errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable)
    Network,
    /// Quota or rate-limit exhaustion (transient, retryable)
    Quota,
    /// Resource not found on the platform
    NotFound,
    /// Conflicting resource already exists
    Conflict,
    /// Authentication or authorization failure
    Auth,
    /// The request itself was invalid
    InvalidRequest,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Quota)
    }
}

/// Errors raised by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-related error (connection, timeout, DNS, etc.)
    #[error("network error: {message}")]
    Network { message: String },

    /// Quota exhausted or rate limited
    #[error("quota exceeded: {message}")]
    Quota { message: String },

    /// Resource not found on the platform
    #[error("resource not found: {id}")]
    NotFound { id: String },

    /// A conflicting resource already exists
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Authentication or authorization failure
    #[error("authorization failed: {message}")]
    Auth { message: String },

    /// The request was invalid
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Provider storage path problem
    #[error("provider storage unavailable: {0}")]
    StorageUnavailable(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } => ErrorCategory::Network,
            Self::Quota { .. } => ErrorCategory::Quota,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Auth { .. } => ErrorCategory::Auth,
            Self::InvalidRequest { .. } => ErrorCategory::InvalidRequest,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A resource as realized by a provider: the assigned id plus the full
/// attribute map (inputs echoed back along with computed values).
#[derive(Debug, Clone, PartialEq)]
pub struct Realized {
    pub id: String,
    pub attrs: AttrMap,
}

/// Provider trait - the seam between the engine and a target platform.
pub trait Provider: Send + Sync {
    /// Provider name as referenced by kind schemas and provider blocks.
    fn name(&self) -> &str;

    /// Apply a `provider "<name>" { ... }` configuration block.
    fn configure(&mut self, config: &AttrMap) -> ProviderResult<()>;

    /// Create a resource, returning its realized form.
    fn create(&self, kind: &str, name: &str, attrs: &AttrMap) -> ProviderResult<Realized>;

    /// Update an existing resource in place.
    fn update(&self, kind: &str, id: &str, attrs: &AttrMap) -> ProviderResult<Realized>;

    /// Destroy an existing resource.
    fn destroy(&self, kind: &str, id: &str) -> ProviderResult<()>;

    /// Read the current realized form of a resource, or `None` if it no
    /// longer exists. Used for refresh/drift detection.
    fn read(&self, kind: &str, id: &str) -> ProviderResult<Option<Realized>>;
}

/// Configured providers by name
pub type ProviderMap = BTreeMap<String, Box<dyn Provider>>;

// ============================================================================
// Retry with exponential backoff
// ============================================================================

/// Retry configuration for transient provider errors
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt after `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt as i32);
        let delay = self.base_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

/// Execute a provider operation with retry on transient errors.
///
/// Non-retryable errors return immediately; retryable ones back off
/// exponentially until the attempt budget is exhausted.
pub fn with_retry<T, F>(config: &RetryConfig, mut operation: F) -> ProviderResult<T>
where
    F: FnMut() -> ProviderResult<T>,
{
    let mut last_error: Option<ProviderError> = None;

    for attempt in 0..config.max_attempts {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                if attempt + 1 >= config.max_attempts {
                    last_error = Some(e);
                    break;
                }

                let delay = config.delay_for_attempt(attempt);
                log::warn!(
                    "attempt {}/{} failed: {}. retrying in {:?}",
                    attempt + 1,
                    config.max_attempts,
                    e,
                    delay,
                );
                std::thread::sleep(delay);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::Other("retry exhausted".to_string())))
}
