//! Error classification and retry with exponential backoff.
//!
//! Every external call runs through [`ErrorHandler::run`]. Failures are
//! classified into a category, a severity and a recovery strategy; only the
//! `Retry` strategy is handled here, the other strategies are acted on by the
//! caller (the pipeline regenerates, skips or falls back).

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::ActionError;

/// Largest jitter added on top of a computed delay, as a share of the delay.
const MAX_JITTER_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Api,
    RateLimit,
    Network,
    Authentication,
    Validation,
    Content,
    Configuration,
    FileSystem,
    Git,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Repeat the same operation after a backoff delay.
    Retry,
    /// Repeat the operation with an alternative (e.g. the fallback model).
    Fallback,
    /// Give up on this item and continue with the next one.
    Skip,
    /// Generate new content and validate again.
    Regenerate,
    /// Abort the item; critical errors abort the run.
    Fail,
}

/// How one error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorPolicy {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub strategy: RecoveryStrategy,
}

/// One error seen during the run, kept for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub operation: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub strategy: RecoveryStrategy,
    pub message: String,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

/// Classifies errors and retries transient failures.
#[derive(Debug)]
pub struct ErrorHandler {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    records: Mutex<Vec<ErrorRecord>>,
    retries: AtomicU32,
}

impl ErrorHandler {
    pub fn new(config: &RetryConfig) -> Self {
        ErrorHandler {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.base_delay_ms)),
            records: Mutex::new(Vec::new()),
            retries: AtomicU32::new(0),
        }
    }

    /// Maps an error to its category, severity and recovery strategy.
    pub fn classify(err: &ActionError) -> ErrorPolicy {
        use ErrorCategory as C;
        use ErrorSeverity as S;
        use RecoveryStrategy as R;

        let (category, severity, strategy) = match err {
            ActionError::Network { .. } => (C::Network, S::Medium, R::Retry),
            ActionError::RateLimit { .. } => (C::RateLimit, S::Medium, R::Retry),
            ActionError::Api {
                retryable: true, ..
            } => (C::Api, S::Medium, R::Retry),
            ActionError::Api {
                retryable: false, ..
            } => (C::Api, S::High, R::Fallback),
            ActionError::Authentication { .. } => (C::Authentication, S::Critical, R::Fail),
            ActionError::Configuration(_) => (C::Configuration, S::Critical, R::Fail),
            ActionError::Validation(_) => (C::Validation, S::Medium, R::Regenerate),
            ActionError::Content(_) => (C::Content, S::Medium, R::Regenerate),
            ActionError::FileSystem { .. } => (C::FileSystem, S::High, R::Fail),
            ActionError::Git(_) => (C::Git, S::High, R::Fail),
            ActionError::Duplicate(_) => (C::Duplicate, S::Low, R::Skip),
        };

        ErrorPolicy {
            category,
            severity,
            strategy,
        }
    }

    /// Delay before retry number `attempt` (0-based), with random jitter.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..=MAX_JITTER_FRACTION);
        self.backoff_delay_with_jitter(attempt, retry_after, jitter)
    }

    /// Deterministic part of [`ErrorHandler::backoff_delay`].
    ///
    /// `base * 2^attempt` capped at the maximum delay, plus `jitter_fraction`
    /// of that delay. A server-provided `retry_after` replaces the computed
    /// delay. The result never exceeds the maximum delay.
    pub fn backoff_delay_with_jitter(
        &self,
        attempt: u32,
        retry_after: Option<Duration>,
        jitter_fraction: f64,
    ) -> Duration {
        let delay = match retry_after {
            Some(requested) => requested,
            None => {
                let factor = 2u32.saturating_pow(attempt.min(16));
                self.base_delay.saturating_mul(factor)
            }
        }
        .min(self.max_delay);

        let jitter = delay.mul_f64(jitter_fraction.clamp(0.0, MAX_JITTER_FRACTION));
        (delay + jitter).min(self.max_delay)
    }

    /// Records an error without retrying it.
    pub fn record(&self, operation: &str, err: &ActionError, attempt: u32) -> ErrorPolicy {
        let policy = Self::classify(err);
        let record = ErrorRecord {
            operation: operation.to_string(),
            category: policy.category,
            severity: policy.severity,
            strategy: policy.strategy,
            message: err.to_string(),
            attempt,
            timestamp: Utc::now(),
        };
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        policy
    }

    /// Records an error unless it is the one [`ErrorHandler::run`] logged last.
    pub fn record_unhandled(&self, operation: &str, err: &ActionError) -> ErrorPolicy {
        let message = err.to_string();
        let already = self
            .records
            .lock()
            .map(|records| records.last().map_or(false, |r| r.message == message))
            .unwrap_or(false);
        if already {
            return Self::classify(err);
        }
        self.record(operation, err, 0)
    }

    /// Runs `operation`, retrying while its errors call for the `Retry` strategy.
    ///
    /// # Parameters
    ///
    /// - `name`: Human-readable name for the operation (for logging and the report)
    /// - `operation`: Closure producing a fresh future for every attempt
    ///
    /// # Returns
    ///
    /// The first success, or the last error once it is not retryable or the
    /// attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, ActionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ActionError>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("Operation '{}' succeeded after {} retries", name, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let policy = self.record(name, &err, attempt);
                    let attempts_left = attempt + 1 < self.max_attempts;

                    if policy.strategy == RecoveryStrategy::Retry && attempts_left {
                        let delay = self.backoff_delay(attempt, err.retry_after());
                        warn!(
                            "Operation '{}' failed (attempt {}/{}): {} - retrying in {:?}",
                            name,
                            attempt + 1,
                            self.max_attempts,
                            err,
                            delay
                        );
                        self.retries.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    error!(
                        "Operation '{}' failed with {:?} error ({:?}, strategy {:?}): {}",
                        name, policy.category, policy.severity, policy.strategy, err
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Every error recorded so far.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of retries performed so far.
    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }
}
