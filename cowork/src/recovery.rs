//! Recovery execution for classified failures.
//!
//! A [`RecoveryManager`] owns the retry counters for one plan run. Managers
//! are not shared across concurrent runs; create one per run and drop it
//! with the run's [`crate::executor::ExecutionContext`].

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::error::{
    CoworkError, ErrorCategory, RecoveryAction, RecoveryStrategy, Severity,
};
use crate::io::config::RetryConfig;
use crate::io::confirm::Confirmer;

/// One retry budget per failure site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RetryKey {
    category: ErrorCategory,
    operation: String,
    step: Option<String>,
    file: Option<String>,
}

impl RetryKey {
    fn for_error(error: &CoworkError) -> Self {
        Self {
            category: error.category,
            operation: error.context.operation.clone(),
            step: error.context.step.clone(),
            file: error.context.file.clone(),
        }
    }
}

/// Executes the recovery strategy attached to an error: retry with
/// exponential backoff, fallback, user intervention, ignore, or restart.
pub struct RecoveryManager {
    overrides: HashMap<ErrorCategory, RecoveryStrategy>,
    counters: HashMap<RetryKey, u32>,
    max_delay: Duration,
}

impl RecoveryManager {
    pub fn new(retry: &RetryConfig) -> Self {
        let mut overrides = HashMap::new();
        // The configured retry budget applies to the category that retries
        // by default.
        overrides.insert(
            ErrorCategory::Filesystem,
            RecoveryStrategy::new(RecoveryAction::Retry)
                .with_retries(retry.max_retries, retry.base_delay()),
        );
        Self {
            overrides,
            counters: HashMap::new(),
            max_delay: retry.max_delay(),
        }
    }

    /// Replace the strategy used for a category, for every error of that
    /// category seen by this manager.
    pub fn register_override(&mut self, category: ErrorCategory, strategy: RecoveryStrategy) {
        self.overrides.insert(category, strategy);
    }

    /// The strategy that would be applied to `error`: the caller-registered
    /// override for its category, or the strategy the error carries.
    pub fn strategy_for(&self, error: &CoworkError) -> RecoveryStrategy {
        self.overrides
            .get(&error.category)
            .cloned()
            .unwrap_or_else(|| error.strategy.clone())
    }

    /// Pre-check whether recovery could still do anything for `error`,
    /// without paying the recovery cost.
    pub fn can_recover(&self, error: &CoworkError) -> bool {
        let strategy = self.strategy_for(error);
        match strategy.action {
            RecoveryAction::Retry => {
                let spent = self
                    .counters
                    .get(&RetryKey::for_error(error))
                    .copied()
                    .unwrap_or(0);
                spent < strategy.max_retries
            }
            RecoveryAction::Fallback => strategy.fallback.is_some(),
            RecoveryAction::Abort => false,
            RecoveryAction::UserIntervention
            | RecoveryAction::Ignore
            | RecoveryAction::Restart => true,
        }
    }

    /// Execute the strategy attached to `error`, re-invoking `operation`
    /// where the strategy calls for it.
    ///
    /// Returns `Ok(Some(value))` when a retry, fallback, or restart
    /// produced a result, `Ok(None)` under `ignore`, and `Err` with the
    /// original or an escalated error otherwise.
    pub fn attempt_recovery(
        &mut self,
        error: CoworkError,
        mut operation: impl FnMut() -> Result<Value, CoworkError>,
        confirmer: &dyn Confirmer,
    ) -> Result<Option<Value>, CoworkError> {
        let mut error = error;
        loop {
            let strategy = self.strategy_for(&error);
            debug!(category = %error.category, action = ?strategy.action, "attempting recovery");
            match strategy.action {
                RecoveryAction::Abort => return Err(error),
                RecoveryAction::Ignore => {
                    warn!(category = %error.category, "ignoring error by strategy");
                    return Ok(None);
                }
                RecoveryAction::UserIntervention => {
                    return self.user_intervention(error, &strategy, confirmer);
                }
                RecoveryAction::Retry => {
                    let key = RetryKey::for_error(&error);
                    let spent = self.counters.get(&key).copied().unwrap_or(0);
                    if spent >= strategy.max_retries {
                        return Err(exhausted(error, spent));
                    }
                    let delay = self.backoff_delay(strategy.retry_delay_base, spent);
                    debug!(attempt = spent + 1, delay_ms = delay.as_millis() as u64, "retrying");
                    thread::sleep(delay);
                    self.counters.insert(key, spent + 1);
                    match operation() {
                        Ok(value) => return Ok(Some(value)),
                        Err(next) => error = next,
                    }
                }
                RecoveryAction::Fallback => {
                    let Some(fallback) = strategy.fallback.clone() else {
                        // Nothing attached; callers should have checked
                        // can_recover first.
                        return Err(error);
                    };
                    return match fallback() {
                        Ok(value) => Ok(Some(value)),
                        Err(fallback_error) => Err(fallback_failed(error, fallback_error)),
                    };
                }
                RecoveryAction::Restart => {
                    // Best-effort state reset: this manager's only state is
                    // its retry ledger.
                    self.counters.clear();
                    return match operation() {
                        Ok(value) => Ok(Some(value)),
                        Err(next) => Err(next),
                    };
                }
            }
        }
    }

    fn user_intervention(
        &self,
        error: CoworkError,
        strategy: &RecoveryStrategy,
        confirmer: &dyn Confirmer,
    ) -> Result<Option<Value>, CoworkError> {
        if strategy.requires_confirmation {
            let prompt = format!("{error}. Continue anyway?");
            let approved = match confirmer.confirm(&prompt) {
                Ok(answer) => answer,
                Err(confirm_error) => {
                    return Err(CoworkError::new(
                        ErrorCategory::UserInput,
                        format!("confirmation failed: {confirm_error}"),
                        error.context.clone(),
                    ));
                }
            };
            if !approved {
                return Err(CoworkError::new(
                    ErrorCategory::UserInput,
                    format!("user declined to continue after: {error}"),
                    error.context.clone(),
                ));
            }
        }
        // Advisory, not automatic: the original error is re-raised for the
        // caller to handle explicitly.
        Err(error)
    }

    /// `base * 2^attempt` plus up to 10% jitter, capped at the configured
    /// maximum delay.
    fn backoff_delay(&self, base: Duration, attempt: u32) -> Duration {
        let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay);
        let jitter_ratio = rand::thread_rng().gen_range(0.0..=0.10);
        let jitter = Duration::from_millis((capped.as_millis() as f64 * jitter_ratio) as u64);
        (capped + jitter).min(self.max_delay)
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn retry_count(&self, error: &CoworkError) -> u32 {
        self.counters
            .get(&RetryKey::for_error(error))
            .copied()
            .unwrap_or(0)
    }
}

/// Terminal escalation once the retry budget is spent.
fn exhausted(error: CoworkError, attempts: u32) -> CoworkError {
    warn!(category = %error.category, attempts, "retry budget exhausted");
    CoworkError::new(
        ErrorCategory::System,
        format!("retry budget exhausted after {attempts} attempts: {error}"),
        error.context.clone(),
    )
}

/// Critical escalation naming both the original failure and the failed
/// fallback.
fn fallback_failed(error: CoworkError, fallback_error: CoworkError) -> CoworkError {
    warn!(category = %error.category, "fallback failed");
    CoworkError::new(
        ErrorCategory::System,
        format!("fallback failed: {fallback_error} (original error: {error})"),
        error.context.clone(),
    )
    .with_severity(Severity::Critical)
}
