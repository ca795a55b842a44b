//! Error taxonomy shared by the executor and the recovery manager.
//!
//! A [`CoworkError`] is created at the point of failure and never mutated
//! afterwards; it carries enough context (operation, step, file, workspace)
//! to reconstruct the failure from a single log line. Logged errors are read
//! back as [`ErrorRecord`] values, a narrower read-only representation; they
//! are never re-executed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure categories. Each category carries a default recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    System,
    Configuration,
    Planning,
    Execution,
    Safety,
    Ai,
    Filesystem,
    Network,
    Validation,
    UserInput,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::System => "system",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Planning => "planning",
            ErrorCategory::Execution => "execution",
            ErrorCategory::Safety => "safety",
            ErrorCategory::Ai => "ai",
            ErrorCategory::Filesystem => "filesystem",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::UserInput => "userInput",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Recovery dispositions, chosen per category or via caller override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryAction {
    Retry,
    Fallback,
    Abort,
    UserIntervention,
    Ignore,
    Restart,
}

/// Fallback operation attached to a strategy by the caller.
pub type FallbackFn = Arc<dyn Fn() -> Result<Value, CoworkError> + Send + Sync>;

/// Policy attached to an error: what the recovery manager should do with it.
#[derive(Clone)]
pub struct RecoveryStrategy {
    pub action: RecoveryAction,
    pub max_retries: u32,
    pub retry_delay_base: Duration,
    pub fallback: Option<FallbackFn>,
    /// For `UserIntervention`: whether to ask before re-raising.
    pub requires_confirmation: bool,
}

impl RecoveryStrategy {
    pub fn new(action: RecoveryAction) -> Self {
        Self {
            action,
            max_retries: 3,
            retry_delay_base: Duration::from_millis(1000),
            fallback: None,
            requires_confirmation: false,
        }
    }

    pub fn with_retries(mut self, max_retries: u32, base: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_base = base;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackFn) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }
}

impl fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryStrategy")
            .field("action", &self.action)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_base", &self.retry_delay_base)
            .field("fallback", &self.fallback.is_some())
            .field("requires_confirmation", &self.requires_confirmation)
            .finish()
    }
}

/// Where and when a failure happened.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub step: Option<String>,
    pub file: Option<String>,
    pub workspace: Option<PathBuf>,
    pub timestamp: SystemTime,
    pub extra: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            step: None,
            file: None,
            workspace: None,
            timestamp: SystemTime::now(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn timestamp_secs(&self) -> u64 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A classified failure. Created once, then only logged or consumed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CoworkError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub context: ErrorContext,
    pub strategy: RecoveryStrategy,
    pub retryable: bool,
    pub user_friendly: bool,
}

impl CoworkError {
    /// Build an error with its category's default severity, strategy,
    /// retryability, and user-facing disposition.
    pub fn new(category: ErrorCategory, message: impl Into<String>, context: ErrorContext) -> Self {
        let defaults = category_defaults(category);
        Self {
            category,
            severity: defaults.severity,
            message: message.into(),
            context,
            strategy: defaults.strategy,
            retryable: defaults.retryable,
            user_friendly: defaults.user_friendly,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_strategy(mut self, strategy: RecoveryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attach the id of the step that was executing when this was built.
    pub fn in_step(mut self, step_id: impl Into<String>) -> Self {
        self.context.step = Some(step_id.into());
        self
    }

    /// Non-technical message for presentation when `user_friendly` is set;
    /// otherwise the raw message.
    pub fn user_message(&self) -> String {
        if !self.user_friendly {
            return self.message.clone();
        }
        match self.category {
            ErrorCategory::Safety => {
                format!("The operation was aborted for your protection: {}", self.message)
            }
            ErrorCategory::Validation => {
                format!("The plan could not be accepted: {}", self.message)
            }
            ErrorCategory::UserInput => self.message.clone(),
            _ => format!("Something went wrong while {}: {}", self.context.operation, self.message),
        }
    }

    /// Narrow read-only record for structured logs.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            category: self.category,
            severity: self.severity,
            message: self.message.clone(),
            operation: self.context.operation.clone(),
            step: self.context.step.clone(),
            file: self.context.file.clone(),
            workspace: self
                .context
                .workspace
                .as_ref()
                .map(|path| path.display().to_string()),
            timestamp_secs: self.context.timestamp_secs(),
            retryable: self.retryable,
        }
    }

    /// Single JSON log line for the audit sink.
    pub fn to_log_line(&self) -> String {
        serde_json::to_string(&self.to_record())
            .unwrap_or_else(|_| format!("{{\"message\":\"{}\"}}", self.message))
    }
}

/// Read-only view of a logged error. Deserialized for querying, never
/// re-executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub message: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub timestamp_secs: u64,
    pub retryable: bool,
}

impl ErrorRecord {
    /// Parse one JSON log line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

struct CategoryDefaults {
    severity: Severity,
    strategy: RecoveryStrategy,
    retryable: bool,
    user_friendly: bool,
}

fn category_defaults(category: ErrorCategory) -> CategoryDefaults {
    match category {
        ErrorCategory::System => CategoryDefaults {
            severity: Severity::Critical,
            strategy: RecoveryStrategy::new(RecoveryAction::Abort),
            retryable: false,
            user_friendly: true,
        },
        ErrorCategory::Configuration => CategoryDefaults {
            severity: Severity::High,
            strategy: RecoveryStrategy::new(RecoveryAction::UserIntervention),
            retryable: false,
            user_friendly: true,
        },
        ErrorCategory::Planning => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::Fallback),
            retryable: false,
            user_friendly: false,
        },
        ErrorCategory::Execution => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::UserIntervention),
            retryable: false,
            user_friendly: true,
        },
        ErrorCategory::Safety => CategoryDefaults {
            severity: Severity::High,
            strategy: RecoveryStrategy::new(RecoveryAction::Abort),
            retryable: false,
            user_friendly: true,
        },
        ErrorCategory::Ai => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::Fallback),
            retryable: true,
            user_friendly: false,
        },
        ErrorCategory::Filesystem => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::Retry)
                .with_retries(3, Duration::from_millis(1000)),
            retryable: true,
            user_friendly: false,
        },
        ErrorCategory::Network => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::Fallback),
            retryable: true,
            user_friendly: false,
        },
        ErrorCategory::Validation => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::UserIntervention),
            retryable: false,
            user_friendly: true,
        },
        ErrorCategory::UserInput => CategoryDefaults {
            severity: Severity::Medium,
            strategy: RecoveryStrategy::new(RecoveryAction::Abort),
            retryable: false,
            user_friendly: true,
        },
    }
}
