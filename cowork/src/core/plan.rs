//! Typed plan model produced by the validator.
//!
//! A [`TaskPlan`] is created once from oracle output and is read-only
//! thereafter. Step kinds form a closed enum; unrecognized tags are rejected
//! during validation and never reach dispatch.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One typed filesystem operation and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StepKind {
    /// List directory contents, optionally filtered by extension or pattern.
    #[serde(rename_all = "camelCase")]
    ReadFiles {
        path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extensions: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    /// Create or overwrite a file with the given content.
    #[serde(rename_all = "camelCase")]
    WriteFile { path: String, content: String },
    /// Create one or more directories.
    #[serde(rename_all = "camelCase")]
    CreateFolder { folders: Vec<String> },
    /// Rename or move a file, addressed directly or by name pattern.
    #[serde(rename_all = "camelCase")]
    RenameFile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        destination: String,
    },
    /// Summarize workspace contents via the content analyzer.
    #[serde(rename_all = "camelCase")]
    ExtractData {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    /// Produce a report document from the analyzer summary.
    #[serde(rename_all = "camelCase")]
    GenerateReport {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        goal: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
    },
}

impl StepKind {
    /// DSL tag for this kind, as it appears in candidate plans.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::ReadFiles { .. } => "readFiles",
            StepKind::WriteFile { .. } => "writeFile",
            StepKind::CreateFolder { .. } => "createFolder",
            StepKind::RenameFile { .. } => "renameFile",
            StepKind::ExtractData { .. } => "extractData",
            StepKind::GenerateReport { .. } => "generateReport",
        }
    }

    /// True for kinds that create, overwrite, or rename filesystem entries.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            StepKind::WriteFile { .. } | StepKind::CreateFolder { .. } | StepKind::RenameFile { .. }
        )
    }

    /// Default wall-clock budget per kind. Reads are shortest; multi-file
    /// extraction and report generation are longest.
    pub fn default_timeout(&self) -> Duration {
        let secs = match self {
            StepKind::ReadFiles { .. } => 10,
            StepKind::WriteFile { .. } => 15,
            StepKind::CreateFolder { .. } => 15,
            StepKind::RenameFile { .. } => 15,
            StepKind::ExtractData { .. } => 45,
            StepKind::GenerateReport { .. } => 60,
        };
        Duration::from_secs(secs)
    }

    /// Human-readable summary used when the plan carries no description.
    pub fn describe(&self) -> String {
        match self {
            StepKind::ReadFiles { path, .. } => format!("list files in '{path}'"),
            StepKind::WriteFile { path, .. } => format!("write file '{path}'"),
            StepKind::CreateFolder { folders } => {
                format!("create folders {}", folders.join(", "))
            }
            StepKind::RenameFile {
                source_path,
                pattern,
                destination,
            } => {
                let source = source_path
                    .as_deref()
                    .or(pattern.as_deref())
                    .unwrap_or("<unspecified>");
                format!("rename '{source}' to '{destination}'")
            }
            StepKind::ExtractData { path } => match path {
                Some(path) => format!("extract data from '{path}'"),
                None => "extract data from the workspace".to_string(),
            },
            StepKind::GenerateReport { .. } => "generate a report".to_string(),
        }
    }
}

/// One validated step. Immutable once created by the validator; `id` is
/// unique within its plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    pub description: String,
    /// Explicit confirmation override from the plan; destructive kinds
    /// require confirmation regardless.
    pub requires_confirmation: bool,
    #[serde(rename = "timeoutMs", with = "duration_ms")]
    pub timeout: Duration,
}

/// A validated, read-only plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    pub id: String,
    pub goal: String,
    /// Absolute workspace root that bounds every step.
    pub workspace: PathBuf,
    pub steps: Vec<TaskStep>,
}

impl TaskPlan {
    /// Sum of step timeouts.
    pub fn estimated_duration(&self) -> Duration {
        self.steps.iter().map(|step| step.timeout).sum()
    }

    /// True if any step creates, overwrites, or renames entries.
    pub fn has_destructive_steps(&self) -> bool {
        self.steps.iter().any(|step| step.kind.is_destructive())
    }
}

/// Serialize a `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
