//! Risk classification for plan steps.
//!
//! [`check`] is a pure function of the step kind and its explicit
//! confirmation override; the risk table is fixed. Confirmation itself goes
//! through the injected [`crate::io::confirm::Confirmer`] seam.

use serde::{Deserialize, Serialize};

use crate::core::plan::{StepKind, TaskStep};

/// Risk classification for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Outcome of classifying one step. Derived purely from the step; no
/// persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyCheck {
    pub is_destructive: bool,
    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
    pub requires_confirmation: bool,
}

/// Classify a step against the fixed risk table.
pub fn check(step: &TaskStep) -> SafetyCheck {
    let (risk_level, warning) = classify(&step.kind);
    let is_destructive = step.kind.is_destructive();
    SafetyCheck {
        is_destructive,
        risk_level,
        warnings: warning.map(|text| vec![text.to_string()]).unwrap_or_default(),
        requires_confirmation: is_destructive || step.requires_confirmation,
    }
}

fn classify(kind: &StepKind) -> (RiskLevel, Option<&'static str>) {
    match kind {
        StepKind::ReadFiles { .. } => (RiskLevel::Low, None),
        StepKind::ExtractData { .. } => (RiskLevel::Low, None),
        StepKind::GenerateReport { .. } => (RiskLevel::Medium, None),
        StepKind::CreateFolder { .. } => (RiskLevel::Medium, Some("will create a new directory")),
        StepKind::WriteFile { .. } => (RiskLevel::High, Some("will create or overwrite a file")),
        StepKind::RenameFile { .. } => (RiskLevel::High, Some("will rename a file")),
    }
}

/// Render the dry-run line for a step without executing anything.
pub fn dry_run_log(step: &TaskStep) -> String {
    let check = check(step);
    format!(
        "[DRY RUN] {}: {} (Risk: {})",
        step.kind.label(),
        step.description,
        check.risk_level.as_str()
    )
}

/// Render the confirmation prompt shown for a step that requires it.
pub fn confirmation_prompt(step: &TaskStep, check: &SafetyCheck) -> String {
    let mut prompt = format!(
        "{} [risk: {}]",
        step.description,
        check.risk_level.as_str()
    );
    for warning in &check.warnings {
        prompt.push_str(&format!(" ({warning})"));
    }
    prompt.push_str(". Proceed?");
    prompt
}
