//! Candidate-plan validation: untyped oracle output in, [`TaskPlan`] out.
//!
//! Validation is total and side-effect-free: it never touches the
//! filesystem. Structural shape is checked against a JSON Schema
//! (Draft 2020-12); everything the schema cannot express (known step kinds,
//! per-kind parameters, step budget, confirmation consistency) is checked
//! semantically. All violations are collected, not just the first.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use jsonschema::Draft;
use serde_json::Value;
use thiserror::Error;

use crate::core::plan::{StepKind, TaskPlan, TaskStep};

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.schema.json");

const KNOWN_STEP_TYPES: [&str; 6] = [
    "readFiles",
    "writeFile",
    "createFolder",
    "renameFile",
    "extractData",
    "generateReport",
];

/// A candidate plan rejected with the full list of violations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("plan validation failed:\n- {}", .violations.join("\n- "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

/// Validate a raw candidate plan against the workspace and step budget.
///
/// The returned plan is read-only: steps carry validator-assigned unique
/// ids (`step-1..step-n`), a description, an explicit confirmation
/// override, and a per-kind timeout.
pub fn validate(raw: &Value, workspace: &Path, max_steps: usize) -> Result<TaskPlan, ValidationError> {
    let schema_violations = check_schema(raw);
    if !schema_violations.is_empty() {
        return Err(ValidationError {
            violations: schema_violations,
        });
    }

    let mut violations = Vec::new();

    if !workspace.is_absolute() {
        violations.push(format!(
            "workspace path '{}' must be absolute",
            workspace.display()
        ));
    }

    let goal = raw["goal"].as_str().unwrap_or_default().trim().to_string();
    let raw_steps = raw["steps"].as_array().cloned().unwrap_or_default();

    if raw_steps.is_empty() {
        violations.push("plan has no steps".to_string());
    }
    if raw_steps.len() > max_steps {
        violations.push(format!(
            "plan exceeds maximum step limit ({} steps, limit {})",
            raw_steps.len(),
            max_steps
        ));
    }

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (index, raw_step) in raw_steps.iter().enumerate() {
        let id = format!("step-{}", index + 1);
        match build_step(raw_step, &id) {
            Ok(step) => steps.push(step),
            Err(mut step_violations) => violations.append(&mut step_violations),
        }
    }

    check_confirmation_consistency(raw, &steps, &mut violations);

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    Ok(TaskPlan {
        id: plan_id(&goal),
        goal,
        workspace: workspace.to_path_buf(),
        steps,
    })
}

/// Validate against the structural schema, collecting every message.
fn check_schema(raw: &Value) -> Vec<String> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).expect("embedded plan schema is valid");
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("embedded plan schema compiles");
    compiled
        .iter_errors(raw)
        .map(|err| err.to_string())
        .collect()
}

/// Build one typed step, or report every violation for it.
fn build_step(raw_step: &Value, id: &str) -> Result<TaskStep, Vec<String>> {
    let step_type = raw_step["type"].as_str().unwrap_or_default();
    if !KNOWN_STEP_TYPES.contains(&step_type) {
        return Err(vec![format!("{id}: unknown step type: {step_type}")]);
    }

    let mut violations = Vec::new();
    let kind = match step_type {
        "readFiles" => {
            let path = require_string(raw_step, id, "path", &mut violations);
            let extensions = raw_step["extensions"]
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let pattern = optional_string(raw_step, "pattern");
            if let Some(pattern) = &pattern
                && regex::Regex::new(pattern).is_err()
            {
                violations.push(format!("{id}: field 'pattern' is not a valid pattern"));
            }
            StepKind::ReadFiles {
                path,
                extensions,
                pattern,
            }
        }
        "writeFile" => {
            // The DSL accepts either `filename` or `path` for the target.
            let path = optional_string(raw_step, "path")
                .or_else(|| optional_string(raw_step, "filename"))
                .unwrap_or_else(|| {
                    violations.push(format!("{id}: missing required field 'filename'"));
                    String::new()
                });
            let content = require_string(raw_step, id, "content", &mut violations);
            StepKind::WriteFile { path, content }
        }
        "createFolder" => {
            let folders: Vec<String> = raw_step["folders"]
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if folders.is_empty() {
                violations.push(format!("{id}: field 'folders' must be a non-empty array"));
            }
            StepKind::CreateFolder { folders }
        }
        "renameFile" => {
            let source_path = optional_string(raw_step, "sourcePath");
            let pattern = optional_string(raw_step, "pattern");
            if source_path.is_none() && pattern.is_none() {
                violations.push(format!(
                    "{id}: one of 'sourcePath' or 'pattern' is required"
                ));
            }
            if let Some(pattern) = &pattern
                && regex::Regex::new(pattern).is_err()
            {
                violations.push(format!("{id}: field 'pattern' is not a valid pattern"));
            }
            let destination = optional_string(raw_step, "destination")
                .or_else(|| optional_string(raw_step, "destinationPath"))
                .unwrap_or_else(|| {
                    violations.push(format!("{id}: missing required field 'destination'"));
                    String::new()
                });
            StepKind::RenameFile {
                source_path,
                pattern,
                destination,
            }
        }
        "extractData" => StepKind::ExtractData {
            path: optional_string(raw_step, "path"),
        },
        "generateReport" => StepKind::GenerateReport {
            goal: optional_string(raw_step, "goal"),
            output_path: optional_string(raw_step, "outputPath"),
        },
        _ => unreachable!("unknown types are rejected above"),
    };

    if !violations.is_empty() {
        return Err(violations);
    }

    let description = optional_string(raw_step, "description").unwrap_or_else(|| kind.describe());
    let timeout = raw_step["timeoutMs"]
        .as_u64()
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| kind.default_timeout());

    Ok(TaskStep {
        id: id.to_string(),
        description,
        requires_confirmation: raw_step["requiresConfirmation"].as_bool().unwrap_or(false),
        timeout,
        kind,
    })
}

/// The plan-level confirmation flag, where present, must equal the union of
/// destructiveness across the steps.
fn check_confirmation_consistency(raw: &Value, steps: &[TaskStep], violations: &mut Vec<String>) {
    let Some(declared) = raw["requiresConfirmation"].as_bool() else {
        return;
    };
    let any_destructive = steps.iter().any(|step| step.kind.is_destructive());
    if any_destructive && !declared {
        violations.push(
            "plan contains destructive steps but declares requiresConfirmation false; \
             confirmation is required"
                .to_string(),
        );
    }
    if !any_destructive && declared {
        violations.push(
            "plan declares requiresConfirmation true but contains no destructive steps; \
             confirmation must not be requested"
                .to_string(),
        );
    }
}

fn require_string(raw_step: &Value, id: &str, field: &str, violations: &mut Vec<String>) -> String {
    match raw_step[field].as_str() {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => {
            violations.push(format!("{id}: missing required field '{field}'"));
            String::new()
        }
    }
}

fn optional_string(raw_step: &Value, field: &str) -> Option<String> {
    raw_step[field]
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Deterministic plan id derived from the goal text.
fn plan_id(goal: &str) -> String {
    let mut hasher = DefaultHasher::new();
    goal.hash(&mut hasher);
    format!("plan-{:08x}", hasher.finish() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    const MAX_STEPS: usize = 10;

    fn workspace() -> PathBuf {
        PathBuf::from("/work/space")
    }

    fn organize_plan() -> Value {
        json!({
            "goal": "organize receipts",
            "requiresConfirmation": true,
            "steps": [
                {"type": "readFiles", "path": "."},
                {"type": "createFolder", "folders": ["documents", "images"]}
            ]
        })
    }

    #[test]
    fn accepts_well_formed_plan() {
        let plan = validate(&organize_plan(), &workspace(), MAX_STEPS).expect("valid plan");
        assert_eq!(plan.goal, "organize receipts");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].id, "step-1");
        assert_eq!(plan.steps[1].id, "step-2");
        assert!(plan.has_destructive_steps());
        assert_eq!(plan.workspace, workspace());
    }

    #[test]
    fn plan_ids_are_deterministic_per_goal() {
        let first = validate(&organize_plan(), &workspace(), MAX_STEPS).expect("valid");
        let second = validate(&organize_plan(), &workspace(), MAX_STEPS).expect("valid");
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn rejects_empty_steps() {
        let raw = json!({"goal": "nothing", "steps": []});
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert!(err.violations.iter().any(|v| v.contains("no steps")));
    }

    #[test]
    fn rejects_unknown_step_type() {
        let raw = json!({"goal": "g", "steps": [{"type": "frobnicate"}]});
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert_eq!(
            err.violations,
            vec!["step-1: unknown step type: frobnicate".to_string()]
        );
    }

    #[test]
    fn rejects_step_count_over_limit() {
        let steps: Vec<Value> = (0..4).map(|_| json!({"type": "extractData"})).collect();
        let raw = json!({"goal": "g", "steps": steps});
        let err = validate(&raw, &workspace(), 3).expect_err("must fail");
        assert!(
            err.violations
                .iter()
                .any(|v| v.contains("maximum step limit"))
        );
    }

    #[test]
    fn rejects_destructive_plan_declaring_no_confirmation() {
        let raw = json!({
            "goal": "g",
            "requiresConfirmation": false,
            "steps": [{"type": "writeFile", "filename": "out.txt", "content": "hi"}]
        });
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert!(err.violations.iter().any(|v| v.contains("confirmation")));
    }

    #[test]
    fn rejects_confirmation_flag_without_destructive_steps() {
        let raw = json!({
            "goal": "g",
            "requiresConfirmation": true,
            "steps": [{"type": "readFiles", "path": "."}]
        });
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert!(err.violations.iter().any(|v| v.contains("confirmation")));
    }

    #[test]
    fn accepts_plan_without_confirmation_flag() {
        let raw = json!({
            "goal": "g",
            "steps": [{"type": "writeFile", "filename": "out.txt", "content": "hi"}]
        });
        validate(&raw, &workspace(), MAX_STEPS).expect("flag is optional in the DSL");
    }

    #[test]
    fn collects_all_violations_not_just_first() {
        let raw = json!({
            "goal": "g",
            "requiresConfirmation": true,
            "steps": [
                {"type": "readFiles"},
                {"type": "renameFile"},
                {"type": "frobnicate"}
            ]
        });
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert!(err.violations.len() >= 4, "got: {:?}", err.violations);
        assert!(err.violations.iter().any(|v| v.contains("'path'")));
        assert!(err.violations.iter().any(|v| v.contains("'sourcePath'")));
        assert!(err.violations.iter().any(|v| v.contains("unknown step type")));
    }

    #[test]
    fn rejects_missing_goal_via_schema() {
        let raw = json!({"steps": [{"type": "extractData"}]});
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert!(!err.violations.is_empty());
    }

    #[test]
    fn rejects_relative_workspace() {
        let err = validate(&organize_plan(), Path::new("relative/dir"), MAX_STEPS)
            .expect_err("must fail");
        assert!(err.violations.iter().any(|v| v.contains("absolute")));
    }

    #[test]
    fn rejects_invalid_rename_pattern() {
        let raw = json!({
            "goal": "g",
            "steps": [{"type": "renameFile", "pattern": "[unclosed", "destination": "d"}]
        });
        let err = validate(&raw, &workspace(), MAX_STEPS).expect_err("must fail");
        assert!(err.violations.iter().any(|v| v.contains("pattern")));
    }

    #[test]
    fn write_file_accepts_filename_alias() {
        let raw = json!({
            "goal": "g",
            "steps": [{"type": "writeFile", "filename": "out.txt", "content": "hi"}]
        });
        let plan = validate(&raw, &workspace(), MAX_STEPS).expect("valid");
        assert_eq!(
            plan.steps[0].kind,
            StepKind::WriteFile {
                path: "out.txt".to_string(),
                content: "hi".to_string()
            }
        );
    }

    #[test]
    fn per_step_timeout_override_is_honored() {
        let raw = json!({
            "goal": "g",
            "steps": [{"type": "extractData", "timeoutMs": 500}]
        });
        let plan = validate(&raw, &workspace(), MAX_STEPS).expect("valid");
        assert_eq!(plan.steps[0].timeout, std::time::Duration::from_millis(500));
    }
}
