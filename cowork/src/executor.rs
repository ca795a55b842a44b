//! Orchestration for validated plan execution.
//!
//! Each step moves through safety check, confirmation (or dry-run
//! annotation), then sandboxed dispatch raced against the step timeout.
//! The plan runner is sequential and fail-fast: steps run in declared
//! order and execution stops at the first failure, because later steps may
//! depend on earlier steps' side effects.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::error::{CoworkError, ErrorCategory, ErrorContext};
use crate::core::plan::{StepKind, TaskPlan, TaskStep};
use crate::core::safety;
use crate::io::analyzer;
use crate::io::confirm::Confirmer;
use crate::io::fs_ops;
use crate::io::report;
use crate::recovery::RecoveryManager;

/// Mutable state owned by a single plan run. Never shared across runs.
#[derive(Debug)]
pub struct ExecutionContext {
    pub workspace: PathBuf,
    pub dry_run: bool,
    /// Append-only audit log for the presentation layer.
    pub logs: Vec<String>,
    /// Ids of steps the user approved during this run.
    pub confirmed_steps: HashSet<String>,
    cancel: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(workspace: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            workspace: workspace.into(),
            dry_run,
            logs: Vec::new(),
            confirmed_steps: HashSet::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Handle for external cancellation (e.g. a signal handler). Honored
    /// between steps; a step already running completes or times out.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Outcome of one executed step. Terminal: created once, then only
/// consumed by the runner and the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorResult {
    pub step_id: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ExecutorResult {
    fn succeeded(step_id: &str, output: Option<Value>, duration: Duration) -> Self {
        Self {
            step_id: step_id.to_string(),
            success: true,
            output,
            error: None,
            duration,
        }
    }

    fn failed(step_id: &str, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            step_id: step_id.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration,
        }
    }
}

/// Ordered per-step results, truncated at the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub plan_id: String,
    pub results: Vec<ExecutorResult>,
    pub completed: bool,
}

impl PlanOutcome {
    pub fn first_failure(&self) -> Option<&ExecutorResult> {
        self.results.iter().find(|result| !result.success)
    }
}

/// Execute one validated step against the sandboxed workspace.
#[instrument(skip_all, fields(step_id = %step.id, kind = step.kind.label()))]
pub fn run_step(
    step: &TaskStep,
    ctx: &mut ExecutionContext,
    confirmer: &dyn Confirmer,
    recovery: &mut RecoveryManager,
) -> ExecutorResult {
    let started = Instant::now();
    let check = safety::check(step);
    ctx.log(format!("[{}] {}", step.kind.label(), step.description));

    if ctx.dry_run {
        let line = safety::dry_run_log(step);
        debug!(%line, "dry run");
        ctx.log(line);
        return ExecutorResult::succeeded(&step.id, None, started.elapsed());
    }

    if check.requires_confirmation {
        let prompt = safety::confirmation_prompt(step, &check);
        match confirmer.confirm(&prompt) {
            Ok(true) => {
                ctx.confirmed_steps.insert(step.id.clone());
            }
            Ok(false) => {
                info!("step rejected by user");
                ctx.log(format!("step '{}' cancelled by user", step.description));
                return ExecutorResult::failed(
                    &step.id,
                    "User cancelled the operation",
                    started.elapsed(),
                );
            }
            Err(err) => {
                ctx.log(format!(
                    "step '{}' failed: confirmation unavailable: {err:#}",
                    step.description
                ));
                return ExecutorResult::failed(
                    &step.id,
                    format!("confirmation failed: {err:#}"),
                    started.elapsed(),
                );
            }
        }
    }

    let workspace = ctx.workspace.clone();
    let outcome = match dispatch_with_timeout(step, &workspace) {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.retryable && recovery.can_recover(&error) => {
            warn!(category = %error.category, "step failed, attempting recovery");
            recovery.attempt_recovery(error, || dispatch_with_timeout(step, &workspace), confirmer)
        }
        Err(error) => Err(error),
    };

    match outcome {
        Ok(output) => {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "step succeeded");
            ctx.log(format!("step '{}' succeeded", step.description));
            ExecutorResult::succeeded(&step.id, output, started.elapsed())
        }
        Err(error) => {
            warn!(category = %error.category, "step failed");
            ctx.log(format!(
                "step '{}' failed: {}",
                step.description,
                error.user_message()
            ));
            ctx.log(error.to_log_line());
            ExecutorResult::failed(&step.id, error.user_message(), started.elapsed())
        }
    }
}

/// Run all steps in declared order, stopping at the first failure.
///
/// Never reorders or parallelizes: exactly one step runs at a time per
/// plan run. External cancellation is honored between steps.
#[instrument(skip_all, fields(plan_id = %plan.id, steps = plan.steps.len()))]
pub fn run_plan(
    plan: &TaskPlan,
    ctx: &mut ExecutionContext,
    confirmer: &dyn Confirmer,
    recovery: &mut RecoveryManager,
) -> PlanOutcome {
    info!(goal = %plan.goal, dry_run = ctx.dry_run, "running plan");
    let mut results = Vec::with_capacity(plan.steps.len());
    let mut completed = true;

    for step in &plan.steps {
        if ctx.is_cancelled() {
            ctx.log(format!("run cancelled before step '{}'", step.id));
            completed = false;
            break;
        }
        let result = run_step(step, ctx, confirmer, recovery);
        let success = result.success;
        results.push(result);
        if !success {
            completed = false;
            break;
        }
    }

    PlanOutcome {
        plan_id: plan.id.clone(),
        results,
        completed,
    }
}

/// Dispatch a step's operation on a worker thread, raced against the step
/// timeout.
///
/// On timeout the worker is detached, not interrupted: a stuck filesystem
/// call finishes (or not) in the background while the step is reported as
/// timed out. Mid-step cancellation is therefore not instantaneous.
fn dispatch_with_timeout(step: &TaskStep, workspace: &Path) -> Result<Value, CoworkError> {
    let (tx, rx) = mpsc::channel();
    let kind = step.kind.clone();
    let worker_workspace = workspace.to_path_buf();
    thread::spawn(move || {
        let _ = tx.send(dispatch(&kind, &worker_workspace));
    });

    match rx.recv_timeout(step.timeout) {
        Ok(result) => result.map_err(|error| error.in_step(step.id.clone())),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CoworkError::new(
            ErrorCategory::Execution,
            format!("step timed out after {:?}", step.timeout),
            ErrorContext::new(step.kind.label())
                .with_step(step.id.clone())
                .with_workspace(workspace),
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CoworkError::new(
            ErrorCategory::System,
            "step worker terminated unexpectedly",
            ErrorContext::new(step.kind.label()).with_step(step.id.clone()),
        )),
    }
}

/// Dispatch on the step kind. Every target resolves its paths through the
/// sandbox before touching storage; unknown kinds cannot reach this point
/// (rejected by the validator).
fn dispatch(kind: &StepKind, workspace: &Path) -> Result<Value, CoworkError> {
    match kind {
        StepKind::ReadFiles {
            path,
            extensions,
            pattern,
        } => fs_ops::read_listing(workspace, path, extensions, pattern.as_deref()),
        StepKind::WriteFile { path, content } => fs_ops::write_file(workspace, path, content),
        StepKind::CreateFolder { folders } => fs_ops::create_folders(workspace, folders),
        StepKind::RenameFile {
            source_path,
            pattern,
            destination,
        } => fs_ops::rename_entry(
            workspace,
            source_path.as_deref(),
            pattern.as_deref(),
            destination,
        ),
        StepKind::ExtractData { path } => {
            let summary = analyzer::analyze(workspace, path.as_deref())?;
            serde_json::to_value(&summary).map_err(|err| {
                CoworkError::new(
                    ErrorCategory::System,
                    format!("serialize analysis summary: {err}"),
                    ErrorContext::new("extractData").with_workspace(workspace),
                )
            })
        }
        StepKind::GenerateReport { goal, output_path } => {
            let summary = analyzer::analyze(workspace, None)?;
            let rendered =
                report::render_report(goal.as_deref().unwrap_or("workspace summary"), &summary)?;
            match output_path {
                Some(path) => {
                    let written = fs_ops::write_file(workspace, path, &rendered)?;
                    Ok(json!({ "reportPath": path, "bytesWritten": written["bytesWritten"] }))
                }
                None => Ok(json!({ "content": rendered })),
            }
        }
    }
}
