//! Plan execution CLI.
//!
//! Turns a natural-language goal into a candidate plan (rule-based oracle,
//! or a plan file), validates it, and executes it inside the workspace
//! sandbox. The engine is the only component that touches the disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use cowork::core::plan::TaskPlan;
use cowork::core::validate::validate;
use cowork::executor::{ExecutionContext, run_plan};
use cowork::exit_codes;
use cowork::io::config::{EngineConfig, load_config};
use cowork::io::confirm::{AutoConfirmer, Confirmer, TerminalConfirmer};
use cowork::io::planner::{Planner, RulePlanner};
use cowork::recovery::RecoveryManager;

#[derive(Parser)]
#[command(
    name = "cowork",
    version,
    about = "Sandboxed execution engine for oracle-proposed file plans"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a goal and execute it inside the workspace.
    Run {
        /// Natural-language goal handed to the planning oracle.
        goal: String,
        /// Workspace directory that bounds every filesystem action.
        #[arg(short, long)]
        workspace: PathBuf,
        /// Report intended actions without touching the workspace.
        #[arg(long)]
        dry_run: bool,
        /// Approve destructive steps without prompting (non-interactive mode).
        #[arg(short = 'y', long)]
        yes: bool,
        /// Execute a candidate plan from a JSON file instead of the oracle.
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// Validate a candidate plan file without executing anything.
    Validate {
        /// Candidate plan JSON file.
        #[arg(long)]
        plan: PathBuf,
        /// Workspace the plan would run against.
        #[arg(short, long)]
        workspace: PathBuf,
    },
    /// Print the oracle's proposed plan for a goal as JSON.
    Plan {
        goal: String,
        /// Workspace the plan would run against.
        #[arg(short, long)]
        workspace: PathBuf,
    },
}

fn main() {
    cowork::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            goal,
            workspace,
            dry_run,
            yes,
            plan,
        } => cmd_run(&goal, &workspace, dry_run, yes, plan.as_deref()),
        Command::Validate { plan, workspace } => cmd_validate(&plan, &workspace),
        Command::Plan { goal, workspace } => cmd_plan(&goal, &workspace),
    }
}

fn cmd_run(
    goal: &str,
    workspace: &Path,
    dry_run: bool,
    yes: bool,
    plan_file: Option<&Path>,
) -> Result<i32> {
    let (workspace, config) = load_workspace(workspace)?;

    let raw = match plan_file {
        Some(path) => Some(read_plan_file(path)?),
        None => RulePlanner.plan(goal).context("plan goal")?,
    };
    let Some(raw) = raw else {
        println!("goal matched no known pattern; nothing to do");
        return Ok(exit_codes::OK);
    };

    let plan = match validate(&raw, &workspace, config.limits.max_steps) {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("{err}");
            return Ok(exit_codes::INVALID);
        }
    };

    println!(
        "plan {}: {} step(s), estimated budget {}s",
        plan.id,
        plan.steps.len(),
        plan.estimated_duration().as_secs()
    );

    let mut ctx = ExecutionContext::new(&workspace, dry_run);
    let confirmer: Box<dyn Confirmer> = if yes {
        Box::new(AutoConfirmer)
    } else {
        Box::new(TerminalConfirmer)
    };
    let mut recovery = RecoveryManager::new(&config.retry);

    let outcome = run_plan(&plan, &mut ctx, confirmer.as_ref(), &mut recovery);

    if dry_run {
        for line in ctx.logs.iter().filter(|line| line.starts_with("[DRY RUN]")) {
            println!("{line}");
        }
    }
    for result in &outcome.results {
        let status = if result.success { "ok" } else { "failed" };
        println!("{status} {} ({}ms)", result.step_id, result.duration.as_millis());
    }

    if let Some(failure) = outcome.first_failure() {
        report_failure(&plan, failure);
        return Ok(exit_codes::STEP_FAILED);
    }
    if !outcome.completed {
        eprintln!("run cancelled before completion");
        return Ok(exit_codes::STEP_FAILED);
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(plan_path: &Path, workspace: &Path) -> Result<i32> {
    let (workspace, config) = load_workspace(workspace)?;
    let raw = read_plan_file(plan_path)?;
    match validate(&raw, &workspace, config.limits.max_steps) {
        Ok(plan) => {
            println!("plan ok: {} step(s)", plan.steps.len());
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(exit_codes::INVALID)
        }
    }
}

fn cmd_plan(goal: &str, workspace: &Path) -> Result<i32> {
    let (workspace, config) = load_workspace(workspace)?;
    let Some(raw) = RulePlanner.plan(goal).context("plan goal")? else {
        println!("goal matched no known pattern");
        return Ok(exit_codes::OK);
    };
    match validate(&raw, &workspace, config.limits.max_steps) {
        Ok(plan) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("serialize plan")?
            );
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(exit_codes::INVALID)
        }
    }
}

/// Canonicalize the workspace and load its optional `cowork.toml`.
fn load_workspace(workspace: &Path) -> Result<(PathBuf, EngineConfig)> {
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("resolve workspace {}", workspace.display()))?;
    let config = load_config(&workspace.join("cowork.toml")).context("load engine config")?;
    Ok((workspace, config))
}

fn read_plan_file(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// First failing step's message to the error stream, with its description
/// and risk level.
fn report_failure(plan: &TaskPlan, failure: &cowork::executor::ExecutorResult) {
    let step = plan.steps.iter().find(|step| step.id == failure.step_id);
    let message = failure.error.as_deref().unwrap_or("unknown error");
    match step {
        Some(step) => {
            let check = cowork::core::safety::check(step);
            eprintln!(
                "step '{}' (risk: {}) failed: {}",
                step.description,
                check.risk_level.as_str(),
                message
            );
        }
        None => eprintln!("step {} failed: {}", failure.step_id, message),
    }
}
