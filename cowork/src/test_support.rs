//! Test-only fixtures for plans, confirmation, and planning.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::core::plan::{StepKind, TaskPlan, TaskStep};
use crate::io::confirm::Confirmer;
use crate::io::planner::Planner;

/// Create a step with a derived description and the kind's default timeout.
pub fn step_with_id(id: &str, kind: StepKind) -> TaskStep {
    TaskStep {
        id: id.to_string(),
        description: kind.describe(),
        requires_confirmation: false,
        timeout: kind.default_timeout(),
        kind,
    }
}

/// Create a plan over `workspace` with deterministic id.
pub fn plan_for(workspace: &Path, goal: &str, steps: Vec<TaskStep>) -> TaskPlan {
    TaskPlan {
        id: "plan-test".to_string(),
        goal: goal.to_string(),
        workspace: workspace.to_path_buf(),
        steps,
    }
}

/// Confirmer that replays scripted answers and records every prompt.
/// Answers are consumed front to back; when exhausted it refuses.
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    pub prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }
}

/// Planner that returns a predetermined candidate plan.
pub struct ScriptedPlanner {
    pub plan: Option<Value>,
}

impl Planner for ScriptedPlanner {
    fn plan(&self, _goal: &str) -> Result<Option<Value>> {
        Ok(self.plan.clone())
    }
}
