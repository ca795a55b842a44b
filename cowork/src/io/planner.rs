//! Planning oracle seam.
//!
//! The [`Planner`] trait decouples the engine from how candidate plans are
//! produced (rule-based matching here, a remote model elsewhere). Whatever
//! the source, the output is untrusted data: it only enters the engine
//! through the validator. Tests use scripted planners that return
//! predetermined plans.

use anyhow::Result;
use serde_json::{Value, json};
use tracing::debug;

/// Abstraction over candidate-plan sources.
pub trait Planner {
    /// Propose a raw candidate plan for a goal. `None` means the goal
    /// matched no known pattern; that outcome is terminal, not an error.
    fn plan(&self, goal: &str) -> Result<Option<Value>>;
}

/// Rule-based planner: keyword matching over the goal text.
pub struct RulePlanner;

impl Planner for RulePlanner {
    fn plan(&self, goal: &str) -> Result<Option<Value>> {
        let lowered = goal.to_lowercase();

        let plan = if lowered.contains("organize") || lowered.contains("sort") {
            Some(json!({
                "goal": goal,
                "requiresConfirmation": true,
                "steps": [
                    {"type": "readFiles", "path": "."},
                    {"type": "createFolder", "folders": ["documents", "images"]}
                ]
            }))
        } else if lowered.contains("report") {
            Some(json!({
                "goal": goal,
                "steps": [
                    {"type": "extractData"},
                    {"type": "generateReport", "goal": goal, "outputPath": "report.md"}
                ]
            }))
        } else if lowered.contains("summarize") || lowered.contains("extract") {
            Some(json!({
                "goal": goal,
                "steps": [
                    {"type": "readFiles", "path": "."},
                    {"type": "extractData"}
                ]
            }))
        } else {
            None
        };

        debug!(matched = plan.is_some(), "rule planner evaluated goal");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organize_goal_yields_destructive_plan_with_confirmation() {
        let plan = RulePlanner
            .plan("organize receipts")
            .expect("plan")
            .expect("matched");
        assert_eq!(plan["requiresConfirmation"], true);
        assert_eq!(plan["steps"][0]["type"], "readFiles");
        assert_eq!(plan["steps"][1]["type"], "createFolder");
    }

    #[test]
    fn report_goal_yields_extract_then_report() {
        let plan = RulePlanner
            .plan("write a report about my files")
            .expect("plan")
            .expect("matched");
        assert_eq!(plan["steps"][0]["type"], "extractData");
        assert_eq!(plan["steps"][1]["type"], "generateReport");
        assert!(plan.get("requiresConfirmation").is_none());
    }

    #[test]
    fn unmatched_goal_yields_no_plan() {
        let plan = RulePlanner.plan("fold my laundry").expect("plan");
        assert!(plan.is_none());
    }
}
