//! Full pipeline test: planner output through validation into execution.

use std::fs;

use serde_json::json;

use cowork::core::validate::validate;
use cowork::executor::{ExecutionContext, run_plan};
use cowork::io::config::RetryConfig;
use cowork::io::confirm::AutoConfirmer;
use cowork::io::planner::Planner;
use cowork::recovery::RecoveryManager;
use cowork::test_support::{ScriptedConfirmer, ScriptedPlanner};

#[test]
fn scripted_plan_validates_and_executes() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("receipt1.pdf"), "pdf").expect("write");

    let planner = ScriptedPlanner {
        plan: Some(json!({
            "goal": "organize receipts",
            "requiresConfirmation": true,
            "steps": [
                {"type": "readFiles", "path": "."},
                {"type": "createFolder", "folders": ["documents", "images"]}
            ]
        })),
    };

    let raw = planner
        .plan("organize receipts")
        .expect("plan")
        .expect("matched");
    let plan = validate(&raw, temp.path(), 10).expect("valid plan");

    let mut ctx = ExecutionContext::new(temp.path(), false);
    let mut recovery = RecoveryManager::new(&RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 10,
    });
    let outcome = run_plan(&plan, &mut ctx, &AutoConfirmer, &mut recovery);

    assert!(outcome.completed);
    assert_eq!(outcome.results.len(), 2);
    assert!(temp.path().join("documents").is_dir());
    assert!(temp.path().join("images").is_dir());

    let listing = outcome.results[0].output.as_ref().expect("listing");
    let names: Vec<&str> = listing["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|entry| entry["name"].as_str())
        .collect();
    assert!(names.contains(&"receipt1.pdf"));
}

#[test]
fn scripted_plan_without_match_is_terminal() {
    let planner = ScriptedPlanner { plan: None };
    let raw = planner.plan("anything").expect("plan");
    assert!(raw.is_none());
}

#[test]
fn refused_destructive_step_truncates_pipeline_results() {
    let temp = tempfile::tempdir().expect("tempdir");

    let raw = json!({
        "goal": "write notes",
        "steps": [
            {"type": "writeFile", "filename": "notes.txt", "content": "hello"},
            {"type": "readFiles", "path": "."}
        ]
    });
    let plan = validate(&raw, temp.path(), 10).expect("valid plan");

    let mut ctx = ExecutionContext::new(temp.path(), false);
    let mut recovery = RecoveryManager::new(&RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 10,
    });
    let confirmer = ScriptedConfirmer::new(vec![false]);
    let outcome = run_plan(&plan, &mut ctx, &confirmer, &mut recovery);

    assert!(!outcome.completed);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(
        outcome.results[0].error.as_deref(),
        Some("User cancelled the operation")
    );
    assert!(!temp.path().join("notes.txt").exists());
}
