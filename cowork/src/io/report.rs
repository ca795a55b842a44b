//! Report rendering for `generateReport` steps.

use minijinja::{Environment, context};
use tracing::debug;

use crate::core::error::{CoworkError, ErrorCategory, ErrorContext};
use crate::io::analyzer::AnalysisSummary;

const REPORT_TEMPLATE: &str = include_str!("../../templates/report.md.j2");

/// Render the markdown report for a goal from an analyzer summary.
pub fn render_report(goal: &str, summary: &AnalysisSummary) -> Result<String, CoworkError> {
    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE).map_err(|err| {
        CoworkError::new(
            ErrorCategory::System,
            format!("report template failed to compile: {err}"),
            ErrorContext::new("generateReport"),
        )
    })?;

    let rendered = env
        .get_template("report")
        .and_then(|template| template.render(context! { goal, summary }))
        .map_err(|err| {
            CoworkError::new(
                ErrorCategory::Execution,
                format!("report rendering failed: {err}"),
                ErrorContext::new("generateReport"),
            )
        })?;

    debug!(bytes = rendered.len(), "rendered report");
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::analyzer::{FileCategory, FileSummary};
    use std::collections::BTreeMap;

    fn summary() -> AnalysisSummary {
        AnalysisSummary {
            files: vec![FileSummary {
                name: "receipt1.pdf".to_string(),
                category: FileCategory::Document,
                size_bytes: 1204,
            }],
            categories: BTreeMap::from([("document".to_string(), 1)]),
            keywords: vec!["receipt".to_string()],
        }
    }

    #[test]
    fn report_includes_goal_files_and_keywords() {
        let report = render_report("organize receipts", &summary()).expect("render");
        assert!(report.contains("Goal: organize receipts"));
        assert!(report.contains("receipt1.pdf"));
        assert!(report.contains("document: 1"));
        assert!(report.contains("receipt"));
    }

    #[test]
    fn report_handles_empty_summary() {
        let empty = AnalysisSummary {
            files: Vec::new(),
            categories: BTreeMap::new(),
            keywords: Vec::new(),
        };
        let report = render_report("anything", &empty).expect("render");
        assert!(report.contains("0 file(s) analyzed"));
        assert!(report.contains("none"));
    }
}
