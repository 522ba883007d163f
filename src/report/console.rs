use super::types::RunReport;
use crate::runner::state::{Outcome, RunSummary};
use colored::Colorize;

/// Render the end-of-run summary block
pub fn render_summary(report: &RunReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();
    out.push_str(&"=".repeat(60));
    out.push_str("\nTEST RESULTS SUMMARY\n");
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format!("Suite: {}\n", report.suite_name));
    out.push_str(&format!("Base URL: {}\n\n", report.base_url));

    for result in &report.results {
        out.push_str(&format!(
            "{} {}: {}\n",
            result.outcome.symbol(),
            result.name,
            result.detail
        ));
    }

    out.push_str(&format!("\n{}\n", totals_line(summary)));
    let verdict = if summary.success() {
        "RESULT: SUCCESS"
    } else {
        "RESULT: FAILURE"
    };
    out.push_str(verdict);
    out.push('\n');
    out
}

/// "Total: 10 | Passed: 8 | Failed: 1 | Skipped: 1"
pub fn totals_line(summary: &RunSummary) -> String {
    format!(
        "Total: {} | Passed: {} | Failed: {} | Skipped: {}",
        summary.total, summary.passed, summary.failed, summary.skipped
    )
}

/// Print the summary with colors
pub fn print_summary(report: &RunReport) {
    println!();
    for line in render_summary(report).lines() {
        if line.starts_with(Outcome::Fail.symbol()) || line == "RESULT: FAILURE" {
            println!("{}", line.red());
        } else if line.starts_with(Outcome::Skip.symbol()) {
            println!("{}", line.yellow());
        } else if line.starts_with(Outcome::Pass.symbol()) || line == "RESULT: SUCCESS" {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{CaseResult, FailureKind};

    fn report(results: Vec<CaseResult>) -> RunReport {
        RunReport {
            session_id: "s".into(),
            suite_name: "backend".into(),
            base_url: "http://localhost:3000/api".into(),
            summary: RunSummary::from_results(&results, None),
            results,
            generated_at: String::new(),
        }
    }

    #[test]
    fn test_summary_lists_every_case_with_symbol() {
        let text = render_summary(&report(vec![
            CaseResult::pass(0, "Register User", "HTTP 201: 4 checks passed".into()),
            CaseResult::fail(1, "Get Current User", FailureKind::Protocol, "HTTP 401: Unauthorized".into()),
            CaseResult::skip(2, "Update Meal", "prerequisite 'Create Meal' did not pass (fail)".into()),
        ]));

        assert!(text.contains("TEST RESULTS SUMMARY"));
        assert!(text.contains("✅ Register User: HTTP 201: 4 checks passed"));
        assert!(text.contains("❌ Get Current User: HTTP 401: Unauthorized"));
        assert!(text.contains("⏭️ Update Meal"));
        assert!(text.contains("Total: 3 | Passed: 1 | Failed: 1 | Skipped: 1"));
        assert!(text.ends_with("RESULT: FAILURE\n"));
    }

    #[test]
    fn test_empty_run_is_failure() {
        let text = render_summary(&report(vec![]));
        assert!(text.contains("RESULT: FAILURE"));
    }
}
