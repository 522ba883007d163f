pub mod console;
pub mod json;
pub mod junit;
pub mod types;

use anyhow::Result;
use std::path::Path;

/// Generate report from a results file
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let report = json::load(results_path)?;

    match format {
        "json" => json::generate(&report, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&report)?;
            emit(&xml, output, "JUnit")
        }
        "text" => emit(&console::render_summary(&report), output, "Text"),
        _ => anyhow::bail!("Unknown format: {} (expected json, junit or text)", format),
    }
}

fn emit(content: &str, output: Option<&Path>, label: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            println!("{} report saved to: {}", label, path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Write `results.json` and `junit.xml` into a directory
pub fn write_reports(report: &types::RunReport, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    json::write_report(report, output_dir)?;
    junit::write_report(report, output_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{CaseResult, RunSummary};

    #[test]
    fn test_generate_report_formats() {
        let results = vec![CaseResult::pass(0, "Get Meals", "HTTP 200: 1 check passed (3 items)".into())];
        let report = types::RunReport {
            session_id: "s".into(),
            suite_name: "backend".into(),
            base_url: "http://h".into(),
            summary: RunSummary::from_results(&results, None),
            results,
            generated_at: String::new(),
        };
        let dir = std::env::temp_dir().join(format!("forkcast-report-{}", uuid::Uuid::new_v4()));
        write_reports(&report, &dir).unwrap();
        assert!(dir.join("junit.xml").exists());

        let results_path = dir.join("results.json");
        let text_path = dir.join("summary.txt");
        generate_report(&results_path, "text", Some(&text_path)).unwrap();
        let text = std::fs::read_to_string(&text_path).unwrap();
        assert!(text.contains("RESULT: SUCCESS"));

        assert!(generate_report(&results_path, "html", None).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
