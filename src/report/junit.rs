use super::types::RunReport;
use crate::runner::state::{CaseResult, Outcome};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// Generate JUnit XML report string from a run report
pub fn generate_junit_xml(report: &RunReport) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let summary = &report.summary;
    let total_duration = summary.total_duration_ms.unwrap_or_else(|| {
        report
            .results
            .iter()
            .map(|r| r.duration_ms.unwrap_or(0))
            .sum()
    });

    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "forkcast-tester-run"));
    suites_start.push_attribute(("tests", summary.total.to_string().as_str()));
    suites_start.push_attribute(("failures", summary.failed.to_string().as_str()));
    suites_start.push_attribute(("skipped", summary.skipped.to_string().as_str()));
    suites_start.push_attribute(("time", seconds(total_duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", report.suite_name.as_str()));
    suite_start.push_attribute(("tests", summary.total.to_string().as_str()));
    suite_start.push_attribute(("failures", summary.failed.to_string().as_str()));
    suite_start.push_attribute(("skipped", summary.skipped.to_string().as_str()));
    suite_start.push_attribute(("id", report.session_id.as_str()));
    suite_start.push_attribute(("time", seconds(total_duration).as_str()));
    suite_start.push_attribute(("timestamp", report.generated_at.as_str()));
    suite_start.push_attribute(("hostname", report.base_url.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for result in &report.results {
        write_test_case(&mut writer, &report.suite_name, result)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result)?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    suite_name: &str,
    result: &CaseResult,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", result.name.as_str()));
    case_start.push_attribute(("classname", suite_name));
    case_start.push_attribute(("time", seconds(result.duration_ms.unwrap_or(0)).as_str()));
    writer.write_event(Event::Start(case_start))?;

    match result.outcome {
        Outcome::Fail => {
            let kind = result
                .failure_kind
                .map(|k| format!("{:?}Error", k))
                .unwrap_or_else(|| "Error".to_string());
            let mut fail_start = BytesStart::new("failure");
            fail_start.push_attribute(("message", result.detail.as_str()));
            fail_start.push_attribute(("type", kind.as_str()));
            writer.write_event(Event::Start(fail_start))?;
            writer.write_event(Event::Text(BytesText::new(&result.detail)))?;
            writer.write_event(Event::End(BytesEnd::new("failure")))?;
        }
        Outcome::Skip => {
            let mut skip = BytesStart::new("skipped");
            skip.push_attribute(("message", result.detail.as_str()));
            writer.write_event(Event::Empty(skip))?;
        }
        Outcome::Pass => {}
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write report to file
pub fn write_report(report: &RunReport, output_dir: &Path) -> Result<()> {
    let xml = generate_junit_xml(report)?;
    let path = output_dir.join("junit.xml");
    std::fs::write(&path, xml)?;
    println!("    Generated JUnit report: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{FailureKind, RunSummary};

    #[test]
    fn test_generate_junit_xml() {
        let results = vec![
            CaseResult::pass(0, "Register User", "HTTP 201: 4 checks passed".into()),
            CaseResult::fail(
                1,
                "Create Meal",
                FailureKind::Protocol,
                "HTTP 500: <boom> & co".into(),
            ),
            CaseResult::skip(2, "Update Meal", "prerequisite 'Create Meal' did not pass (fail)".into()),
        ];
        let report = RunReport {
            session_id: "test-session".to_string(),
            suite_name: "backend".to_string(),
            base_url: "http://localhost:3000/api".to_string(),
            summary: RunSummary::from_results(&results, Some(3500)),
            results,
            generated_at: "2023-01-01T12:00:00+00:00".to_string(),
        };

        let xml = generate_junit_xml(&report).expect("Failed to generate XML");

        assert!(xml.contains(r#"<testsuites name="forkcast-tester-run""#));
        assert!(xml.contains(r#"tests="3""#));
        assert!(xml.contains(r#"failures="1""#));
        assert!(xml.contains(r#"skipped="1""#));
        assert!(xml.contains(r#"<testcase name="Register User""#));
        assert!(xml.contains(r#"type="ProtocolError""#));
        assert!(xml.contains("HTTP 500: &lt;boom&gt; &amp; co"));
        assert!(xml.contains(r#"<skipped message="prerequisite"#));
    }
}
