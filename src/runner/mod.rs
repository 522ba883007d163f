pub mod context;
pub mod events;
pub mod executor;
pub mod state;

use anyhow::Result;
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::parser::{parse_suite_file, TestSuite};
use crate::report;
use crate::utils::config::{Config, Overrides};
use context::SessionContext;
pub use events::*;
use executor::SuiteRunner;
pub use state::*;

/// Options for `run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub overrides: Overrides,

    /// `--var key=value` pairs
    pub vars: HashMap<String, String>,

    /// Only run suites carrying one of these tags
    pub tags: Option<Vec<String>>,
}

/// Run a suite file, or every suite under a directory, and return the combined summary
pub async fn run_tests(path: &Path, options: &RunOptions) -> Result<RunSummary> {
    let files = collect_suite_files(path)?;
    if files.is_empty() {
        println!("{} No suite files found.", "ℹ".blue());
        return Ok(RunSummary::default());
    }

    let mut total = RunSummary::default();
    let mut suites_run = 0;

    for file in &files {
        let suite = parse_suite_file(file)?;

        if let Some(filter) = &options.tags {
            if !suite.tags.iter().any(|t| filter.contains(t)) {
                log::info!("skipping {}: no matching tag", file.display());
                continue;
            }
        }

        let summary = run_suite(file, &suite, options).await?;
        total.merge(&summary);
        suites_run += 1;
    }

    if suites_run > 1 {
        println!(
            "\n{} {} suites: {}",
            "■".blue().bold(),
            suites_run,
            report::console::totals_line(&total)
        );
    }

    Ok(total)
}

/// Run one parsed suite with a fresh session
pub async fn run_suite(file: &Path, suite: &TestSuite, options: &RunOptions) -> Result<RunSummary> {
    let config = Config::resolve(suite, &options.overrides);
    let client = config.build_client()?;
    let suite_name = suite.name.clone().unwrap_or_else(|| "suite".to_string());

    let mut session = SessionContext::new(config.base_url()?);
    if let Some(dir) = file.parent() {
        session.base_dir = dir.to_path_buf();
    }
    session.update_from_suite(suite);
    session.merge_vars(&options.vars);

    let runner = SuiteRunner::new(client);
    let listener = tokio::spawn(ConsoleEventListener::listen(runner.subscribe()));

    let state = runner.run(&suite_name, &suite.cases, &mut session).await;

    // Closing the channel lets the listener drain and return
    drop(runner);
    let _ = listener.await;

    let run_report = state.to_report();
    report::console::print_summary(&run_report);

    if config.write_reports {
        let dir = config.output_dir.join(report_dir_name(&suite_name));
        report::write_reports(&run_report, &dir)?;
    }

    Ok(run_report.summary)
}

fn collect_suite_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path not found: {}", path.display());
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

fn report_dir_name(suite_name: &str) -> String {
    suite_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_report_dir_name() {
        assert_eq!(report_dir_name("Forkcast backend"), "Forkcast_backend");
        assert_eq!(report_dir_name("a/b"), "a_b");
    }

    #[test]
    fn test_collect_suite_files_from_directory() {
        let dir = std::env::temp_dir().join(format!("forkcast-suites-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("b.yaml"), "[]").unwrap();
        std::fs::write(dir.join("nested/a.yml"), "[]").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();

        let files = collect_suite_files(&dir).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().is_some_and(|e| e != "txt")));

        assert!(collect_suite_files(&dir.join("missing")).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_run_tests_writes_reports() {
        let app = Router::new()
            .route(
                "/auth/register",
                post(|| async {
                    Json(json!({"token": "t", "user": {"id": "1", "username": "u", "createdAt": "now"}}))
                }),
            )
            .route("/meals", get(|| async { Json(json!([])) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = std::env::temp_dir().join(format!("forkcast-run-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let suite_path = dir.join("smoke.yaml");
        std::fs::write(
            &suite_path,
            r#"name: smoke
---
- name: register
  method: POST
  path: /auth/register
  body: { username: "${username}", password: secret }
  captureToken: token
- name: list
  path: /meals
  expect:
    - isType: { kind: array }
"#,
        )
        .unwrap();

        let options = RunOptions {
            overrides: Overrides {
                base_url: Some(format!("http://{}", addr)),
                timeout_ms: Some(5000),
                output_dir: Some(dir.join("out")),
                write_reports: true,
            },
            vars: HashMap::from([("username".to_string(), "chef_${timestamp}".to_string())]),
            tags: None,
        };

        let summary = run_tests(&suite_path, &options).await.unwrap();
        assert_eq!((summary.total, summary.passed), (2, 2));
        assert!(summary.success());
        assert!(dir.join("out/smoke/results.json").exists());
        assert!(dir.join("out/smoke/junit.xml").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_tag_filter_skips_untagged_suites() {
        let dir = std::env::temp_dir().join(format!("forkcast-tags-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let suite_path = dir.join("s.yaml");
        std::fs::write(&suite_path, "name: s\ntags: [smoke]\ncases: []\n").unwrap();

        let options = RunOptions {
            tags: Some(vec!["nightly".to_string()]),
            ..Default::default()
        };
        let summary = run_tests(&suite_path, &options).await.unwrap();
        assert_eq!(summary.total, 0);
        std::fs::remove_dir_all(&dir).ok();
    }
}
