use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Final outcome of a test case
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Pass => "✅",
            Outcome::Fail => "❌",
            Outcome::Skip => "⏭️",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

/// Which layer a failure came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connection, timeout or body read error
    Transport,
    /// Non-2xx status
    Protocol,
    /// 2xx with a body that failed an assertion
    Contract,
    /// The request could not be built
    Request,
}

/// Result of one test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub index: usize,
    pub name: String,
    pub outcome: Outcome,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl CaseResult {
    pub fn pass(index: usize, name: &str, detail: String) -> Self {
        Self {
            index,
            name: name.to_string(),
            outcome: Outcome::Pass,
            detail,
            failure_kind: None,
            http_status: None,
            duration_ms: None,
        }
    }

    pub fn fail(index: usize, name: &str, kind: FailureKind, detail: String) -> Self {
        Self {
            index,
            name: name.to_string(),
            outcome: Outcome::Fail,
            detail,
            failure_kind: Some(kind),
            http_status: None,
            duration_ms: None,
        }
    }

    pub fn skip(index: usize, name: &str, reason: String) -> Self {
        Self {
            index,
            name: name.to_string(),
            outcome: Outcome::Skip,
            detail: reason,
            failure_kind: None,
            http_status: None,
            duration_ms: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_duration(mut self, started: Instant) -> Self {
        self.duration_ms = Some(started.elapsed().as_millis() as u64);
        self
    }
}

/// State for one suite run; results are kept in declaration order
#[derive(Debug, Clone)]
pub struct RunState {
    pub session_id: String,
    pub suite_name: String,
    pub base_url: String,
    pub results: Vec<CaseResult>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl RunState {
    pub fn new(session_id: &str, suite_name: &str, base_url: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            suite_name: suite_name.to_string(),
            base_url: base_url.to_string(),
            results: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    pub fn record(&mut self, result: CaseResult) {
        self.results.push(result);
    }

    /// Outcome of an already recorded case
    pub fn outcome_of(&self, name: &str) -> Option<Outcome> {
        self.results
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.outcome)
    }

    pub fn summary(&self) -> RunSummary {
        let total_duration_ms = self.started_at.map(|start| {
            self.finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(start)
                .as_millis() as u64
        });

        RunSummary::from_results(&self.results, total_duration_ms)
    }

    /// Serialize state for reporting
    pub fn to_report(&self) -> crate::report::types::RunReport {
        crate::report::types::RunReport {
            session_id: self.session_id.clone(),
            suite_name: self.suite_name.clone(),
            base_url: self.base_url.clone(),
            results: self.results.clone(),
            summary: self.summary(),
            generated_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total_duration_ms: Option<u64>,
}

impl RunSummary {
    pub fn from_results(results: &[CaseResult], total_duration_ms: Option<u64>) -> Self {
        let (passed, failed, skipped) =
            results
                .iter()
                .fold((0, 0, 0), |(p, f, s), r| match r.outcome {
                    Outcome::Pass => (p + 1, f, s),
                    Outcome::Fail => (p, f + 1, s),
                    Outcome::Skip => (p, f, s + 1),
                });

        Self {
            total: results.len() as u32,
            passed,
            failed,
            skipped,
            total_duration_ms,
        }
    }

    /// A run succeeds when nothing failed and something passed
    pub fn success(&self) -> bool {
        self.failed == 0 && self.passed > 0
    }

    /// Fold several suite summaries into one
    pub fn merge(&mut self, other: &RunSummary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.total_duration_ms = match (self.total_duration_ms, other.total_duration_ms) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}
