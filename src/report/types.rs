use crate::runner::state::{CaseResult, RunSummary};
use serde::{Deserialize, Serialize};

/// Results of one suite run, as written to `results.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub session_id: String,
    pub suite_name: String,
    pub base_url: String,
    pub results: Vec<CaseResult>,
    pub summary: RunSummary,
    pub generated_at: String,
}
