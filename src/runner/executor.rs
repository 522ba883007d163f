use base64::Engine as _;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use super::context::{json_to_text, SessionContext};
use super::events::{EventEmitter, RunEvent};
use super::state::{CaseResult, FailureKind, Outcome, RunState};
use crate::parser::types::{auth_case_index, Assertion, TestCase, UploadParams};
use crate::validator::{lookup, validate};

/// 1x1 PNG used for uploads that name neither a file nor inline data
pub const SAMPLE_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00\x90wS\xde\x00\x00\x00\tpHYs\x00\x00\x0b\x13\x00\x00\x0b\x13\x01\x00\x9a\x9c\x18\x00\x00\x00\x0cIDATx\x9cc```\x00\x00\x00\x04\x00\x01\xdd\x8d\xb4\x1c\x00\x00\x00\x00IEND\xaeB`\x82";

/// Why a case failed
#[derive(Debug, Error)]
pub enum StepError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Protocol { status: u16, message: String },

    #[error("{reason}")]
    Contract { status: u16, reason: String },

    #[error("invalid request: {0}")]
    Request(String),
}

impl StepError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StepError::Transport(_) => FailureKind::Transport,
            StepError::Protocol { .. } => FailureKind::Protocol,
            StepError::Contract { .. } => FailureKind::Contract,
            StepError::Request(_) => FailureKind::Request,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            StepError::Protocol { status, .. } | StepError::Contract { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// A case that got a 2xx response and satisfied its assertions
#[derive(Debug)]
struct Passed {
    status: u16,
    detail: String,
}

/// Executes test cases sequentially against one HTTP endpoint
pub struct SuiteRunner {
    client: reqwest::Client,
    emitter: EventEmitter,
}

impl SuiteRunner {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            emitter: EventEmitter::default(),
        }
    }

    /// Runner with its own client and an explicit request timeout
    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client))
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.emitter.subscribe()
    }

    /// Run every case in order; exactly one result is recorded per case
    pub async fn run(
        &self,
        suite_name: &str,
        cases: &[TestCase],
        session: &mut SessionContext,
    ) -> RunState {
        let mut state = RunState::new(&Uuid::new_v4().to_string(), suite_name, &session.base_url);
        let auth_index = auth_case_index(cases);

        self.emitter.emit(RunEvent::RunStarted {
            session_id: state.session_id.clone(),
            suite_name: suite_name.to_string(),
            base_url: session.base_url.clone(),
            case_count: cases.len(),
        });
        state.start();

        for (index, case) in cases.iter().enumerate() {
            if let Some(reason) = unmet_dependency(cases, index, auth_index, &state) {
                log::info!("skipping '{}': {}", case.name, reason);
                self.emitter.emit(RunEvent::CaseSkipped {
                    index,
                    name: case.name.clone(),
                    reason: reason.clone(),
                });
                state.record(CaseResult::skip(index, &case.name, reason));
                continue;
            }

            self.emitter.emit(RunEvent::CaseStarted {
                index,
                name: case.name.clone(),
                request: format!("{} {}", case.method.to_uppercase(), case.path),
            });

            let started = Instant::now();
            let result = match self.execute_case(case, session).await {
                Ok(passed) => CaseResult::pass(index, &case.name, passed.detail)
                    .with_status(Some(passed.status)),
                Err(e) => {
                    log::warn!("case '{}' failed: {}", case.name, e);
                    CaseResult::fail(index, &case.name, e.kind(), e.to_string())
                        .with_status(e.status())
                }
            }
            .with_duration(started);

            let duration_ms = result.duration_ms.unwrap_or(0);
            match result.outcome {
                Outcome::Pass => self.emitter.emit(RunEvent::CasePassed {
                    index,
                    detail: result.detail.clone(),
                    duration_ms,
                }),
                _ => self.emitter.emit(RunEvent::CaseFailed {
                    index,
                    error: result.detail.clone(),
                    duration_ms,
                }),
            }
            state.record(result);
        }

        state.finish();
        self.emitter.emit(RunEvent::RunFinished {
            suite_name: suite_name.to_string(),
            summary: state.summary(),
        });

        state
    }

    async fn execute_case(
        &self,
        case: &TestCase,
        session: &mut SessionContext,
    ) -> Result<Passed, StepError> {
        let method = reqwest::Method::from_bytes(case.method.to_uppercase().as_bytes())
            .map_err(|_| StepError::Request(format!("invalid HTTP method '{}'", case.method)))?;
        let url = session.resolve_url(&case.path);
        log::debug!("{} {}", method, url);

        let mut req = self.client.request(method, &url);

        if let Some(token) = &session.token {
            req = req.bearer_auth(token);
        }

        if let Some(headers) = &case.headers {
            for (k, v) in headers {
                req = req.header(k.as_str(), session.substitute_vars(v));
            }
        }

        if let Some(body) = &case.body {
            let json = serde_json::to_value(body)
                .map_err(|e| StepError::Request(format!("body is not valid JSON: {}", e)))?;
            let json = session.substitute_json(&json);
            log::debug!("request body: {}", json);
            req = req.json(&json);
        }

        if let Some(upload) = &case.upload {
            req = req.multipart(build_form(upload, session)?);
        }

        let response = req.send().await.map_err(describe_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(describe_transport)?;
        log::debug!("HTTP {} {}", status.as_u16(), text);

        if !status.is_success() {
            return Err(StepError::Protocol {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        let status = status.as_u16();

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| StepError::Contract {
                status,
                reason: format!("Response is not valid JSON: {}", e),
            })?
        };

        let assertions: Vec<Assertion> = case
            .expect
            .iter()
            .map(|a| resolve_assertion(a, session))
            .collect();
        let verdict = validate(&body, &assertions);
        if !verdict.passed {
            return Err(StepError::Contract {
                status,
                reason: verdict.reason,
            });
        }

        // Captures are all-or-nothing
        let mut missing: Vec<&str> = case
            .save
            .values()
            .filter(|path| lookup(&body, path).is_none())
            .map(|p| p.as_str())
            .collect();
        let token = match &case.capture_token {
            Some(path) => match lookup(&body, path) {
                Some(value) => Some(json_to_text(value)),
                None => {
                    missing.push(path.as_str());
                    None
                }
            },
            None => None,
        };
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(StepError::Contract {
                status,
                reason: format!("Capture paths not found in response: [{}]", missing.join(", ")),
            });
        }

        for (var_name, path) in &case.save {
            session.capture(var_name, &body, path);
            self.emitter.emit(RunEvent::Log {
                message: format!("saved {} from '{}'", var_name, path),
            });
        }
        if let Some(token) = token {
            log::debug!("bearer token captured by '{}'", case.name);
            session.token = Some(token);
            self.emitter.emit(RunEvent::Log {
                message: "bearer token captured".to_string(),
            });
        }

        Ok(Passed {
            status,
            detail: format!("HTTP {}: {}", status, verdict.reason),
        })
    }
}

/// The reason a case must be skipped, if any
fn unmet_dependency(
    cases: &[TestCase],
    index: usize,
    auth_index: Option<usize>,
    state: &RunState,
) -> Option<String> {
    if let Some(auth) = auth_index {
        if index > auth {
            let auth_name = &cases[auth].name;
            if state.outcome_of(auth_name) != Some(Outcome::Pass) {
                return Some(format!("authentication step '{}' did not pass", auth_name));
            }
        }
    }

    for dependency in &cases[index].depends_on {
        match state.outcome_of(dependency) {
            Some(Outcome::Pass) => {}
            Some(outcome) => {
                return Some(format!(
                    "prerequisite '{}' did not pass ({})",
                    dependency, outcome
                ))
            }
            None => return Some(format!("prerequisite '{}' has not run", dependency)),
        }
    }

    None
}

/// Substitute session variables into assertion operands
fn resolve_assertion(assertion: &Assertion, session: &SessionContext) -> Assertion {
    let mut resolved = assertion.clone();
    match &mut resolved {
        Assertion::StartsWith(p) => p.prefix = session.substitute_vars(&p.prefix),
        Assertion::Contains(p) => p.substring = session.substitute_vars(&p.substring),
        Assertion::Equals(p) => p.value = session.substitute_json(&p.value),
        Assertion::AllMatch(p) => p.value = session.substitute_json(&p.value),
        _ => {}
    }
    resolved
}

fn build_form(
    upload: &UploadParams,
    session: &SessionContext,
) -> Result<reqwest::multipart::Form, StepError> {
    let bytes = if let Some(path) = &upload.path {
        let file = session.resolve_file(&session.substitute_vars(path));
        std::fs::read(&file).map_err(|e| {
            StepError::Request(format!("cannot read upload file {}: {}", file.display(), e))
        })?
    } else if let Some(data) = &upload.base64 {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| StepError::Request(format!("invalid base64 upload: {}", e)))?
    } else {
        SAMPLE_PNG.to_vec()
    };

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(upload.file_name.clone())
        .mime_str(&upload.content_type)
        .map_err(|e| StepError::Request(format!("invalid content type: {}", e)))?;

    Ok(reqwest::multipart::Form::new().part(upload.field.clone(), part))
}

fn describe_transport(e: reqwest::Error) -> StepError {
    let message = if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    };
    StepError::Transport(message)
}

/// Server-provided error text: `error`, then `message`, then the raw body
pub fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            match map.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let raw = body.trim();
    if raw.is_empty() {
        "<empty body>".to_string()
    } else {
        raw.to_string()
    }
}
