//! Response shape validation.
//!
//! `validate` is a pure function of the body and the assertions: it never
//! panics and never errors, a missing field is reported as a failed verdict.

use crate::parser::types::{Assertion, JsonKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of validating one response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub reason: String,
}

impl Verdict {
    fn pass(reason: String) -> Self {
        Self {
            passed: true,
            reason,
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            passed: false,
            reason,
        }
    }
}

/// Check `body` against every assertion; the first failure decides the reason
pub fn validate(body: &Value, assertions: &[Assertion]) -> Verdict {
    for assertion in assertions {
        if let Some(reason) = check(body, assertion) {
            return Verdict::fail(reason);
        }
    }

    let checks = match assertions.len() {
        1 => "1 check passed".to_string(),
        n => format!("{} checks passed", n),
    };
    match body {
        Value::Array(items) => Verdict::pass(format!("{} ({} items)", checks, items.len())),
        _ => Verdict::pass(checks),
    }
}

/// Resolve a dot path (`user.id`, `0.title`) or JSON pointer inside `value`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() || path == "$" || path == "." {
        return Some(value);
    }
    let pointer = if path.starts_with('/') {
        path.to_string()
    } else {
        path.trim_start_matches("$.")
            .split('.')
            .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
            .collect()
    };
    value.pointer(&pointer)
}

fn label(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() || path == "$" || path == "." {
        "response".to_string()
    } else {
        format!("'{}'", path)
    }
}

/// Compact rendering for failure messages
fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 120 {
        let cut: String = text.chars().take(117).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

/// JSON equality, treating a string operand as matching a scalar with the same text
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Number(_) | Value::Bool(_), Value::String(s)) => actual.to_string() == *s,
        (Value::String(s), Value::Number(_) | Value::Bool(_)) => expected.to_string() == *s,
        _ => false,
    }
}

fn expect_str<'a>(body: &'a Value, path: &str) -> Result<&'a str, String> {
    match lookup(body, path) {
        None => Err(format!("Missing field {} in response", label(path))),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!(
            "Expected {} to be string, got {}",
            label(path),
            JsonKind::of(other)
        )),
    }
}

/// Returns the failure reason, if any
fn check(body: &Value, assertion: &Assertion) -> Option<String> {
    match assertion {
        Assertion::Required(paths) => {
            let missing: Vec<&str> = paths
                .iter()
                .filter(|p| lookup(body, p).is_none())
                .map(|p| p.as_str())
                .collect();
            if missing.is_empty() {
                None
            } else {
                Some(format!(
                    "Missing fields in response: [{}]",
                    missing.join(", ")
                ))
            }
        }

        Assertion::RequiredAny(paths) => {
            if paths.iter().any(|p| lookup(body, p).is_some()) {
                None
            } else {
                Some(format!(
                    "None of [{}] present in response",
                    paths.join(", ")
                ))
            }
        }

        Assertion::Forbidden(paths) => {
            let present: Vec<&str> = paths
                .iter()
                .filter(|p| lookup(body, p).is_some())
                .map(|p| p.as_str())
                .collect();
            if present.is_empty() {
                None
            } else {
                Some(format!(
                    "Forbidden fields present in response: [{}]",
                    present.join(", ")
                ))
            }
        }

        Assertion::IsType(p) => match lookup(body, &p.path) {
            None => Some(format!("Missing field {} in response", label(&p.path))),
            Some(v) if JsonKind::of(v) == p.kind => None,
            Some(v) => Some(format!(
                "Expected {} to be {}, got {}",
                label(&p.path),
                p.kind,
                JsonKind::of(v)
            )),
        },

        Assertion::StartsWith(p) => match expect_str(body, &p.path) {
            Err(reason) => Some(reason),
            Ok(s) if s.starts_with(&p.prefix) => None,
            Ok(s) => Some(format!(
                "Expected {} to start with '{}', got '{}'",
                label(&p.path),
                p.prefix,
                s
            )),
        },

        Assertion::Contains(p) => match expect_str(body, &p.path) {
            Err(reason) => Some(reason),
            Ok(s) => {
                let found = if p.ignore_case {
                    s.to_lowercase().contains(&p.substring.to_lowercase())
                } else {
                    s.contains(&p.substring)
                };
                if found {
                    None
                } else {
                    Some(format!(
                        "Expected {} to contain '{}', got '{}'",
                        label(&p.path),
                        p.substring,
                        s
                    ))
                }
            }
        },

        Assertion::NonEmpty(path) => match lookup(body, path) {
            None => Some(format!("Missing field {} in response", label(path))),
            Some(Value::String(s)) if !s.is_empty() => None,
            Some(Value::Array(a)) if !a.is_empty() => None,
            Some(Value::Object(o)) if !o.is_empty() => None,
            Some(v) => Some(format!(
                "Expected {} to be non-empty, got {}",
                label(path),
                preview(v)
            )),
        },

        Assertion::MinItems(p) => match lookup(body, &p.path) {
            None => Some(format!("Missing field {} in response", label(&p.path))),
            Some(Value::Array(items)) if items.len() >= p.min => None,
            Some(Value::Array(items)) => Some(format!(
                "Expected at least {} items in {}, got {}",
                p.min,
                label(&p.path),
                items.len()
            )),
            Some(v) => Some(format!(
                "Expected {} to be array, got {}",
                label(&p.path),
                JsonKind::of(v)
            )),
        },

        Assertion::Equals(p) => match lookup(body, &p.path) {
            None => Some(format!("Missing field {} in response", label(&p.path))),
            Some(v) if values_equal(v, &p.value) => None,
            Some(v) => Some(format!(
                "Expected {} to equal {}, got {}",
                label(&p.path),
                preview(&p.value),
                preview(v)
            )),
        },

        Assertion::AllMatch(p) => match lookup(body, &p.path) {
            None => Some(format!("Missing field {} in response", label(&p.path))),
            Some(Value::Array(items)) => {
                let matching = items
                    .iter()
                    .filter(|item| {
                        lookup(item, &p.field)
                            .map(|v| values_equal(v, &p.value))
                            .unwrap_or(false)
                    })
                    .count();
                if matching == items.len() {
                    None
                } else {
                    Some(format!("{}/{} {}", matching, items.len(), p.label))
                }
            }
            Some(v) => Some(format!(
                "Expected {} to be array, got {}",
                label(&p.path),
                JsonKind::of(v)
            )),
        },
    }
}
