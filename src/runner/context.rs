use crate::parser::types::TestSuite;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z0-9_.\-]+)\}").expect("variable pattern is a valid regex")
});

/// Mutable state threaded through one suite run
pub struct SessionContext {
    /// API base URL, e.g. "http://localhost:3000/api"
    pub base_url: String,

    /// Bearer token, set once an authentication case passes
    pub token: Option<String>,

    /// Directory of the suite file (for resolving upload paths)
    pub base_dir: PathBuf,

    /// Suite-level default variables
    pub env: HashMap<String, String>,

    /// Captured and caller-supplied variables
    pub vars: HashMap<String, String>,
}

impl SessionContext {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            base_dir: PathBuf::from("."),
            env: HashMap::new(),
            vars: HashMap::new(),
        }
    }

    /// Update context from a suite's header.
    ///
    /// Values are substituted once here, so `${timestamp}` stays stable for the run.
    pub fn update_from_suite(&mut self, suite: &TestSuite) {
        if let Some(ref env) = suite.env {
            for (k, v) in env {
                let value = self.substitute_vars(v);
                self.env.insert(k.clone(), value);
            }
        }
    }

    /// Resolve a relative path against the suite directory
    pub fn resolve_file(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Join a substituted path template onto the base URL
    pub fn resolve_url(&self, path: &str) -> String {
        let path = self.substitute_vars(path);
        if path.starts_with("http://") || path.starts_with("https://") {
            return path;
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Get a variable from vars, env, then the process environment
    pub fn get_var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| self.env.get(name).cloned())
            .or_else(|| std::env::var(name).ok())
    }

    /// Set a variable
    pub fn set_var(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    /// Substitute ${varname} or ${varname.json.path} patterns in a string
    pub fn substitute_vars(&self, text: &str) -> String {
        VAR_PATTERN
            .replace_all(text, |caps: &regex::Captures| {
                let full_key = &caps[1];

                if let Some(val) = self.get_var(full_key) {
                    return val;
                }

                match full_key {
                    "time" => return chrono::Local::now().format("%H:%M:%S").to_string(),
                    "date" => return chrono::Local::now().format("%Y-%m-%d").to_string(),
                    "timestamp" => return chrono::Utc::now().timestamp().to_string(),
                    "uuid" => return uuid::Uuid::new_v4().to_string(),
                    _ => {}
                }

                // Variable holding JSON, addressed by the rest of the key
                if let Some((var_name, json_path)) = full_key.split_once('.') {
                    if let Some(json_str) = self.get_var(var_name) {
                        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&json_str) {
                            if let Some(target) = crate::validator::lookup(&value, json_path) {
                                return json_to_text(target);
                            }
                        }
                    }
                }

                // Keep original if not found
                format!("${{{}}}", full_key)
            })
            .to_string()
    }

    /// Substitute every string leaf of a JSON value.
    ///
    /// A string that is exactly one `${var}` reference holding a JSON number
    /// or boolean keeps the captured type.
    pub fn substitute_json(&self, value: &serde_json::Value) -> serde_json::Value {
        use serde_json::Value;
        match value {
            Value::String(s) => {
                let replaced = self.substitute_vars(s);
                let whole_ref = VAR_PATTERN
                    .find(s)
                    .map(|m| m.start() == 0 && m.end() == s.len())
                    .unwrap_or(false);
                if whole_ref && replaced != *s {
                    if let Ok(typed @ (Value::Number(_) | Value::Bool(_))) =
                        serde_json::from_str::<Value>(&replaced)
                    {
                        return typed;
                    }
                }
                Value::String(replaced)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.substitute_json(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.substitute_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Store a value from `json` at `path` under `var_name`. Returns false if absent.
    pub fn capture(&mut self, var_name: &str, json: &serde_json::Value, path: &str) -> bool {
        match crate::validator::lookup(json, path) {
            Some(value) => {
                let text = json_to_text(value);
                log::debug!("captured {} = {}", var_name, text);
                self.set_var(var_name, &text);
                true
            }
            None => false,
        }
    }

    /// Merge caller-supplied variables (e.g. `--var key=value`)
    pub fn merge_vars(&mut self, vars: &HashMap<String, String>) {
        for (k, v) in vars {
            let substituted = self.substitute_vars(v);
            self.vars.insert(k.clone(), substituted);
        }
    }
}

/// Strings unquoted, everything else as JSON text
pub fn json_to_text(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_url_joins_with_single_slash() {
        let ctx = SessionContext::new("http://localhost:3000/api/");
        assert_eq!(ctx.resolve_url("/meals"), "http://localhost:3000/api/meals");
        assert_eq!(ctx.resolve_url("meals"), "http://localhost:3000/api/meals");
        assert_eq!(
            ctx.resolve_url("https://other.example/x"),
            "https://other.example/x"
        );
    }

    #[test]
    fn test_substitute_captured_and_env_vars() {
        let mut ctx = SessionContext::new("http://h");
        ctx.env.insert("password".into(), "secret".into());
        ctx.set_var("meal_id", "m-1");
        assert_eq!(ctx.substitute_vars("/meals/${meal_id}"), "/meals/m-1");
        assert_eq!(ctx.substitute_vars("${password}"), "secret");
        assert_eq!(ctx.substitute_vars("${nope_not_set}"), "${nope_not_set}");
    }

    #[test]
    fn test_vars_shadow_env() {
        let mut ctx = SessionContext::new("http://h");
        ctx.env.insert("user".into(), "from-env".into());
        ctx.set_var("user", "from-var");
        assert_eq!(ctx.get_var("user").as_deref(), Some("from-var"));
    }

    #[test]
    fn test_substitute_json_sub_path() {
        let mut ctx = SessionContext::new("http://h");
        ctx.set_var("user", r#"{"id": "u1", "profile": {"name": "Ann"}}"#);
        assert_eq!(ctx.substitute_vars("${user.profile.name}"), "Ann");
    }

    #[test]
    fn test_dynamic_timestamp() {
        let ctx = SessionContext::new("http://h");
        let name = ctx.substitute_vars("chef_${timestamp}");
        assert!(name.starts_with("chef_"));
        assert!(name["chef_".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_substitute_json_body() {
        let mut ctx = SessionContext::new("http://h");
        ctx.set_var("meal_id", "m-9");
        ctx.set_var("servings", "4");
        let body = json!({
            "mealId": "${meal_id}",
            "servings": "${servings}",
            "note": "for ${meal_id}",
            "tags": ["${meal_id}", 3, true]
        });
        assert_eq!(
            ctx.substitute_json(&body),
            json!({
                "mealId": "m-9",
                "servings": 4,
                "note": "for m-9",
                "tags": ["m-9", 3, true]
            })
        );
    }

    #[test]
    fn test_suite_env_resolved_once() {
        let suite = crate::parser::parse_suite_content(
            "name: s\nenv:\n  username: chef_${timestamp}\ncases: []\n",
            Path::new("s.yaml"),
        )
        .unwrap();
        let mut ctx = SessionContext::new("http://h");
        ctx.update_from_suite(&suite);
        let username = ctx.get_var("username").unwrap();
        assert!(!username.contains("${"));
        assert_eq!(ctx.substitute_vars("${username}"), username);
    }

    #[test]
    fn test_capture() {
        let mut ctx = SessionContext::new("http://h");
        let body = json!({"token": "t", "user": {"id": 7}});
        assert!(ctx.capture("user_id", &body, "user.id"));
        assert_eq!(ctx.get_var("user_id").as_deref(), Some("7"));
        assert!(!ctx.capture("missing", &body, "user.email"));
    }
}
