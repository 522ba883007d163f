use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a parsed test suite from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    #[serde(default)]
    pub name: Option<String>,

    /// API base URL, e.g. "http://localhost:3000/api"
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default, alias = "timeout")]
    pub timeout_ms: Option<u64>,

    /// Default variables, overridable from the command line
    #[serde(default)]
    pub env: Option<HashMap<String, String>>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn auth_case_index(&self) -> Option<usize> {
        auth_case_index(&self.cases)
    }
}

/// Index of the authentication case: the first case that captures a token
pub fn auth_case_index(cases: &[TestCase]) -> Option<usize> {
    cases.iter().position(|c| c.capture_token.is_some())
}

/// One declarative HTTP interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// GET, POST, PUT, PATCH, DELETE
    #[serde(default = "default_method")]
    pub method: String,

    /// Path relative to the base URL (or an absolute URL), may contain ${vars}
    pub path: String,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// JSON body; string leaves are substituted
    #[serde(default)]
    pub body: Option<serde_yaml::Value>,

    #[serde(default)]
    pub upload: Option<UploadParams>,

    /// Names of earlier cases that must have passed
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(
        default,
        deserialize_with = "crate::parser::yaml::deserialize_assertions"
    )]
    pub expect: Vec<Assertion>,

    /// variable name -> JSON path in the response
    #[serde(default)]
    pub save: HashMap<String, String>,

    /// JSON path of a bearer token in the response
    #[serde(default)]
    pub capture_token: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Multipart file upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    #[serde(default = "default_upload_field")]
    pub field: String,

    #[serde(default = "default_upload_name")]
    pub file_name: String,

    #[serde(default = "default_upload_type")]
    pub content_type: String,

    /// File on disk, relative to the suite file
    #[serde(default)]
    pub path: Option<String>,

    /// Inline payload
    #[serde(default)]
    pub base64: Option<String>,
}

fn default_upload_field() -> String {
    "file".to_string()
}

fn default_upload_name() -> String {
    "test.png".to_string()
}

fn default_upload_type() -> String {
    "image/png".to_string()
}

/// JSON kinds understood by `isType`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonKind {
    Array,
    String,
    Object,
    Number,
    Boolean,
    Null,
}

impl JsonKind {
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(_) => JsonKind::Array,
            serde_json::Value::String(_) => JsonKind::String,
            serde_json::Value::Object(_) => JsonKind::Object,
            serde_json::Value::Number(_) => JsonKind::Number,
            serde_json::Value::Bool(_) => JsonKind::Boolean,
            serde_json::Value::Null => JsonKind::Null,
        }
    }
}

impl std::fmt::Display for JsonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JsonKind::Array => "array",
            JsonKind::String => "string",
            JsonKind::Object => "object",
            JsonKind::Number => "number",
            JsonKind::Boolean => "boolean",
            JsonKind::Null => "null",
        };
        write!(f, "{}", s)
    }
}

/// A shape assertion on a response body.
///
/// Paths are dot separated (`user.id`, `0.title`); an empty path or `$`
/// addresses the whole body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Assertion {
    /// All paths must exist
    Required(Vec<String>),

    /// At least one path must exist
    RequiredAny(Vec<String>),

    /// No path may exist
    Forbidden(Vec<String>),

    IsType(IsTypeParams),

    StartsWith(StartsWithParams),

    Contains(ContainsParams),

    /// Non-empty string, array or object
    NonEmpty(String),

    MinItems(MinItemsParams),

    Equals(EqualsParams),

    /// Every array item's field equals a value
    AllMatch(AllMatchParams),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IsTypeParams {
    #[serde(default)]
    pub path: String,
    pub kind: JsonKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartsWithParams {
    pub path: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainsParams {
    pub path: String,
    pub substring: String,
    #[serde(default)]
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MinItemsParams {
    #[serde(default)]
    pub path: String,
    pub min: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EqualsParams {
    pub path: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllMatchParams {
    #[serde(default)]
    pub path: String,
    pub field: String,
    pub value: serde_json::Value,
    #[serde(default = "default_all_match_label")]
    pub label: String,
}

fn default_all_match_label() -> String {
    "match".to_string()
}
