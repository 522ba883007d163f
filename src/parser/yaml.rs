use super::types::{Assertion, TestCase, TestSuite};
use super::SuiteError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Parse a YAML suite file into a TestSuite
pub fn parse_suite_file(path: &Path) -> Result<TestSuite> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_suite_content(&content, path)
        .with_context(|| format!("Invalid suite: {}", path.display()))
}

/// Parse YAML content into a TestSuite and validate it
pub fn parse_suite_content(content: &str, source_path: &Path) -> Result<TestSuite> {
    let mut suite = match split_header(content) {
        // 1. "header --- cases" format
        Some((header, cases_yaml)) => {
            let mut suite: TestSuite = if header.trim().is_empty() {
                empty_suite()
            } else {
                serde_yaml::from_str(header).context("Failed to parse suite header")?
            };
            suite.cases =
                serde_yaml::from_str(cases_yaml).context("Failed to parse test cases")?;
            suite
        }
        None => {
            let value: serde_yaml::Value =
                serde_yaml::from_str(content).context("Failed to parse YAML content")?;
            match value {
                // 2. Bare list of cases
                serde_yaml::Value::Sequence(_) => {
                    let mut suite = empty_suite();
                    suite.cases =
                        serde_yaml::from_value(value).context("Failed to parse test cases")?;
                    suite
                }
                // 3. Full suite map with a `cases` field
                serde_yaml::Value::Mapping(_) => {
                    serde_yaml::from_value(value).context("Failed to parse suite")?
                }
                _ => anyhow::bail!("Suite must be a mapping or a list of cases"),
            }
        }
    };

    if suite.name.is_none() {
        suite.name = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());
    }

    validate_suite(&suite)?;
    Ok(suite)
}

fn empty_suite() -> TestSuite {
    TestSuite {
        name: None,
        base_url: None,
        timeout_ms: None,
        env: None,
        tags: Vec::new(),
        cases: Vec::new(),
    }
}

/// Split on a standalone `---` line. A document marker preceded only by
/// blank or comment lines is not a separator.
fn split_header(content: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end() == "---" && has_yaml_content(&content[..offset]) {
            return Some((&content[..offset], &content[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn has_yaml_content(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#') && line != "---"
    })
}

/// Check names and dependency ordering
pub fn validate_suite(suite: &TestSuite) -> Result<(), SuiteError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for (index, case) in suite.cases.iter().enumerate() {
        if case.name.trim().is_empty() {
            return Err(SuiteError::EmptyName { index });
        }
        if seen.contains(case.name.as_str()) {
            return Err(SuiteError::DuplicateName(case.name.clone()));
        }
        for dependency in &case.depends_on {
            if !seen.contains(dependency.as_str()) {
                return Err(SuiteError::UnknownDependency {
                    case: case.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        validate_case(case)?;
        seen.insert(case.name.as_str());
    }

    Ok(())
}

fn validate_case(case: &TestCase) -> Result<(), SuiteError> {
    if reqwest::Method::from_bytes(case.method.to_uppercase().as_bytes()).is_err() {
        return Err(SuiteError::InvalidMethod {
            case: case.name.clone(),
            method: case.method.clone(),
        });
    }
    if case.body.is_some() && case.upload.is_some() {
        return Err(SuiteError::BodyAndUpload(case.name.clone()));
    }
    if let Some(upload) = &case.upload {
        if upload.path.is_some() && upload.base64.is_some() {
            return Err(SuiteError::AmbiguousUpload(case.name.clone()));
        }
    }
    Ok(())
}

/// serde hook for `expect:` lists
pub fn deserialize_assertions<'de, D>(deserializer: D) -> Result<Vec<Assertion>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<serde_yaml::Value> = Vec::deserialize(deserializer)?;
    values
        .iter()
        .map(|v| parse_assertion_value(v).map_err(|e| serde::de::Error::custom(format!("{:#}", e))))
        .collect()
}

/// Parse a single assertion like `- required: [id, title]`
pub fn parse_assertion_value(value: &serde_yaml::Value) -> Result<Assertion> {
    let map = value
        .as_mapping()
        .ok_or_else(|| anyhow::anyhow!("Invalid assertion format: {:?}", value))?;
    if map.len() != 1 {
        anyhow::bail!("Invalid assertion format: expected single key mapping");
    }

    let Some((key, params)) = map.iter().next() else {
        anyhow::bail!("Invalid assertion format: empty mapping");
    };
    let name = key
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Assertion name must be a string"))?;

    let assertion = match name {
        "required" => Assertion::Required(string_list(params)?),
        "requiredAny" | "anyOf" => Assertion::RequiredAny(string_list(params)?),
        "forbidden" | "absent" => Assertion::Forbidden(string_list(params)?),
        "isType" | "type" => Assertion::IsType(serde_yaml::from_value(params.clone())?),
        "startsWith" => Assertion::StartsWith(serde_yaml::from_value(params.clone())?),
        "contains" => Assertion::Contains(serde_yaml::from_value(params.clone())?),
        "nonEmpty" => {
            let path = match params {
                serde_yaml::Value::Null => String::new(),
                serde_yaml::Value::String(s) => s.clone(),
                _ => anyhow::bail!("nonEmpty expects a path"),
            };
            Assertion::NonEmpty(path)
        }
        "minItems" => Assertion::MinItems(serde_yaml::from_value(params.clone())?),
        "equals" => Assertion::Equals(serde_yaml::from_value(params.clone())?),
        "allMatch" => Assertion::AllMatch(serde_yaml::from_value(params.clone())?),
        other => anyhow::bail!("Unknown assertion: {}", other),
    };

    Ok(assertion)
}

/// Accept either `key: a` or `key: [a, b]`
fn string_list(value: &serde_yaml::Value) -> Result<Vec<String>> {
    match value {
        serde_yaml::Value::String(s) => Ok(vec![s.clone()]),
        serde_yaml::Value::Sequence(_) => {
            serde_yaml::from_value(value.clone()).context("Expected a list of paths")
        }
        _ => anyhow::bail!("Expected a path or a list of paths"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::JsonKind;

    #[test]
    fn test_parse_header_and_cases() {
        let yaml = r#"
name: smoke
baseUrl: http://localhost:3000/api
env:
  password: delicious123
---
- name: register
  method: POST
  path: /auth/register
  body:
    username: chef_${timestamp}
    password: ${password}
  captureToken: token
  save:
    user_id: user.id
  expect:
    - required: [token, user.id, user.username, user.createdAt]
- name: me
  path: /users/me
  expect:
    - forbidden: password
    - isType: { path: username, kind: string }
"#;

        let suite = parse_suite_content(yaml, Path::new("smoke.yaml")).unwrap();
        assert_eq!(suite.name.as_deref(), Some("smoke"));
        assert_eq!(suite.base_url.as_deref(), Some("http://localhost:3000/api"));
        assert_eq!(suite.cases.len(), 2);
        assert_eq!(suite.auth_case_index(), Some(0));
        assert_eq!(suite.cases[1].method, "GET");
        assert_eq!(
            suite.cases[1].expect,
            vec![
                Assertion::Forbidden(vec!["password".to_string()]),
                Assertion::IsType(crate::parser::types::IsTypeParams {
                    path: "username".to_string(),
                    kind: JsonKind::String,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_full_map_uses_file_stem_as_name() {
        let yaml = r#"
cases:
  - name: list
    path: /meals
    expect:
      - isType: { kind: array }
"#;
        let suite = parse_suite_content(yaml, Path::new("suites/meals.yaml")).unwrap();
        assert_eq!(suite.name.as_deref(), Some("meals"));
        assert_eq!(suite.cases.len(), 1);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let yaml = r#"
- name: a
  path: /x
- name: a
  path: /y
"#;
        let err = parse_suite_content(yaml, Path::new("t.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("duplicate case name 'a'"));
    }

    #[test]
    fn test_rejects_forward_dependency() {
        let yaml = r#"
- name: update
  path: /meals/1
  dependsOn: [create]
- name: create
  path: /meals
"#;
        let err = parse_suite_content(yaml, Path::new("t.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("depends on 'create'"));
    }

    #[test]
    fn test_rejects_unknown_assertion() {
        let yaml = r#"
- name: a
  path: /x
  expect:
    - looksGood: true
"#;
        let err = parse_suite_content(yaml, Path::new("t.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown assertion: looksGood"));
    }

    #[test]
    fn test_rejects_invalid_method() {
        let yaml = r#"
- name: a
  method: "NOT A METHOD"
  path: /x
"#;
        assert!(parse_suite_content(yaml, Path::new("t.yaml")).is_err());
    }

    #[test]
    fn test_leading_comment_before_full_map() {
        let yaml = "# Forkcast smoke suite\n---\nname: s\ncases:\n  - name: a\n    path: /x\n";
        let suite = parse_suite_content(yaml, Path::new("t.yaml")).unwrap();
        assert_eq!(suite.name.as_deref(), Some("s"));
        assert_eq!(suite.cases.len(), 1);
    }

    #[test]
    fn test_leading_comment_before_header_and_cases() {
        let yaml = r#"# Forkcast smoke suite
---
name: s
baseUrl: http://localhost:3000/api
---
- name: a
  path: /x
- name: b
  path: /y
"#;
        let suite = parse_suite_content(yaml, Path::new("t.yaml")).unwrap();
        assert_eq!(suite.name.as_deref(), Some("s"));
        assert_eq!(suite.base_url.as_deref(), Some("http://localhost:3000/api"));
        assert_eq!(suite.cases.len(), 2);
    }

    #[test]
    fn test_rejects_body_with_upload() {
        let yaml = r#"
- name: upload
  method: POST
  path: /upload
  body: { title: x }
  upload: { fileName: a.png }
"#;
        let err = parse_suite_content(yaml, Path::new("t.yaml")).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("upload"), "{}", message);
        assert!(matches!(
            err.downcast_ref::<SuiteError>(),
            Some(SuiteError::BodyAndUpload(name)) if name == "upload"
        ));
    }

    #[test]
    fn test_rejects_upload_with_path_and_base64() {
        let yaml = r#"
- name: upload
  method: POST
  path: /upload
  upload: { path: a.png, base64: iVBORw0KGgo= }
"#;
        let err = parse_suite_content(yaml, Path::new("t.yaml")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SuiteError>(),
            Some(SuiteError::AmbiguousUpload(name)) if name == "upload"
        ));
    }

    #[test]
    fn test_auth_case_is_first_token_capture() {
        let yaml = r#"
- name: health
  path: /health
- name: register
  method: POST
  path: /auth/register
  captureToken: token
- name: login
  method: POST
  path: /auth/login
  captureToken: token
"#;
        let suite = parse_suite_content(yaml, Path::new("t.yaml")).unwrap();
        assert_eq!(suite.auth_case_index(), Some(1));
        assert_eq!(crate::parser::types::auth_case_index(&suite.cases[2..]), Some(0));
        assert_eq!(crate::parser::types::auth_case_index(&suite.cases[..1]), None);
    }

    #[test]
    fn test_bundled_suites_parse() {
        for (name, content) in [
            ("backend.yaml", include_str!("../../suites/backend.yaml")),
            (
                "check_database.yaml",
                include_str!("../../suites/check_database.yaml"),
            ),
            (
                "meal_update_debug.yaml",
                include_str!("../../suites/meal_update_debug.yaml"),
            ),
        ] {
            let suite = parse_suite_content(content, Path::new(name))
                .unwrap_or_else(|e| panic!("{}: {:#}", name, e));
            assert!(!suite.cases.is_empty(), "{} has no cases", name);
            assert_eq!(suite.auth_case_index(), Some(0), "{}", name);
            for case in &suite.cases[1..] {
                assert!(!case.expect.is_empty(), "{}: '{}' asserts nothing", name, case.name);
            }
        }
    }
}
