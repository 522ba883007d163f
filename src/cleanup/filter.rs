use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decides what counts as test data
pub trait TestDataFilter: Send + Sync {
    /// Username looks like a test account and is not protected
    fn is_test_user(&self, username: &str) -> bool;

    /// Meal title looks like test content
    fn is_test_meal(&self, title: &str) -> bool;

    /// Username must never be cleaned up
    fn is_protected(&self, _username: &str) -> bool {
        false
    }
}

/// Filter data as written in a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub deny_usernames: Vec<String>,
    #[serde(default)]
    pub allow_usernames: Vec<String>,
    #[serde(default)]
    pub title_keywords: Vec<String>,
}

impl FilterSpec {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse filter file {}", path.display()))
    }

    /// Append patterns given on the command line
    pub fn extend(&mut self, deny: &[String], allow: &[String], keywords: &[String]) {
        self.deny_usernames.extend_from_slice(deny);
        self.allow_usernames.extend_from_slice(allow);
        self.title_keywords.extend_from_slice(keywords);
    }

    pub fn is_empty(&self) -> bool {
        self.deny_usernames.is_empty() && self.title_keywords.is_empty()
    }
}

/// Regex and keyword filter; allow patterns beat deny patterns
#[derive(Debug, Clone)]
pub struct PatternFilter {
    deny: Vec<Regex>,
    allow: Vec<Regex>,
    keywords: Vec<String>,
}

impl PatternFilter {
    pub fn new(spec: &FilterSpec) -> Result<Self> {
        if spec.is_empty() {
            anyhow::bail!("No test data patterns given: pass --deny / --title-keyword or a filter file");
        }
        Ok(Self {
            deny: compile(&spec.deny_usernames)?,
            allow: compile(&spec.allow_usernames)?,
            keywords: spec
                .title_keywords
                .iter()
                .filter(|k| !k.is_empty())
                .map(|k| k.to_lowercase())
                .collect(),
        })
    }
}

/// Case-insensitive patterns matched at the start of the text
fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(&format!("^(?:{})", p))
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid username pattern '{}'", p))
        })
        .collect()
}

impl TestDataFilter for PatternFilter {
    fn is_test_user(&self, username: &str) -> bool {
        !self.is_protected(username) && self.deny.iter().any(|re| re.is_match(username))
    }

    fn is_test_meal(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    fn is_protected(&self, username: &str) -> bool {
        self.allow.iter().any(|re| re.is_match(username))
    }
}
