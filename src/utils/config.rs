use crate::parser::types::TestSuite;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted for the base URL
pub const BASE_URL_ENV: &str = "FORKCAST_BASE_URL";

/// Settings given on the command line; `None` defers to the suite
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub write_reports: bool,
}

/// Effective configuration for one suite run
#[derive(Debug, Clone)]
pub struct Config {
    /// API base URL, e.g. "http://localhost:3000/api"
    pub base_url: Option<String>,

    /// Per-request timeout (ms)
    pub request_timeout_ms: u64,

    /// Directory for results.json and junit.xml
    pub output_dir: PathBuf,

    /// Write report files after the run
    pub write_reports: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 30_000,
            output_dir: PathBuf::from("./output"),
            write_reports: false,
        }
    }
}

impl Config {
    /// Overrides win over the suite header, which wins over defaults
    pub fn resolve(suite: &TestSuite, overrides: &Overrides) -> Self {
        let defaults = Self::default();
        Self {
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| suite.base_url.clone())
                .filter(|url| !url.trim().is_empty()),
            request_timeout_ms: overrides
                .timeout_ms
                .or(suite.timeout_ms)
                .unwrap_or(defaults.request_timeout_ms),
            output_dir: overrides
                .output_dir
                .clone()
                .unwrap_or(defaults.output_dir),
            write_reports: overrides.write_reports,
        }
    }

    pub fn base_url(&self) -> Result<&str> {
        self.base_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No base URL: set baseUrl in the suite, pass --base-url or set {}",
                BASE_URL_ENV
            )
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// HTTP client honoring the request timeout
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout())
            .user_agent(concat!("forkcast-tester/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_suite_content;
    use std::path::Path;

    fn suite() -> TestSuite {
        parse_suite_content(
            "name: s\nbaseUrl: http://suite/api\ntimeout: 500\ncases: []\n",
            Path::new("s.yaml"),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(
            &parse_suite_content("name: s\ncases: []\n", Path::new("s.yaml")).unwrap(),
            &Overrides::default(),
        );
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert!(config.base_url().is_err());
    }

    #[test]
    fn test_suite_header_over_defaults() {
        let config = Config::resolve(&suite(), &Overrides::default());
        assert_eq!(config.base_url().unwrap(), "http://suite/api");
        assert_eq!(config.request_timeout_ms, 500);
    }

    #[test]
    fn test_overrides_over_suite_header() {
        let overrides = Overrides {
            base_url: Some("http://cli/api".into()),
            timeout_ms: Some(1000),
            output_dir: Some(PathBuf::from("/tmp/out")),
            write_reports: true,
        };
        let config = Config::resolve(&suite(), &overrides);
        assert_eq!(config.base_url().unwrap(), "http://cli/api");
        assert_eq!(config.request_timeout_ms, 1000);
        assert!(config.write_reports);
    }
}
