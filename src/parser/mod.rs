pub mod types;
pub mod yaml;

use thiserror::Error;

pub use types::{Assertion, TestCase, TestSuite};
pub use yaml::{parse_suite_content, parse_suite_file};

/// Structural problems found while loading a suite
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("case #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate case name '{0}'")]
    DuplicateName(String),

    #[error("case '{case}' depends on '{dependency}', which is not declared before it")]
    UnknownDependency { case: String, dependency: String },

    #[error("case '{case}' has invalid HTTP method '{method}'")]
    InvalidMethod { case: String, method: String },

    #[error("case '{0}' declares both a body and an upload")]
    BodyAndUpload(String),

    #[error("case '{0}' upload sets both path and base64")]
    AmbiguousUpload(String),
}
