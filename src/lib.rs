pub mod cleanup;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;
pub mod validator;

// Re-export common items
pub use cleanup::run_cleanup;
pub use report::generate_report;
pub use runner::run_tests;
