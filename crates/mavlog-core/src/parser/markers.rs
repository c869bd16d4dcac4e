//! Console markers printed by Maven. These are a fixed wire format.

use once_cell::sync::Lazy;
use regex::Regex;

pub const INFO: &str = "[INFO]";
pub const INFO_PREFIX: &str = "[INFO] ";
pub const WARNING_PREFIX: &str = "[WARNING]";
pub const ERROR_PREFIX: &str = "[ERROR]";

pub const REACTOR_BUILD_ORDER: &str = "[INFO] Reactor Build Order:";
pub const MODULE_START_PREFIX: &str = "[INFO] Building ";
pub const SUMMARY_START_PREFIX: &str = "[INFO] Reactor Summary";
pub const PLUGIN_PREFIX: &str = "[INFO] --- ";
pub const PLUGIN_SUFFIX: &str = " ---";
pub const RULE_PREFIX: &str = "[INFO] ---";
pub const DEPENDENCY_TREE_END: &str = "[INFO] ---------------";
pub const RESUME_FLAG: &str = " -rf ";

pub const NO_TESTS: &str = "[INFO] No tests to run.";
pub const TEST_START_PREFIX: &str = "Running ";
pub const TEST_FINISHED_PREFIX: &str = "Tests run: ";
pub const RESULTS: &str = "Results :";
pub const FAILED_TESTS_PREFIX: &str = "Failed tests: ";
pub const TESTS_IN_ERROR_PREFIX: &str = "Tests in error:";

pub static RESUME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[ERROR\]\s+mvn <[^>]+> -rf (\S+)$").expect("valid regex"));

/// Result line of a single test class.
pub static TEST_FINISHED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^Tests run: (\d+), Failures: (\d+), Errors: (\d+), Skipped: (\d+), Time elapsed: (.*)$",
    )
    .expect("valid regex")
});

/// Aggregate result line of the whole test phase. No duration at this level.
pub static TESTS_FINISHED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Tests run: (\d+), Failures: (\d+), Errors: (\d+), Skipped: (\d+)$")
        .expect("valid regex")
});

/// Non-empty and made of dashes only.
pub fn is_dashes(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b == b'-')
}
