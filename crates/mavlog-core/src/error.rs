//! Error taxonomy for classification config and output parsing.

use thiserror::Error;

/// A regular-expression matcher whose pattern does not compile.
#[derive(Debug, Error)]
#[error("invalid regular expression {pattern:?}: {source}")]
pub struct CompilationError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Errors raised while loading or building a classification configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field {field:?} in classification config: {raw}")]
    MissingField { field: &'static str, raw: String },

    #[error("unknown matcher kind {kind:?} in entry {entry}")]
    UnknownMatcherKind { kind: String, entry: String },

    #[error("unknown severity code {code} in entry {entry}")]
    UnknownSeverity { code: i64, entry: String },

    #[error("malformed matcher entry {entry}: {reason}")]
    MalformedEntry { entry: String, reason: String },

    #[error("matcher #{index} does not compile: {source}")]
    Compilation {
        index: usize,
        #[source]
        source: CompilationError,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single line could not be handled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("expected {expected:?} in line")]
    MissingDelimiter { expected: char },

    #[error("malformed reactor progress {0:?}")]
    BadProgress(String),

    #[error("count out of range: {0:?}")]
    BadCount(String),

    #[error("no state column in reactor summary row")]
    MissingSummaryState,

    #[error("test result reported before any test started")]
    NoCurrentTest,

    #[error("can't parse final test result: {0:?}")]
    UnparsableTestSummary(String),

    #[error("called after end of tests: {0:?}")]
    AfterEndOfTests(String),

    #[error("parser stopped after an earlier failure")]
    ParserFailed,
}

/// Fatal error for a build run: the raw line plus the reason it failed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("error processing {line:?}: {source}")]
pub struct ParseError {
    pub line: String,
    #[source]
    pub source: LineError,
}

impl ParseError {
    pub fn new(line: impl Into<String>, source: LineError) -> Self {
        Self {
            line: line.into(),
            source,
        }
    }
}

/// Result type for config operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
