//! Streaming parser for Maven console output.
//!
//! Lines go into a [`BuildOutputParser`], typed [`BuildEvent`]s come out.
//! Free-form lines inside the unit-test phase are ranked by a
//! [`ClassificationStrategy`], built from a per-project
//! [`ClassificationConfig`].

pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod parser;
pub mod severity;
pub mod telemetry;

pub use classify::{
    ClassificationStrategy, DebugHit, DebugResult, MatchSpan, Matcher, MatcherKind,
};
pub use config::{ClassificationConfig, MatcherConfig, PROJECT_CONFIG_FILE};
pub use error::{CompilationError, ConfigError, ConfigResult, LineError, ParseError};
pub use event::{BuildEvent, EventSink, FnSink};
pub use parser::{
    BuildOutputParser, ParserPhase, PluginCoordinate, TestOutputParser, TestPhase,
};
pub use severity::Severity;
pub use telemetry::init_tracing;

/// Crate version, reported in run logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
