//! Process transport for mavlog.
//!
//! Starts Maven, merges its stdout and stderr into one line stream and
//! drives a [`mavlog_core::BuildOutputParser`] over it:
//! - [`MavenCommand`] assembles the command line
//! - [`BuildRunner`] runs the build and reports a [`RunOutcome`]
//! - [`replay`] parses a captured log without a process
//! - [`Capture`] keeps a raw copy of a run's output for later replay

pub mod capture;
pub mod command;
pub mod error;
pub mod obs;
pub mod runner;
pub mod sink;
pub mod source;

pub use capture::{default_capture_dir, Capture, RawCapture};
pub use command::{default_executable, search_path, MavenCommand, StartOption, MAVEN_TRAILER};
pub use error::TransportError;
pub use obs::run_span;
pub use runner::{
    replay, BuildRunner, ParseSummary, RunOutcome, ABNORMAL_EXIT_CODE, DEFAULT_EXIT_TIMEOUT,
    EXIT_TIMEOUT_MESSAGE,
};
pub use sink::ChannelSink;
pub use source::{LineSource, ProcessLines, ReaderLines};
