//! Line-oriented parsers for Maven console output.

pub mod build;
pub mod markers;
pub mod tests_phase;

pub use build::{BuildOutputParser, ParserPhase, PluginCoordinate};
pub use tests_phase::{TestOutputParser, TestPhase};
