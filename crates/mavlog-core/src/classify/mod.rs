//! Severity classification of free-form output lines.
//!
//! A [`ClassificationStrategy`] is an ordered list of [`Matcher`]s built once
//! from configuration and shared read-only with running parsers. Editing the
//! configuration always builds a new strategy.

pub mod matcher;
pub mod strategy;

pub use matcher::{MatchSpan, Matcher, MatcherKind};
pub use strategy::{ClassificationStrategy, DebugHit, DebugResult};
