//! Ordered matcher lists and the debugger used by config editors.

use super::matcher::{MatchSpan, Matcher};
use crate::severity::Severity;
use std::fmt;

/// Ordered list of matchers. The first matching rule decides the severity.
#[derive(Debug, Clone)]
pub struct ClassificationStrategy {
    matchers: Vec<Matcher>,
}

impl ClassificationStrategy {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    /// Rules used when a project has no custom configuration.
    pub fn default_matchers() -> Vec<Matcher> {
        vec![
            Matcher::starts_with("\tat ", Severity::Error),
            Matcher::substring(" ERROR ", Severity::Error),
            Matcher::regex(r"\bWARN(\b|NING)", Severity::Warning)
                .expect("built-in pattern compiles"),
            Matcher::substring(" INFO ", Severity::Info),
            Matcher::substring(" DEBUG ", Severity::Debug),
            Matcher::regex("(?i)error", Severity::Error).expect("built-in pattern compiles"),
        ]
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Severity of the first matcher that matches, `Unknown` if none does.
    pub fn classify(&self, line: &str) -> Severity {
        self.matchers
            .iter()
            .find_map(|m| m.matches(line))
            .unwrap_or(Severity::Unknown)
    }

    /// Which matcher decided the line, and where it matched.
    pub fn debug<'a>(&'a self, line: &'a str) -> DebugResult<'a> {
        let hit = self
            .matchers
            .iter()
            .enumerate()
            .find_map(|(index, m)| m.debug(line).map(|span| (index, m, span)));

        match hit {
            Some((index, matcher, span)) => DebugResult {
                line,
                hit: Some(DebugHit {
                    index,
                    matcher,
                    span,
                }),
            },
            None => DebugResult { line, hit: None },
        }
    }

    /// Run [`ClassificationStrategy::debug`] over sample inputs.
    pub fn debug_all<'a, I>(&'a self, inputs: I) -> Vec<DebugResult<'a>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        inputs.into_iter().map(|line| self.debug(line)).collect()
    }
}

impl Default for ClassificationStrategy {
    fn default() -> Self {
        Self::new(Self::default_matchers())
    }
}

/// The matcher that fired for a line.
#[derive(Debug, Clone, Copy)]
pub struct DebugHit<'a> {
    /// Position of the matcher in the strategy.
    pub index: usize,
    pub matcher: &'a Matcher,
    pub span: MatchSpan,
}

/// Outcome of debugging one line against a strategy.
#[derive(Debug, Clone, Copy)]
pub struct DebugResult<'a> {
    pub line: &'a str,
    pub hit: Option<DebugHit<'a>>,
}

impl DebugResult<'_> {
    pub fn severity(&self) -> Severity {
        self.hit
            .map(|hit| hit.span.severity)
            .unwrap_or(Severity::Unknown)
    }
}

impl fmt::Display for DebugResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hit {
            None => write!(f, "({:?}, -)", self.line),
            Some(hit) => write!(
                f,
                "({:?}, {}, result={}, range=[{}:{}])",
                self.line, hit.matcher, hit.span.severity, hit.span.start, hit.span.end
            ),
        }
    }
}
