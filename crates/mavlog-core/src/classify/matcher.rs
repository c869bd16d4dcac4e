//! Single classification rules.

use crate::error::CompilationError;
use crate::severity::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a matcher compares its pattern against a line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    /// Literal containment anywhere in the line.
    Substring,
    /// Line starts with the literal pattern.
    StartsWith,
    /// Line ends with the literal pattern.
    EndsWith,
    /// Unanchored regular-expression search.
    Regex,
}

impl MatcherKind {
    /// Name used in the persisted configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Substring => "substring",
            MatcherKind::StartsWith => "startswith",
            MatcherKind::EndsWith => "endswith",
            MatcherKind::Regex => "regex",
        }
    }
}

impl FromStr for MatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "substring" => Ok(MatcherKind::Substring),
            "startswith" => Ok(MatcherKind::StartsWith),
            "endswith" => Ok(MatcherKind::EndsWith),
            "regex" => Ok(MatcherKind::Regex),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a matcher hit a line. Offsets are byte offsets into the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub severity: Severity,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
enum Pattern {
    Substring(String),
    StartsWith(String),
    EndsWith(String),
    Regex(Regex),
}

/// A compiled classification rule: pattern plus target severity.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Pattern,
    severity: Severity,
}

impl Matcher {
    /// Build a matcher of any kind. Only `Regex` can fail.
    pub fn new(
        kind: MatcherKind,
        pattern: impl Into<String>,
        severity: Severity,
    ) -> Result<Self, CompilationError> {
        let pattern = pattern.into();
        let pattern = match kind {
            MatcherKind::Substring => Pattern::Substring(pattern),
            MatcherKind::StartsWith => Pattern::StartsWith(pattern),
            MatcherKind::EndsWith => Pattern::EndsWith(pattern),
            MatcherKind::Regex => match Regex::new(&pattern) {
                Ok(re) => Pattern::Regex(re),
                Err(source) => return Err(CompilationError { pattern, source }),
            },
        };
        Ok(Self { pattern, severity })
    }

    pub fn substring(pattern: impl Into<String>, severity: Severity) -> Self {
        Self {
            pattern: Pattern::Substring(pattern.into()),
            severity,
        }
    }

    pub fn starts_with(pattern: impl Into<String>, severity: Severity) -> Self {
        Self {
            pattern: Pattern::StartsWith(pattern.into()),
            severity,
        }
    }

    pub fn ends_with(pattern: impl Into<String>, severity: Severity) -> Self {
        Self {
            pattern: Pattern::EndsWith(pattern.into()),
            severity,
        }
    }

    pub fn regex(pattern: impl Into<String>, severity: Severity) -> Result<Self, CompilationError> {
        Self::new(MatcherKind::Regex, pattern, severity)
    }

    pub fn kind(&self) -> MatcherKind {
        match self.pattern {
            Pattern::Substring(_) => MatcherKind::Substring,
            Pattern::StartsWith(_) => MatcherKind::StartsWith,
            Pattern::EndsWith(_) => MatcherKind::EndsWith,
            Pattern::Regex(_) => MatcherKind::Regex,
        }
    }

    /// The pattern text as configured.
    pub fn pattern(&self) -> &str {
        match &self.pattern {
            Pattern::Substring(p) | Pattern::StartsWith(p) | Pattern::EndsWith(p) => p,
            Pattern::Regex(re) => re.as_str(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Target severity if the line matches, `None` otherwise.
    pub fn matches(&self, line: &str) -> Option<Severity> {
        let hit = match &self.pattern {
            Pattern::Substring(p) => line.contains(p.as_str()),
            Pattern::StartsWith(p) => line.starts_with(p.as_str()),
            Pattern::EndsWith(p) => line.ends_with(p.as_str()),
            Pattern::Regex(re) => re.is_match(line),
        };
        hit.then_some(self.severity)
    }

    /// Like [`Matcher::matches`] but also reports the matched span.
    pub fn debug(&self, line: &str) -> Option<MatchSpan> {
        let (start, end) = match &self.pattern {
            Pattern::Substring(p) => {
                let pos = line.find(p.as_str())?;
                (pos, pos + p.len())
            }
            Pattern::StartsWith(p) => {
                if !line.starts_with(p.as_str()) {
                    return None;
                }
                (0, p.len())
            }
            Pattern::EndsWith(p) => {
                if !line.ends_with(p.as_str()) {
                    return None;
                }
                (line.len() - p.len(), line.len())
            }
            Pattern::Regex(re) => {
                let m = re.find(line)?;
                (m.start(), m.end())
            }
        };
        Some(MatchSpan {
            severity: self.severity,
            start,
            end,
        })
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}, {})", self.kind(), self.pattern(), self.severity)
    }
}
