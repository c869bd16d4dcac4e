//! Severity levels assigned to output lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single line of build output.
///
/// `Trace` through `Error` carry the integer codes `0..=4` used by the
/// persisted matcher format. `Unknown` is the sentinel for "no matcher
/// matched" and has no code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Unknown,
}

impl Severity {
    /// All severities a matcher may target, in code order.
    pub const LEVELS: [Severity; 5] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
    ];

    /// Integer code of this severity, `None` for `Unknown`.
    pub fn code(self) -> Option<u8> {
        match self {
            Severity::Trace => Some(0),
            Severity::Debug => Some(1),
            Severity::Info => Some(2),
            Severity::Warning => Some(3),
            Severity::Error => Some(4),
            Severity::Unknown => None,
        }
    }

    /// Inverse of [`Severity::code`].
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::LEVELS.get(idx).copied())
    }

    /// Upper-case display name.
    pub fn name(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
