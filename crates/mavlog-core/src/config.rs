//! Editable classification configuration and its JSON persistence.
//!
//! A matcher persists as the triple `[kind, pattern, severityCode]`; a project
//! configuration is `{"matchers": [...], "test_input": [...]}`. The editable
//! form lives here; [`ClassificationConfig::build_strategy`] turns it into an
//! immutable [`ClassificationStrategy`].

use crate::classify::{ClassificationStrategy, Matcher, MatcherKind};
use crate::error::{CompilationError, ConfigError, ConfigResult};
use crate::severity::Severity;
use serde::de::Error as _;
use serde::ser::{Error as _, SerializeTuple};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the per-project configuration.
pub const PROJECT_CONFIG_FILE: &str = ".mavlog.json";

/// Editable form of a matcher. Changing it requires rebuilding the strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    pub kind: MatcherKind,
    pub pattern: String,
    pub severity: Severity,
}

impl MatcherConfig {
    pub fn new(kind: MatcherKind, pattern: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
            severity,
        }
    }

    pub fn build(&self) -> Result<Matcher, CompilationError> {
        Matcher::new(self.kind, self.pattern.clone(), self.severity)
    }

    /// Validate the persisted parts of a matcher triple.
    fn from_parts(kind: &str, pattern: String, code: i64) -> Result<Self, EntryProblem> {
        let kind = kind
            .parse::<MatcherKind>()
            .map_err(EntryProblem::UnknownKind)?;
        let severity = Severity::from_code(code).ok_or(EntryProblem::UnknownSeverity(code))?;
        Ok(Self::new(kind, pattern, severity))
    }

    fn from_value(entry: &Value) -> ConfigResult<Self> {
        let (kind, pattern, code) = <(String, String, i64)>::deserialize(entry).map_err(|err| {
            ConfigError::MalformedEntry {
                entry: entry.to_string(),
                reason: format!("expected [kind, pattern, severity]: {err}"),
            }
        })?;

        Self::from_parts(&kind, pattern, code).map_err(|problem| match problem {
            EntryProblem::UnknownKind(kind) => ConfigError::UnknownMatcherKind {
                kind,
                entry: entry.to_string(),
            },
            EntryProblem::UnknownSeverity(code) => ConfigError::UnknownSeverity {
                code,
                entry: entry.to_string(),
            },
        })
    }
}

/// Why a well-formed triple is still not a matcher.
#[derive(Debug)]
enum EntryProblem {
    UnknownKind(String),
    UnknownSeverity(i64),
}

impl fmt::Display for EntryProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryProblem::UnknownKind(kind) => write!(f, "unknown matcher kind {kind:?}"),
            EntryProblem::UnknownSeverity(code) => write!(f, "unknown severity code {code}"),
        }
    }
}

impl From<&Matcher> for MatcherConfig {
    fn from(matcher: &Matcher) -> Self {
        Self::new(matcher.kind(), matcher.pattern(), matcher.severity())
    }
}

impl Serialize for MatcherConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let code = self
            .severity
            .code()
            .ok_or_else(|| S::Error::custom("matcher cannot target UNKNOWN"))?;
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(self.kind.as_str())?;
        tuple.serialize_element(&self.pattern)?;
        tuple.serialize_element(&code)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for MatcherConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, pattern, code) = <(String, String, i64)>::deserialize(deserializer)?;
        Self::from_parts(&kind, pattern, code).map_err(D::Error::custom)
    }
}

/// Persisted classification settings of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationConfig {
    /// Ordered matchers; first match wins.
    pub matchers: Vec<MatcherConfig>,
    /// Sample lines used to try out the matchers.
    pub test_input: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            matchers: ClassificationStrategy::default_matchers()
                .iter()
                .map(MatcherConfig::from)
                .collect(),
            test_input: Vec::new(),
        }
    }
}

impl ClassificationConfig {
    pub fn new(matchers: Vec<MatcherConfig>, test_input: Vec<String>) -> Self {
        Self {
            matchers,
            test_input,
        }
    }

    /// Compile every matcher. Fails on the first matcher that does not compile.
    pub fn build_strategy(&self) -> ConfigResult<ClassificationStrategy> {
        let matchers = self
            .matchers
            .iter()
            .enumerate()
            .map(|(index, config)| {
                config
                    .build()
                    .map_err(|source| ConfigError::Compilation { index, source })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(ClassificationStrategy::new(matchers))
    }

    /// Every matcher that does not compile, with its position.
    pub fn check(&self) -> Vec<(usize, CompilationError)> {
        self.matchers
            .iter()
            .enumerate()
            .filter_map(|(index, config)| config.build().err().map(|err| (index, err)))
            .collect()
    }

    pub fn to_value(&self) -> ConfigResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(raw: &Value) -> ConfigResult<Self> {
        let field = |name: &'static str| {
            raw.get(name).ok_or_else(|| ConfigError::MissingField {
                field: name,
                raw: raw.to_string(),
            })
        };

        let matchers = field("matchers")?;
        let test_input = field("test_input")?;

        let matchers = matchers
            .as_array()
            .ok_or_else(|| ConfigError::MalformedEntry {
                entry: matchers.to_string(),
                reason: "matchers must be a list".to_string(),
            })?
            .iter()
            .map(MatcherConfig::from_value)
            .collect::<ConfigResult<Vec<_>>>()?;

        let test_input = test_input
            .as_array()
            .ok_or_else(|| ConfigError::MalformedEntry {
                entry: test_input.to_string(),
                reason: "test_input must be a list".to_string(),
            })?
            .iter()
            .map(|line| {
                line.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::MalformedEntry {
                        entry: line.to_string(),
                        reason: "test input must be a string".to_string(),
                    })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self::new(matchers, test_input))
    }

    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        let raw: Value = serde_json::from_str(s)?;
        Self::from_value(&raw)
    }

    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Path of the configuration file inside a project directory.
    pub fn project_path(project_dir: &Path) -> PathBuf {
        project_dir.join(PROJECT_CONFIG_FILE)
    }

    /// Load the project's configuration, falling back to the defaults.
    pub fn load_for_project(project_dir: &Path) -> ConfigResult<Self> {
        let path = Self::project_path(project_dir);
        if !path.exists() {
            debug!(path = %path.display(), "No classification config, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Persist the project's configuration.
    ///
    /// Default settings are not written; an existing file is removed instead.
    /// Returns the path written, if any.
    pub fn save_for_project(&self, project_dir: &Path) -> ConfigResult<Option<PathBuf>> {
        let path = Self::project_path(project_dir);
        if *self == Self::default() {
            if path.exists() {
                debug!(path = %path.display(), "Removing obsolete classification config");
                std::fs::remove_file(&path)?;
            }
            return Ok(None);
        }
        self.save(&path)?;
        Ok(Some(path))
    }
}
