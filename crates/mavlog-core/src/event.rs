//! Typed events emitted while parsing build output.
//!
//! Events are created once and never revised. Ambiguous input is resolved
//! inside the parser before anything is emitted.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One structured observation about a running build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    /// The build process was launched. Emitted by the driving loop.
    ProcessStarted {
        working_dir: PathBuf,
        args: Vec<String>,
    },

    /// A module of the build started.
    ModuleStarted { coordinate: String },

    /// A plugin goal started, e.g. `maven-clean-plugin:2.5:clean (default-clean) @ demo`.
    PluginStarted { coordinate: String },

    /// One row of the reactor build order table.
    BuildOrderEntry { module: String, packaging: String },

    /// One row of the reactor summary. The duration is kept verbatim.
    ReactorSummaryEntry {
        module: String,
        state: String,
        duration: String,
    },

    /// The unit-test phase printed its header.
    TestsStarted,

    /// A test class started running.
    TestStarted { name: String },

    /// A test class finished.
    TestFinished {
        name: String,
        total: u32,
        failures: u32,
        errors: u32,
        skipped: u32,
        duration: String,
    },

    /// Aggregate result of the unit-test phase.
    TestsFinished {
        total: u32,
        failures: u32,
        errors: u32,
        skipped: u32,
    },

    /// One line of `dependency:tree` output, marker stripped.
    DependencyTreeLine { text: String },

    Warning { text: String },

    Error { text: String },

    /// Uncategorized line. `severity` is set only for test output.
    Output {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        severity: Option<Severity>,
    },

    /// A horizontal rule printed by the build tool.
    SectionBreak,

    /// Reactor progress, `current` of `max` modules.
    Progress { current: u32, max: u32 },

    /// The build printed a `-rf` hint for resuming after a failure.
    ResumeHintDetected { token: String },

    /// The build process exited. Emitted by the driving loop.
    ProcessFinished { exit_code: i32 },
}

impl BuildEvent {
    /// Plain output outside a test phase.
    pub fn output(text: impl Into<String>) -> Self {
        BuildEvent::Output {
            text: text.into(),
            severity: None,
        }
    }

    /// Output inside a test phase, tagged with its classified severity.
    pub fn test_output(text: impl Into<String>, severity: Severity) -> Self {
        BuildEvent::Output {
            text: text.into(),
            severity: Some(severity),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        BuildEvent::Warning { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        BuildEvent::Error { text: text.into() }
    }

    /// Stable snake_case name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildEvent::ProcessStarted { .. } => "process_started",
            BuildEvent::ModuleStarted { .. } => "module_started",
            BuildEvent::PluginStarted { .. } => "plugin_started",
            BuildEvent::BuildOrderEntry { .. } => "build_order_entry",
            BuildEvent::ReactorSummaryEntry { .. } => "reactor_summary_entry",
            BuildEvent::TestsStarted => "tests_started",
            BuildEvent::TestStarted { .. } => "test_started",
            BuildEvent::TestFinished { .. } => "test_finished",
            BuildEvent::TestsFinished { .. } => "tests_finished",
            BuildEvent::DependencyTreeLine { .. } => "dependency_tree_line",
            BuildEvent::Warning { .. } => "warning",
            BuildEvent::Error { .. } => "error",
            BuildEvent::Output { .. } => "output",
            BuildEvent::SectionBreak => "section_break",
            BuildEvent::Progress { .. } => "progress",
            BuildEvent::ResumeHintDetected { .. } => "resume_hint_detected",
            BuildEvent::ProcessFinished { .. } => "process_finished",
        }
    }
}

/// Compact one-line dump, e.g. `#MAVEN_MODULE [demo 1.0]`.
impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildEvent::ProcessStarted { working_dir, args } => {
                write!(f, "#MAVEN_START {} {:?}", working_dir.display(), args)
            }
            BuildEvent::ModuleStarted { coordinate } => write!(f, "#MAVEN_MODULE [{coordinate}]"),
            BuildEvent::PluginStarted { coordinate } => write!(f, "#MAVEN_PLUGIN [{coordinate}]"),
            BuildEvent::BuildOrderEntry { module, packaging } => {
                write!(f, "#BUILD_ORDER [{module}] {packaging}")
            }
            BuildEvent::ReactorSummaryEntry {
                module,
                state,
                duration,
            } => write!(f, "#REACTOR_SUMMARY [{module}] {state} {duration}"),
            BuildEvent::TestsStarted => f.write_str("#START_OF_TESTS"),
            BuildEvent::TestStarted { name } => write!(f, "#TEST [{name}]"),
            BuildEvent::TestFinished {
                name,
                total,
                failures,
                errors,
                skipped,
                duration,
            } => write!(
                f,
                "#TEST_RESULT [{name}] ({total}, {failures}, {errors}, {skipped}, {duration:?})"
            ),
            BuildEvent::TestsFinished {
                total,
                failures,
                errors,
                skipped,
            } => write!(f, "#END_OF_TESTS ({total}, {failures}, {errors}, {skipped})"),
            BuildEvent::DependencyTreeLine { text } => write!(f, "#DEPTREE [{text}]"),
            BuildEvent::Warning { text } => write!(f, "#WARNING {text}"),
            BuildEvent::Error { text } => write!(f, "#ERROR {text}"),
            BuildEvent::Output {
                text,
                severity: None,
            } => f.write_str(text),
            BuildEvent::Output {
                text,
                severity: Some(_),
            } => write!(f, "#TOUT {text}"),
            BuildEvent::SectionBreak => f.write_str("#HR"),
            BuildEvent::Progress { current, max } => write!(f, "#PROGRESS {current}/{max}"),
            BuildEvent::ResumeHintDetected { token } => write!(f, "#RESUME {token:?}"),
            BuildEvent::ProcessFinished { exit_code } => write!(f, "#MAVEN_RC {exit_code}"),
        }
    }
}

/// Receiver of parser events, invoked in emission order.
///
/// Implementations must not block for long; the parser loop waits on them.
pub trait EventSink {
    fn emit(&mut self, event: BuildEvent);
}

impl EventSink for Vec<BuildEvent> {
    fn emit(&mut self, event: BuildEvent) {
        self.push(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(BuildEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: BuildEvent) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_tagged() {
        let event = BuildEvent::ModuleStarted {
            coordinate: "demo 1.0".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "module_started", "coordinate": "demo 1.0"})
        );
    }

    #[test]
    fn test_plain_output_omits_severity() {
        let value = serde_json::to_value(BuildEvent::output("hello")).unwrap();
        assert_eq!(value, json!({"type": "output", "text": "hello"}));

        let value = serde_json::to_value(BuildEvent::test_output("x", Severity::Info)).unwrap();
        assert_eq!(value, json!({"type": "output", "text": "x", "severity": "INFO"}));
    }

    #[test]
    fn test_deserialize_unit_variant() {
        let event: BuildEvent = serde_json::from_value(json!({"type": "section_break"})).unwrap();
        assert_eq!(event, BuildEvent::SectionBreak);
    }

    #[test]
    fn test_display_dump() {
        assert_eq!(BuildEvent::output("[INFO] BUILD SUCCESS").to_string(), "[INFO] BUILD SUCCESS");
        assert_eq!(
            BuildEvent::TestsFinished {
                total: 3,
                failures: 0,
                errors: 0,
                skipped: 0
            }
            .to_string(),
            "#END_OF_TESTS (3, 0, 0, 0)"
        );
        assert_eq!(
            BuildEvent::ResumeHintDetected {
                token: ":my-module".to_string()
            }
            .to_string(),
            "#RESUME \":my-module\""
        );
    }

    #[test]
    fn test_fn_sink_collects() {
        let mut kinds = Vec::new();
        {
            let mut sink = FnSink(|event: BuildEvent| kinds.push(event.kind()));
            sink.emit(BuildEvent::TestsStarted);
            sink.emit(BuildEvent::SectionBreak);
        }
        assert_eq!(kinds, vec!["tests_started", "section_break"]);
    }
}
