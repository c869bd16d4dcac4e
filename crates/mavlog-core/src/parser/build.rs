//! Top-level state machine over the raw Maven console stream.

use super::markers::{self, RESUME_PATTERN};
use super::tests_phase::{TestOutputParser, TestPhase};
use crate::classify::ClassificationStrategy;
use crate::error::{LineError, ParseError};
use crate::event::{BuildEvent, EventSink};
use std::mem;
use std::sync::Arc;
use tracing::debug;

/// Parsed `--- artifact:version:goal (execution) @ module ---` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub goal: String,
}

impl PluginCoordinate {
    /// Parse the first token of a plugin header. Accepts
    /// `artifact:version:goal` and `group:artifact:version:goal`; missing
    /// parts are left empty.
    pub fn parse(header: &str) -> Self {
        let token = header.split_whitespace().next().unwrap_or_default();
        let parts: Vec<&str> = token.split(':').collect();
        let part = |i: usize| parts.get(i).copied().unwrap_or_default().to_string();
        if parts.len() >= 4 {
            Self {
                group: part(0),
                artifact: part(1),
                version: part(2),
                goal: part(3),
            }
        } else {
            Self {
                group: String::new(),
                artifact: part(0),
                version: part(1),
                goal: part(2),
            }
        }
    }

    /// Surefire, in either the long or the short (`surefire:`) form.
    pub fn is_test_runner(&self) -> bool {
        matches!(self.artifact.as_str(), "maven-surefire-plugin" | "surefire")
    }

    pub fn is_dependency_tree(&self) -> bool {
        matches!(self.artifact.as_str(), "maven-dependency-plugin" | "dependency")
            && self.goal == "tree"
    }

    /// Plugins that print `Building ...` lines which are not module starts.
    pub fn is_packaging(&self) -> bool {
        matches!(
            self.artifact.as_str(),
            "maven-jar-plugin" | "maven-source-plugin" | "jar" | "source"
        )
    }
}

#[derive(Debug)]
enum State {
    Output,
    ReactorBuildOrder { rows_started: bool },
    ReactorSummary,
    DependencyTree,
    Tests(Box<TestOutputParser>),
    Failed,
}

/// Coarse position of the parser, for callers that inspect a run after EOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserPhase {
    Output,
    ReactorBuildOrder,
    ReactorSummary,
    DependencyTree,
    Tests(TestPhase),
    Failed,
}

/// Streaming parser for one build run.
///
/// Feed lines in order with [`BuildOutputParser::feed`]. A fresh parser is
/// needed for every run. After the first error the parser is failed and
/// rejects all further input.
#[derive(Debug)]
pub struct BuildOutputParser {
    strategy: Arc<ClassificationStrategy>,
    state: State,
    reactor_build: bool,
    current_plugin: PluginCoordinate,
}

impl BuildOutputParser {
    pub fn new(strategy: Arc<ClassificationStrategy>) -> Self {
        Self {
            strategy,
            state: State::Output,
            reactor_build: false,
            current_plugin: PluginCoordinate::default(),
        }
    }

    pub fn phase(&self) -> ParserPhase {
        match &self.state {
            State::Output => ParserPhase::Output,
            State::ReactorBuildOrder { .. } => ParserPhase::ReactorBuildOrder,
            State::ReactorSummary => ParserPhase::ReactorSummary,
            State::DependencyTree => ParserPhase::DependencyTree,
            State::Tests(sub) => ParserPhase::Tests(sub.phase()),
            State::Failed => ParserPhase::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed)
    }

    /// Whether a `Reactor Build Order` table has been seen.
    pub fn is_reactor_build(&self) -> bool {
        self.reactor_build
    }

    pub fn current_plugin(&self) -> &PluginCoordinate {
        &self.current_plugin
    }

    /// Handle one line and return the events it produced.
    ///
    /// Trailing whitespace is ignored. On error no events are returned for
    /// this line and the parser stays failed.
    pub fn feed(&mut self, line: &str) -> Result<Vec<BuildEvent>, ParseError> {
        let line = line.trim_end();
        let mut out = Vec::new();
        let state = mem::replace(&mut self.state, State::Failed);
        match self.step(state, line, &mut out) {
            Ok(next) => {
                self.state = next;
                Ok(out)
            }
            Err(source) => Err(ParseError::new(line, source)),
        }
    }

    /// Like [`BuildOutputParser::feed`], delivering events to a sink.
    pub fn feed_into<S>(&mut self, line: &str, sink: &mut S) -> Result<(), ParseError>
    where
        S: EventSink + ?Sized,
    {
        for event in self.feed(line)? {
            sink.emit(event);
        }
        Ok(())
    }

    /// Parse a whole captured log. Events of lines before a failure are
    /// delivered before the error is returned.
    pub fn parse_all<I, L, S>(&mut self, lines: I, sink: &mut S) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
        S: EventSink + ?Sized,
    {
        for line in lines {
            self.feed_into(line.as_ref(), sink)?;
        }
        Ok(())
    }

    fn step(
        &mut self,
        state: State,
        line: &str,
        out: &mut Vec<BuildEvent>,
    ) -> Result<State, LineError> {
        match state {
            State::Output => self.output(line, out),
            State::ReactorBuildOrder { rows_started } => {
                if line == markers::INFO {
                    return Ok(if rows_started {
                        State::Output
                    } else {
                        State::ReactorBuildOrder { rows_started }
                    });
                }
                out.push(build_order_entry(line)?);
                Ok(State::ReactorBuildOrder { rows_started: true })
            }
            State::ReactorSummary => {
                if line.starts_with(markers::RULE_PREFIX) {
                    return Ok(State::Output);
                }
                if line != markers::INFO {
                    out.push(reactor_summary_entry(line)?);
                }
                Ok(State::ReactorSummary)
            }
            State::DependencyTree => {
                if line.starts_with(markers::DEPENDENCY_TREE_END) || line == markers::INFO {
                    return self.output(line, out);
                }
                if let Some(rest) = line.strip_prefix(markers::INFO_PREFIX) {
                    out.push(BuildEvent::DependencyTreeLine {
                        text: rest.trim().to_string(),
                    });
                } else {
                    out.push(BuildEvent::warning(format!(
                        "Unexpected output in dependency:tree: {line:?}"
                    )));
                }
                Ok(State::DependencyTree)
            }
            State::Tests(mut sub) => {
                sub.feed(line, out)?;
                if sub.is_done() {
                    debug!("unit tests finished");
                    Ok(State::Output)
                } else {
                    Ok(State::Tests(sub))
                }
            }
            State::Failed => Err(LineError::ParserFailed),
        }
    }

    fn output(&mut self, line: &str, out: &mut Vec<BuildEvent>) -> Result<State, LineError> {
        if line == markers::REACTOR_BUILD_ORDER {
            self.reactor_build = true;
            return Ok(State::ReactorBuildOrder { rows_started: false });
        }

        if let Some(rest) = line.strip_prefix(markers::MODULE_START_PREFIX) {
            if self.current_plugin.is_packaging() {
                out.push(BuildEvent::output(line));
            } else {
                self.module_start(rest, out)?;
            }
            return Ok(State::Output);
        }

        if line.starts_with(markers::SUMMARY_START_PREFIX) {
            return Ok(State::ReactorSummary);
        }

        if let Some(header) = line
            .strip_prefix(markers::PLUGIN_PREFIX)
            .and_then(|rest| rest.strip_suffix(markers::PLUGIN_SUFFIX))
        {
            let header = header.trim();
            out.push(BuildEvent::PluginStarted {
                coordinate: header.to_string(),
            });
            self.current_plugin = PluginCoordinate::parse(header);
            if self.current_plugin.is_test_runner() {
                debug!("detected unit test start");
                return Ok(State::Tests(Box::new(TestOutputParser::new(
                    self.strategy.clone(),
                ))));
            }
            if self.current_plugin.is_dependency_tree() {
                return Ok(State::DependencyTree);
            }
            return Ok(State::Output);
        }

        if let Some(rest) = line.strip_prefix(markers::WARNING_PREFIX) {
            out.push(BuildEvent::warning(rest.trim()));
            return Ok(State::Output);
        }

        if let Some(rest) = line.strip_prefix(markers::ERROR_PREFIX) {
            if line.contains(markers::RESUME_FLAG) {
                match RESUME_PATTERN.captures(line) {
                    Some(caps) => out.push(BuildEvent::ResumeHintDetected {
                        token: caps[1].to_string(),
                    }),
                    None => debug!(line, "resume flag without resume command"),
                }
            }
            out.push(BuildEvent::error(rest.trim()));
            return Ok(State::Output);
        }

        if line
            .strip_prefix(markers::INFO_PREFIX)
            .is_some_and(markers::is_dashes)
        {
            out.push(BuildEvent::SectionBreak);
            return Ok(State::Output);
        }

        out.push(BuildEvent::output(line));
        Ok(State::Output)
    }

    fn module_start(&self, rest: &str, out: &mut Vec<BuildEvent>) -> Result<(), LineError> {
        if !self.reactor_build {
            out.push(BuildEvent::ModuleStarted {
                coordinate: rest.to_string(),
            });
            return Ok(());
        }

        let Some(open) = rest.find('[') else {
            out.push(BuildEvent::ModuleStarted {
                coordinate: rest.trim().to_string(),
            });
            return Ok(());
        };
        let close = rest[open..]
            .find(']')
            .map(|i| open + i)
            .ok_or(LineError::MissingDelimiter { expected: ']' })?;
        let (current, max) = parse_progress(&rest[open + 1..close])?;
        out.push(BuildEvent::Progress { current, max });
        out.push(BuildEvent::ModuleStarted {
            coordinate: rest[..open].trim().to_string(),
        });
        Ok(())
    }
}

fn parse_progress(text: &str) -> Result<(u32, u32), LineError> {
    let bad = || LineError::BadProgress(text.to_string());
    let (current, max) = text.split_once('/').ok_or_else(bad)?;
    let current = current.trim().parse().map_err(|_| bad())?;
    let max = max.trim().parse().map_err(|_| bad())?;
    Ok((current, max))
}

/// Split `[marker] body [bracketed]` into the body and the optional
/// bracketed tail.
fn split_row(line: &str) -> Result<(&str, Option<&str>), LineError> {
    let marker_end = line
        .find(']')
        .ok_or(LineError::MissingDelimiter { expected: ']' })?;
    let rest = &line[marker_end + 1..];
    match rest.find('[') {
        None => Ok((rest.trim(), None)),
        Some(open) => {
            let tail = &rest[open + 1..];
            let tail = tail.strip_suffix(']').unwrap_or(tail);
            Ok((rest[..open].trim(), Some(tail.trim())))
        }
    }
}

fn build_order_entry(line: &str) -> Result<BuildEvent, LineError> {
    let (module, packaging) = split_row(line)?;
    Ok(BuildEvent::BuildOrderEntry {
        module: module.to_string(),
        packaging: packaging.unwrap_or_default().to_string(),
    })
}

fn reactor_summary_entry(line: &str) -> Result<BuildEvent, LineError> {
    let (body, duration) = split_row(line)?;
    let (module, state) = body.rsplit_once(' ').ok_or(LineError::MissingSummaryState)?;
    Ok(BuildEvent::ReactorSummaryEntry {
        module: module.trim_end_matches([' ', '.']).to_string(),
        state: state.trim().to_string(),
        duration: duration.unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn parse(lines: &[&str]) -> Vec<BuildEvent> {
        let mut parser = BuildOutputParser::new(Arc::new(ClassificationStrategy::default()));
        let mut events = Vec::new();
        parser.parse_all(lines, &mut events).unwrap();
        events
    }

    #[test]
    fn test_single_module_no_tests() {
        assert_eq!(
            parse(&["[INFO] Building demo 1.0", "[INFO] BUILD SUCCESS"]),
            vec![
                BuildEvent::ModuleStarted {
                    coordinate: "demo 1.0".to_string()
                },
                BuildEvent::output("[INFO] BUILD SUCCESS"),
            ]
        );
    }

    #[test]
    fn test_resume_hint() {
        assert_eq!(
            parse(&["[ERROR]   mvn <args> -rf :my-module"]),
            vec![
                BuildEvent::ResumeHintDetected {
                    token: ":my-module".to_string()
                },
                BuildEvent::error("mvn <args> -rf :my-module"),
            ]
        );
    }

    #[test]
    fn test_error_with_rf_but_no_command() {
        assert_eq!(
            parse(&["[ERROR] use -rf to resume"]),
            vec![BuildEvent::error("use -rf to resume")]
        );
    }

    #[test]
    fn test_warning_and_section_break() {
        assert_eq!(
            parse(&[
                "[WARNING]  Using platform encoding ",
                "[INFO] ------------------------------------------------------------------------",
                "[INFO] ---",
            ]),
            vec![
                BuildEvent::warning("Using platform encoding"),
                BuildEvent::SectionBreak,
                BuildEvent::SectionBreak,
            ]
        );
    }

    #[test]
    fn test_plugin_coordinate_forms() {
        let long =
            PluginCoordinate::parse("maven-surefire-plugin:2.12.4:test (default-test) @ demo");
        assert_eq!(long.artifact, "maven-surefire-plugin");
        assert_eq!(long.version, "2.12.4");
        assert_eq!(long.goal, "test");
        assert!(long.is_test_runner());

        let grouped = PluginCoordinate::parse(
            "org.apache.maven.plugins:maven-dependency-plugin:3.1.1:tree (default-cli) @ demo",
        );
        assert_eq!(grouped.group, "org.apache.maven.plugins");
        assert!(grouped.is_dependency_tree());

        let short = PluginCoordinate::parse("jar:3.3.0:jar (default-jar) @ demo");
        assert!(short.is_packaging());

        let odd = PluginCoordinate::parse("weird");
        assert_eq!(odd.artifact, "weird");
        assert_eq!(odd.goal, "");
    }

    #[test]
    fn test_building_line_inside_jar_plugin_is_output() {
        let events = parse(&[
            "[INFO] --- maven-jar-plugin:2.4:jar (default-jar) @ demo ---",
            "[INFO] Building jar: /tmp/demo/target/demo-1.0.jar",
        ]);
        assert_eq!(
            events,
            vec![
                BuildEvent::PluginStarted {
                    coordinate: "maven-jar-plugin:2.4:jar (default-jar) @ demo".to_string()
                },
                BuildEvent::output("[INFO] Building jar: /tmp/demo/target/demo-1.0.jar"),
            ]
        );
    }

    #[test]
    fn test_reactor_build_order_and_progress() {
        let events = parse(&[
            "[INFO] Reactor Build Order:",
            "[INFO]",
            "[INFO] parent                                                             [pom]",
            "[INFO] module1",
            "[INFO]",
            "[INFO] Building module1 1.0-SNAPSHOT                                      [2/3]",
        ]);
        assert_eq!(
            events,
            vec![
                BuildEvent::BuildOrderEntry {
                    module: "parent".to_string(),
                    packaging: "pom".to_string()
                },
                BuildEvent::BuildOrderEntry {
                    module: "module1".to_string(),
                    packaging: String::new()
                },
                BuildEvent::Progress { current: 2, max: 3 },
                BuildEvent::ModuleStarted {
                    coordinate: "module1 1.0-SNAPSHOT".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_reactor_summary() {
        let events = parse(&[
            "[INFO] Reactor Summary for parent 1.0-SNAPSHOT:",
            "[INFO]",
            "[INFO] parent ............................................. SUCCESS [  0.123 s]",
            "[INFO] module1 ............................................ FAILURE [01:02 min]",
            "[INFO] module2 ............................................ SKIPPED",
            "[INFO] ------------------------------------------------------------------------",
            "[INFO] BUILD FAILURE",
        ]);
        assert_eq!(
            events,
            vec![
                BuildEvent::ReactorSummaryEntry {
                    module: "parent".to_string(),
                    state: "SUCCESS".to_string(),
                    duration: "0.123 s".to_string()
                },
                BuildEvent::ReactorSummaryEntry {
                    module: "module1".to_string(),
                    state: "FAILURE".to_string(),
                    duration: "01:02 min".to_string()
                },
                BuildEvent::ReactorSummaryEntry {
                    module: "module2".to_string(),
                    state: "SKIPPED".to_string(),
                    duration: String::new()
                },
                BuildEvent::output("[INFO] BUILD FAILURE"),
            ]
        );
    }

    #[test]
    fn test_dependency_tree_section() {
        let events = parse(&[
            "[INFO] --- maven-dependency-plugin:2.8:tree (default-cli) @ demo ---",
            "[INFO] com.example:demo:jar:1.0",
            "[INFO] \\- junit:junit:jar:4.12:test",
            "something odd",
            "[INFO] ------------------------------------------------------------------------",
        ]);
        assert_eq!(
            events,
            vec![
                BuildEvent::PluginStarted {
                    coordinate: "maven-dependency-plugin:2.8:tree (default-cli) @ demo".to_string()
                },
                BuildEvent::DependencyTreeLine {
                    text: "com.example:demo:jar:1.0".to_string()
                },
                BuildEvent::DependencyTreeLine {
                    text: "\\- junit:junit:jar:4.12:test".to_string()
                },
                BuildEvent::warning("Unexpected output in dependency:tree: \"something odd\""),
                BuildEvent::SectionBreak,
            ]
        );
    }

    #[test]
    fn test_bad_progress_fails_the_run() {
        let mut parser = BuildOutputParser::new(Arc::new(ClassificationStrategy::default()));
        parser.feed("[INFO] Reactor Build Order:").unwrap();
        parser.feed("[INFO]").unwrap();
        parser.feed("[INFO] a").unwrap();
        parser.feed("[INFO]").unwrap();
        let err = parser.feed("[INFO] Building a 1.0 [x/y]").unwrap_err();
        assert_eq!(err.line, "[INFO] Building a 1.0 [x/y]");
        assert_eq!(err.source, LineError::BadProgress("x/y".to_string()));
        assert!(parser.is_failed());

        let err = parser.feed("[INFO] BUILD SUCCESS").unwrap_err();
        assert_eq!(err.source, LineError::ParserFailed);
    }

    #[test]
    fn test_trailing_whitespace_ignored() {
        assert_eq!(
            parse(&["[INFO] ", "[INFO] Building demo 1.0   "]),
            vec![
                BuildEvent::output("[INFO]"),
                BuildEvent::ModuleStarted {
                    coordinate: "demo 1.0".to_string()
                },
            ]
        );
    }

    #[traced_test]
    #[test]
    fn test_test_phase_transitions_are_logged() {
        parse(&[
            "[INFO] --- surefire:3.0.0:test (default-test) @ demo ---",
            "[INFO] No tests to run.",
        ]);
        assert!(logs_contain("detected unit test start"));
        assert!(logs_contain("unit tests finished"));
    }
}
