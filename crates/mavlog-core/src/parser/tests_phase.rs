//! Sub-parser for the surefire unit-test phase.
//!
//! The end of the test phase is announced by a sequence of marker lines
//! (`""`, `"Results :"`, `""`, `"Tests run: ..."`). A blank line alone is
//! ambiguous, so the parser buffers the candidate prefix and replays it as
//! plain output when a later line disproves the hypothesis.

use super::markers::{self, TESTS_FINISHED_PATTERN, TEST_FINISHED_PATTERN};
use crate::classify::ClassificationStrategy;
use crate::error::LineError;
use crate::event::BuildEvent;
use crate::severity::Severity;
use regex::Captures;
use std::sync::Arc;
use tracing::debug;

/// Position of the sub-parser within the test phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    SkipHeaders,
    ParseTestOutput,
    MaybeEndOfTests1,
    MaybeEndOfTests3,
    MaybeEndOfTests4,
    MaybeEndOfTests5,
    Done,
}

/// State machine for the lines between a surefire plugin header and the
/// aggregate `Tests run:` summary.
#[derive(Debug)]
pub struct TestOutputParser {
    strategy: Arc<ClassificationStrategy>,
    phase: TestPhase,
    dash_lines: u8,
    buffer: Vec<String>,
    current_test: Option<String>,
    pending_summary: Option<String>,
}

impl TestOutputParser {
    pub fn new(strategy: Arc<ClassificationStrategy>) -> Self {
        Self {
            strategy,
            phase: TestPhase::SkipHeaders,
            dash_lines: 0,
            buffer: Vec::new(),
            current_test: None,
            pending_summary: None,
        }
    }

    pub fn phase(&self) -> TestPhase {
        self.phase
    }

    /// `TestsFinished` has been emitted; no more input is accepted.
    pub fn is_done(&self) -> bool {
        self.phase == TestPhase::Done
    }

    /// Name of the test class currently running, if any.
    pub fn current_test(&self) -> Option<&str> {
        self.current_test.as_deref()
    }

    /// Consume one line, appending the resulting events to `out`.
    pub fn feed(&mut self, line: &str, out: &mut Vec<BuildEvent>) -> Result<(), LineError> {
        let next = match self.phase {
            TestPhase::SkipHeaders => self.skip_headers(line, out),
            TestPhase::ParseTestOutput => self.parse_test_output(line, out)?,
            TestPhase::MaybeEndOfTests1 => self.maybe_end_of_tests_1(line, out)?,
            TestPhase::MaybeEndOfTests3 => self.maybe_end_of_tests_3(line, out)?,
            TestPhase::MaybeEndOfTests4 => self.maybe_end_of_tests_4(line, out),
            TestPhase::MaybeEndOfTests5 => self.maybe_end_of_tests_5(line, out)?,
            TestPhase::Done => return Err(LineError::AfterEndOfTests(line.to_string())),
        };
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, "test phase transition");
        }
        self.phase = next;
        Ok(())
    }

    fn skip_headers(&mut self, line: &str, out: &mut Vec<BuildEvent>) -> TestPhase {
        let line = line.trim();
        if line.is_empty() {
            return TestPhase::SkipHeaders;
        }

        if line == markers::NO_TESTS {
            out.push(BuildEvent::TestsFinished {
                total: 0,
                failures: 0,
                errors: 0,
                skipped: 0,
            });
            return TestPhase::Done;
        }

        if markers::is_dashes(line) {
            if self.dash_lines == 0 {
                out.push(BuildEvent::TestsStarted);
            }
            self.dash_lines += 1;
            if self.dash_lines == 2 {
                return TestPhase::ParseTestOutput;
            }
            return TestPhase::SkipHeaders;
        }

        if line.starts_with(markers::INFO) {
            out.push(BuildEvent::output(line));
        }
        TestPhase::SkipHeaders
    }

    fn parse_test_output(
        &mut self,
        line: &str,
        out: &mut Vec<BuildEvent>,
    ) -> Result<TestPhase, LineError> {
        if let Some(name) = line.strip_prefix(markers::TEST_START_PREFIX) {
            let name = name.trim().to_string();
            self.current_test = Some(name.clone());
            out.push(BuildEvent::TestStarted { name });
            return Ok(TestPhase::ParseTestOutput);
        }

        if line.starts_with(markers::TEST_FINISHED_PREFIX) {
            if let Some(caps) = TEST_FINISHED_PATTERN.captures(line) {
                let name = self.current_test.clone().ok_or(LineError::NoCurrentTest)?;
                let (total, failures, errors, skipped) = counts(&caps)?;
                out.push(BuildEvent::TestFinished {
                    name,
                    total,
                    failures,
                    errors,
                    skipped,
                    duration: caps[5].to_string(),
                });
                return Ok(TestPhase::ParseTestOutput);
            }
        }

        if line.is_empty() {
            self.buffer.push(String::new());
            return Ok(TestPhase::MaybeEndOfTests1);
        }

        out.push(self.classified(line));
        Ok(TestPhase::ParseTestOutput)
    }

    fn maybe_end_of_tests_1(
        &mut self,
        line: &str,
        out: &mut Vec<BuildEvent>,
    ) -> Result<TestPhase, LineError> {
        if line == markers::RESULTS {
            debug!("possible end of tests");
            self.buffer.push(line.to_string());
            return Ok(TestPhase::MaybeEndOfTests3);
        }
        if line.is_empty() {
            self.buffer.push(String::new());
            return Ok(TestPhase::MaybeEndOfTests1);
        }
        self.something_else(line, out)
    }

    fn maybe_end_of_tests_3(
        &mut self,
        line: &str,
        out: &mut Vec<BuildEvent>,
    ) -> Result<TestPhase, LineError> {
        if line.starts_with(markers::TEST_FINISHED_PREFIX) {
            // The buffered lines are the end-of-tests banner itself.
            self.buffer.clear();
            self.pending_summary = Some(line.to_string());
            return Ok(TestPhase::MaybeEndOfTests5);
        }
        if line.starts_with(markers::FAILED_TESTS_PREFIX)
            || line.starts_with(markers::TESTS_IN_ERROR_PREFIX)
        {
            self.flush(out);
            out.push(BuildEvent::error(line));
            return Ok(TestPhase::MaybeEndOfTests4);
        }
        if line.is_empty() {
            self.buffer.push(String::new());
            return Ok(TestPhase::MaybeEndOfTests3);
        }
        self.something_else(line, out)
    }

    fn maybe_end_of_tests_4(&mut self, line: &str, out: &mut Vec<BuildEvent>) -> TestPhase {
        if line.starts_with(markers::TEST_FINISHED_PREFIX) {
            self.pending_summary = Some(line.to_string());
            return TestPhase::MaybeEndOfTests5;
        }
        out.push(BuildEvent::error(line));
        TestPhase::MaybeEndOfTests4
    }

    fn maybe_end_of_tests_5(
        &mut self,
        line: &str,
        out: &mut Vec<BuildEvent>,
    ) -> Result<TestPhase, LineError> {
        if !line.starts_with(markers::INFO) {
            return Ok(TestPhase::MaybeEndOfTests5);
        }

        self.buffer.clear();
        let summary = self.pending_summary.take().unwrap_or_default();
        let caps = TESTS_FINISHED_PATTERN
            .captures(&summary)
            .ok_or_else(|| LineError::UnparsableTestSummary(summary.clone()))?;
        let (total, failures, errors, skipped) = counts(&caps)?;
        debug!(total, failures, errors, skipped, "end of tests");
        out.push(BuildEvent::TestsFinished {
            total,
            failures,
            errors,
            skipped,
        });
        Ok(TestPhase::Done)
    }

    /// The end-of-tests hypothesis was wrong: replay the buffer as output and
    /// handle `line` as regular test output.
    fn something_else(
        &mut self,
        line: &str,
        out: &mut Vec<BuildEvent>,
    ) -> Result<TestPhase, LineError> {
        debug!(buffered = self.buffer.len(), "not the end of tests");
        self.flush(out);
        self.parse_test_output(line, out)
    }

    fn flush(&mut self, out: &mut Vec<BuildEvent>) {
        for text in self.buffer.drain(..) {
            let severity = self.strategy.classify(&text);
            out.push(BuildEvent::test_output(text, severity));
        }
    }

    fn classified(&self, line: &str) -> BuildEvent {
        match self.strategy.classify(line) {
            Severity::Error => BuildEvent::error(line),
            Severity::Warning => BuildEvent::warning(line),
            severity => BuildEvent::test_output(line, severity),
        }
    }
}

fn counts(caps: &Captures<'_>) -> Result<(u32, u32, u32, u32), LineError> {
    let field = |i: usize| {
        caps[i]
            .parse::<u32>()
            .map_err(|_| LineError::BadCount(caps[i].to_string()))
    };
    Ok((field(1)?, field(2)?, field(3)?, field(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TestOutputParser {
        TestOutputParser::new(Arc::new(ClassificationStrategy::default()))
    }

    fn in_test_output() -> TestOutputParser {
        let mut p = parser();
        let mut out = Vec::new();
        for line in ["---", " T E S T S", "---"] {
            p.feed(line, &mut out).unwrap();
        }
        assert_eq!(out, vec![BuildEvent::TestsStarted]);
        assert_eq!(p.phase(), TestPhase::ParseTestOutput);
        p
    }

    fn feed_all(p: &mut TestOutputParser, lines: &[&str]) -> Vec<BuildEvent> {
        let mut out = Vec::new();
        for line in lines {
            p.feed(line, &mut out).unwrap();
        }
        out
    }

    #[test]
    fn test_no_tests_to_run() {
        let mut p = parser();
        let out = feed_all(&mut p, &["", "[INFO] No tests to run."]);
        assert_eq!(
            out,
            vec![BuildEvent::TestsFinished {
                total: 0,
                failures: 0,
                errors: 0,
                skipped: 0
            }]
        );
        assert!(p.is_done());
    }

    #[test]
    fn test_headers_pass_info_lines() {
        let mut p = parser();
        let out = feed_all(&mut p, &["[INFO] Surefire report directory: /tmp", "noise"]);
        assert_eq!(out, vec![BuildEvent::output("[INFO] Surefire report directory: /tmp")]);
        assert_eq!(p.phase(), TestPhase::SkipHeaders);
    }

    #[test]
    fn test_single_test_lifecycle() {
        let mut p = in_test_output();
        let out = feed_all(
            &mut p,
            &[
                "Running com.example.FooTest",
                "Tests run: 2, Failures: 0, Errors: 0, Skipped: 1, Time elapsed: 0.031 sec",
            ],
        );
        assert_eq!(
            out,
            vec![
                BuildEvent::TestStarted {
                    name: "com.example.FooTest".to_string()
                },
                BuildEvent::TestFinished {
                    name: "com.example.FooTest".to_string(),
                    total: 2,
                    failures: 0,
                    errors: 0,
                    skipped: 1,
                    duration: "0.031 sec".to_string(),
                },
            ]
        );
        assert_eq!(p.current_test(), Some("com.example.FooTest"));
    }

    #[test]
    fn test_result_without_running_test_is_an_error() {
        let mut p = in_test_output();
        let err = p
            .feed(
                "Tests run: 1, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 1 s",
                &mut Vec::new(),
            )
            .unwrap_err();
        assert_eq!(err, LineError::NoCurrentTest);
    }

    #[test]
    fn test_output_is_classified() {
        let mut p = in_test_output();
        let out = feed_all(
            &mut p,
            &["12:00 ERROR boom", "12:00 WARN hmm", "12:00 INFO ok", "plain"],
        );
        assert_eq!(
            out,
            vec![
                BuildEvent::error("12:00 ERROR boom"),
                BuildEvent::warning("12:00 WARN hmm"),
                BuildEvent::test_output("12:00 INFO ok", Severity::Info),
                BuildEvent::test_output("plain", Severity::Unknown),
            ]
        );
    }

    #[test]
    fn test_blank_line_disproved() {
        let mut p = in_test_output();
        let out = feed_all(&mut p, &["some output", "", "more output"]);
        assert_eq!(
            out,
            vec![
                BuildEvent::test_output("some output", Severity::Unknown),
                BuildEvent::test_output("", Severity::Unknown),
                BuildEvent::test_output("more output", Severity::Unknown),
            ]
        );
        assert_eq!(p.phase(), TestPhase::ParseTestOutput);
    }

    #[test]
    fn test_disproving_line_is_reprocessed() {
        let mut p = in_test_output();
        let out = feed_all(&mut p, &["", "", "Running com.example.BarTest"]);
        assert_eq!(
            out,
            vec![
                BuildEvent::test_output("", Severity::Unknown),
                BuildEvent::test_output("", Severity::Unknown),
                BuildEvent::TestStarted {
                    name: "com.example.BarTest".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_results_then_other_line_flushes_in_order() {
        let mut p = in_test_output();
        let out = feed_all(&mut p, &["", "Results :", "", "not a summary"]);
        let texts: Vec<String> = out.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            texts,
            vec!["#TOUT ", "#TOUT Results :", "#TOUT ", "#TOUT not a summary"]
        );
    }

    #[test]
    fn test_full_end_of_tests() {
        let mut p = in_test_output();
        let out = feed_all(
            &mut p,
            &[
                "",
                "Results :",
                "",
                "Tests run: 3, Failures: 0, Errors: 0, Skipped: 0",
                "",
                "[INFO] BUILD SUCCESS",
            ],
        );
        assert_eq!(
            out,
            vec![BuildEvent::TestsFinished {
                total: 3,
                failures: 0,
                errors: 0,
                skipped: 0
            }]
        );
        assert!(p.is_done());
    }

    #[test]
    fn test_failed_tests_listing() {
        let mut p = in_test_output();
        let out = feed_all(
            &mut p,
            &[
                "",
                "Results :",
                "",
                "Failed tests:   shouldFail(com.example.FooTest)",
                "  expected:<1> but was:<2>",
                "",
                "Tests run: 4, Failures: 1, Errors: 0, Skipped: 0",
                "",
                "[INFO] ------------------------------------------------------------------------",
            ],
        );
        assert_eq!(
            out,
            vec![
                BuildEvent::test_output("", Severity::Unknown),
                BuildEvent::test_output("Results :", Severity::Unknown),
                BuildEvent::test_output("", Severity::Unknown),
                BuildEvent::error("Failed tests:   shouldFail(com.example.FooTest)"),
                BuildEvent::error("  expected:<1> but was:<2>"),
                BuildEvent::error(""),
                BuildEvent::TestsFinished {
                    total: 4,
                    failures: 1,
                    errors: 0,
                    skipped: 0
                },
            ]
        );
    }

    #[test]
    fn test_unparsable_summary() {
        let mut p = in_test_output();
        feed_all(&mut p, &["", "Results :", "Tests run: lots"]);
        let err = p.feed("[INFO]", &mut Vec::new()).unwrap_err();
        assert_eq!(err, LineError::UnparsableTestSummary("Tests run: lots".to_string()));
    }

    #[test]
    fn test_feed_after_done_fails() {
        let mut p = parser();
        feed_all(&mut p, &["[INFO] No tests to run."]);
        let err = p.feed("[INFO] more", &mut Vec::new()).unwrap_err();
        assert_eq!(err, LineError::AfterEndOfTests("[INFO] more".to_string()));
    }

    #[test]
    fn test_abrupt_end_leaves_no_summary() {
        for lines in [
            &["", "Results :"][..],
            &["", "Results :", "Failed tests: x"][..],
            &["", "Results :", "Tests run: 1, Failures: 0, Errors: 0, Skipped: 0"][..],
        ] {
            let mut p = in_test_output();
            let out = feed_all(&mut p, lines);
            assert!(
                !out.iter().any(|e| matches!(e, BuildEvent::TestsFinished { .. })),
                "{lines:?}"
            );
            assert!(!p.is_done());
        }
    }
}
