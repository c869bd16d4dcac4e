//! The driving loop: start Maven, feed its output to the parser, report
//! the exit code.

use crate::capture::{Capture, RawCapture};
use crate::command::MavenCommand;
use crate::obs;
use crate::sink::ChannelSink;
use crate::source::{LineSource, ProcessLines};
use anyhow::Context;
use chrono::{DateTime, Utc};
use mavlog_core::{BuildEvent, BuildOutputParser, ClassificationStrategy, EventSink};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{trace, Instrument};
use uuid::Uuid;

/// How long to wait for Maven to exit once its output has ended.
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code reported when the process did not start or did not exit.
pub const ABNORMAL_EXIT_CODE: i32 = -1;

pub const EXIT_TIMEOUT_MESSAGE: &str = "Timeout waiting for Maven process to finish";

/// What the driving loop saw while feeding the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    /// Lines read from the source.
    pub lines: u64,

    /// Events delivered to the sink, lifecycle events included.
    pub event_count: u64,

    /// Message of the fatal parse error, if parsing aborted.
    pub parse_error: Option<String>,

    /// Token of the last `-rf` hint, for resuming the build.
    pub resume_hint: Option<String>,
}

/// Result of one Maven run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,

    pub exit_code: i32,

    pub started_at: DateTime<Utc>,

    pub duration_ms: u64,

    #[serde(flatten)]
    pub summary: ParseSummary,

    /// Raw output file written during the run, if capture was on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_path: Option<PathBuf>,
}

impl RunOutcome {
    /// Maven exited with 0 and its output parsed cleanly.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.summary.parse_error.is_none()
    }
}

/// Sink wrapper that keeps the [`ParseSummary`] counters.
struct Tally<'a, S: ?Sized> {
    inner: &'a mut S,
    summary: ParseSummary,
}

impl<'a, S: EventSink + ?Sized> Tally<'a, S> {
    fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            summary: ParseSummary::default(),
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Tally<'_, S> {
    fn emit(&mut self, event: BuildEvent) {
        self.summary.event_count += 1;
        if let BuildEvent::ResumeHintDetected { token } = &event {
            self.summary.resume_hint = Some(token.clone());
        }
        self.inner.emit(event);
    }
}

/// Runs Maven builds with a fixed classification strategy.
#[derive(Debug, Clone)]
pub struct BuildRunner {
    strategy: Arc<ClassificationStrategy>,
    exit_timeout: Duration,
    capture: Capture,
}

impl BuildRunner {
    pub fn new(strategy: Arc<ClassificationStrategy>) -> Self {
        Self {
            strategy,
            exit_timeout: DEFAULT_EXIT_TIMEOUT,
            capture: Capture::Off,
        }
    }

    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    /// Keep a raw copy of every output line for later replay.
    pub fn with_capture(mut self, capture: Capture) -> Self {
        self.capture = capture;
        self
    }

    /// Run one build, delivering events to `sink`.
    ///
    /// Transport and parse failures are reported as `Error` events; the
    /// stream always ends with `ProcessFinished`.
    pub async fn run<S>(&self, command: &MavenCommand, sink: &mut S) -> RunOutcome
    where
        S: EventSink + Send + ?Sized,
    {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        async move {
            let started_at = Utc::now();
            let start = Instant::now();
            let mut tally = Tally::new(sink);
            let (exit_code, capture_path) = self.execute(command, &run_id, &mut tally).await;

            let outcome = RunOutcome {
                run_id,
                exit_code,
                started_at,
                duration_ms: start.elapsed().as_millis() as u64,
                summary: tally.summary,
                capture_path,
            };
            obs::emit_run_finished(
                outcome.exit_code,
                outcome.summary.event_count,
                outcome.duration_ms,
                outcome.success(),
            );
            outcome
        }
        .instrument(span)
        .await
    }

    /// Run one build on a new task. Events arrive on the returned receiver.
    pub fn spawn(
        &self,
        command: MavenCommand,
    ) -> (JoinHandle<RunOutcome>, mpsc::UnboundedReceiver<BuildEvent>) {
        let (mut sink, rx) = ChannelSink::new();
        let runner = self.clone();
        let handle = tokio::spawn(async move { runner.run(&command, &mut sink).await });
        (handle, rx)
    }

    async fn execute<S>(
        &self,
        command: &MavenCommand,
        run_id: &str,
        sink: &mut Tally<'_, S>,
    ) -> (i32, Option<PathBuf>)
    where
        S: EventSink + Send + ?Sized,
    {
        let (mut child, output) = match command.spawn() {
            Ok(spawned) => spawned,
            Err(err) => {
                obs::emit_spawn_failed(&err);
                sink.emit(BuildEvent::error(err.to_string()));
                sink.emit(BuildEvent::ProcessFinished {
                    exit_code: ABNORMAL_EXIT_CODE,
                });
                return (ABNORMAL_EXIT_CODE, None);
            }
        };

        let command_line = command.command_line();
        obs::emit_run_started(command.project_dir(), &command_line);
        sink.emit(BuildEvent::ProcessStarted {
            working_dir: command.project_dir.clone(),
            args: command_line,
        });

        let mut capture = self.open_capture(run_id).await;
        match ProcessLines::new(output) {
            Ok(mut lines) => {
                let mut parser = BuildOutputParser::new(self.strategy.clone());
                if let Err(err) = drive(&mut lines, &mut parser, sink, capture.as_mut()).await {
                    sink.emit(BuildEvent::error(format!("Error reading Maven output: {err}")));
                }
            }
            Err(err) => sink.emit(BuildEvent::error(err.to_string())),
        }
        let capture_path = match capture {
            Some(capture) => capture.finish().await,
            None => None,
        };

        let exit_code = self.wait(&mut child, sink).await;
        sink.emit(BuildEvent::ProcessFinished { exit_code });
        (exit_code, capture_path)
    }

    async fn open_capture(&self, run_id: &str) -> Option<RawCapture> {
        let path = self.capture.path_for(run_id)?;
        match RawCapture::create(&path).await {
            Ok(capture) => Some(capture),
            Err(err) => {
                obs::emit_capture_failed(&path, &err);
                None
            }
        }
    }

    async fn wait<S>(&self, child: &mut Child, sink: &mut Tally<'_, S>) -> i32
    where
        S: EventSink + Send + ?Sized,
    {
        match tokio::time::timeout(self.exit_timeout, child.wait()).await {
            Ok(Ok(status)) => status.code().unwrap_or(ABNORMAL_EXIT_CODE),
            Ok(Err(err)) => {
                sink.emit(BuildEvent::error(format!(
                    "Error waiting for Maven process: {err}"
                )));
                ABNORMAL_EXIT_CODE
            }
            Err(_) => {
                obs::emit_exit_timeout(self.exit_timeout);
                sink.emit(BuildEvent::error(EXIT_TIMEOUT_MESSAGE));
                child.start_kill().ok();
                ABNORMAL_EXIT_CODE
            }
        }
    }
}

/// Parse a captured log without running Maven.
pub async fn replay<L, S>(
    source: &mut L,
    strategy: Arc<ClassificationStrategy>,
    sink: &mut S,
) -> anyhow::Result<ParseSummary>
where
    L: LineSource + ?Sized,
    S: EventSink + Send + ?Sized,
{
    let mut parser = BuildOutputParser::new(strategy);
    let mut tally = Tally::new(sink);
    drive(source, &mut parser, &mut tally, None)
        .await
        .context("reading captured build output")?;
    Ok(tally.summary)
}

/// Feed every line of `source` to the parser, copying it to `capture`
/// first. After a parse failure the rest of the stream is still captured
/// but no longer parsed, so the producer never blocks on a full pipe.
async fn drive<L, S>(
    source: &mut L,
    parser: &mut BuildOutputParser,
    sink: &mut Tally<'_, S>,
    mut capture: Option<&mut RawCapture>,
) -> std::io::Result<()>
where
    L: LineSource + ?Sized,
    S: EventSink + Send + ?Sized,
{
    while let Some(line) = source.next_line().await? {
        sink.summary.lines += 1;
        trace!(line = %line, "output");
        if let Some(capture) = capture.as_deref_mut() {
            capture.write_line(&line).await;
        }
        if parser.is_failed() {
            continue;
        }
        if let Err(err) = parser.feed_into(&line, sink) {
            obs::emit_parse_aborted(&err);
            let message = err.to_string();
            sink.emit(BuildEvent::error(message.clone()));
            sink.summary.parse_error = Some(message);
        }
    }
    Ok(())
}
