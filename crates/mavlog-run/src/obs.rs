//! Structured observability hooks for build runs.
//!
//! Every run gets a `mavlog.run` span carrying its run id. Lifecycle events
//! are logged at `info!`, anomalies at `warn!`.

use std::path::Path;
use std::time::Duration;
use tracing::{info, info_span, warn, Span};

/// Span tagged with the run id. Attach it to the run future with
/// [`tracing::Instrument`].
pub fn run_span(run_id: &str) -> Span {
    info_span!("mavlog.run", run_id = %run_id)
}

/// Emit event: Maven process started.
pub fn emit_run_started(project_dir: &Path, command_line: &[String]) {
    info!(
        event = "run.started",
        version = mavlog_core::VERSION,
        project = %project_dir.display(),
        command = %command_line.join(" "),
    );
}

/// Emit event: run finished with exit code, event count and duration.
pub fn emit_run_finished(exit_code: i32, event_count: u64, duration_ms: u64, success: bool) {
    info!(
        event = "run.finished",
        exit_code = exit_code,
        event_count = event_count,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: Maven could not be started.
pub fn emit_spawn_failed(error: &dyn std::fmt::Display) {
    warn!(event = "run.spawn_failed", error = %error);
}

/// Emit event: the parser gave up on a line.
pub fn emit_parse_aborted(error: &dyn std::fmt::Display) {
    warn!(event = "run.parse_aborted", error = %error);
}

/// Emit event: the raw output capture could not be written.
pub fn emit_capture_failed(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "run.capture_failed", path = %path.display(), error = %error);
}

/// Emit event: the process did not exit after its output ended.
pub fn emit_exit_timeout(timeout: Duration) {
    warn!(
        event = "run.exit_timeout",
        timeout_ms = timeout.as_millis() as u64
    );
}
