//! Transport failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The executable could not be started, usually because it is not on `PATH`.
    #[error(
        "Unable to start process: {command_line:?}\nIs Maven on the path?\n{}",
        join_paths(.search_path)
    )]
    Spawn {
        command_line: Vec<String>,
        search_path: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// The output pipe or its reader thread could not be set up.
    #[error("failed to set up the output pipe: {0}")]
    Pipe(#[source] std::io::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
