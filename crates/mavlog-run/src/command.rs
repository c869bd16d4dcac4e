//! Maven command-line assembly.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::io::{self, PipeReader};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Options appended to every invocation so the output is parseable.
pub const MAVEN_TRAILER: [&str; 3] = ["-Dfile.encoding=UTF-8", "--show-version", "--batch-mode"];

/// Name of the Maven launcher on this platform.
pub fn default_executable() -> &'static str {
    if cfg!(windows) {
        "mvn.cmd"
    } else {
        "mvn"
    }
}

/// Entries of `PATH`, reported when Maven cannot be started.
pub fn search_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|raw| std::env::split_paths(&raw).collect())
        .unwrap_or_default()
}

/// Which part of a multi-module build to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", content = "module", rename_all = "snake_case")]
pub enum StartOption {
    /// Build everything.
    #[default]
    All,
    /// `--resume-from <module>`
    ResumeFrom(String),
    /// `--projects <module>`
    BuildOnly(String),
    /// `--also-make --projects <module>`
    BuildUpTo(String),
}

impl StartOption {
    /// Resume a failed build from the module named in its `-rf` hint.
    pub fn from_resume_hint(token: &str) -> Self {
        StartOption::ResumeFrom(token.to_string())
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            StartOption::All => Vec::new(),
            StartOption::ResumeFrom(module) => vec!["--resume-from".to_string(), module.clone()],
            StartOption::BuildOnly(module) => vec!["--projects".to_string(), module.clone()],
            StartOption::BuildUpTo(module) => vec![
                "--also-make".to_string(),
                "--projects".to_string(),
                module.clone(),
            ],
        }
    }
}

/// A Maven invocation in one project directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MavenCommand {
    /// Working directory of the build.
    pub project_dir: PathBuf,

    /// Launcher, `mvn` unless overridden.
    pub executable: String,

    pub start: StartOption,

    /// Goals and phases, e.g. `clean install`.
    pub goals: Vec<String>,

    /// Extra command-line options passed through verbatim.
    pub options: Vec<String>,

    /// Add `-DskipTests`.
    pub skip_tests: bool,
}

impl MavenCommand {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            executable: default_executable().to_string(),
            start: StartOption::All,
            goals: Vec::new(),
            options: Vec::new(),
            skip_tests: false,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_start(mut self, start: StartOption) -> Self {
        self.start = start;
        self
    }

    pub fn with_goals<I, T>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.goals = goals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options<I, T>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn skip_tests(mut self, skip: bool) -> Self {
        self.skip_tests = skip;
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Arguments after the executable.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.start.args();
        args.extend(self.goals.iter().cloned());
        args.extend(self.options.iter().cloned());
        if self.skip_tests {
            args.push("-DskipTests".to_string());
        }
        args.extend(MAVEN_TRAILER.iter().map(|s| s.to_string()));
        args
    }

    /// Executable followed by [`MavenCommand::args`].
    pub fn command_line(&self) -> Vec<String> {
        let mut line = vec![self.executable.clone()];
        line.extend(self.args());
        line
    }

    /// Start the process with stdin closed and stdout and stderr both
    /// writing into one pipe, so lines keep the order the process wrote
    /// them in. Returns the child and the read end of that pipe.
    pub fn spawn(&self) -> Result<(Child, PipeReader), TransportError> {
        let (output, stdout) = io::pipe().map_err(TransportError::Pipe)?;
        let stderr = stdout.try_clone().map_err(TransportError::Pipe)?;

        // The command owns the write ends; dropping it at the end of this
        // statement leaves the child as the only writer.
        let child = Command::new(&self.executable)
            .args(self.args())
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                command_line: self.command_line(),
                search_path: search_path(),
                source,
            })?;
        Ok((child, output))
    }
}
