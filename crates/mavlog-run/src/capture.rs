//! Raw copy of a run's output, kept for diagnosing parse failures.
//!
//! The file holds every line exactly as it was fed to the parser, one per
//! line, so `mavlog parse` can replay it into the same event stream.

use crate::obs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Where a run writes its raw output, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Capture {
    #[default]
    Off,
    /// `mavlog-<run_id>.log` under [`default_capture_dir`].
    TempDir,
    File(PathBuf),
}

impl Capture {
    /// File this run should write, `None` when capture is off.
    pub fn path_for(&self, run_id: &str) -> Option<PathBuf> {
        match self {
            Capture::Off => None,
            Capture::TempDir => Some(default_capture_dir().join(format!("mavlog-{run_id}.log"))),
            Capture::File(path) => Some(path.clone()),
        }
    }
}

/// `mavlog` under the system temp directory.
pub fn default_capture_dir() -> PathBuf {
    std::env::temp_dir().join("mavlog")
}

/// Open capture file. A write error is logged once and turns the capture
/// off for the rest of the run; it never stops the build.
pub struct RawCapture {
    path: PathBuf,
    writer: BufWriter<File>,
    failed: bool,
}

impl RawCapture {
    /// Create (or truncate) the file, creating missing parent directories.
    pub async fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            failed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_line(&mut self, line: &str) {
        if self.failed {
            return;
        }
        let written = match self.writer.write_all(line.as_bytes()).await {
            Ok(()) => self.writer.write_all(b"\n").await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            obs::emit_capture_failed(&self.path, &err);
            self.failed = true;
        }
    }

    /// Flush the file. Returns its path unless writing failed.
    pub async fn finish(mut self) -> Option<PathBuf> {
        if self.failed {
            return None;
        }
        match self.writer.flush().await {
            Ok(()) => Some(self.path),
            Err(err) => {
                obs::emit_capture_failed(&self.path, &err);
                None
            }
        }
    }
}
