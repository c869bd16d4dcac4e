//! Line sources feeding the parser.

use crate::error::TransportError;
use async_trait::async_trait;
use std::io::{self, BufRead, PipeReader};
use std::thread;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Capacity of the channel between the pipe reader and the parser loop.
const MERGE_CAPACITY: usize = 1024;

/// A stream of output lines.
///
/// Lines are decoded as UTF-8 with lossy substitution and have trailing
/// whitespace removed.
#[async_trait]
pub trait LineSource: Send {
    /// The next line, or `None` at end of stream.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Lines read from any buffered reader, e.g. a captured log file.
pub struct ReaderLines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R> ReaderLines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

#[async_trait]
impl<R> LineSource for ReaderLines<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        Ok(Some(decode(&self.buf)))
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

/// Merged stdout and stderr of a child process, read from the single pipe
/// both streams write into.
///
/// A dedicated thread does the blocking reads and hands lines over through a
/// bounded channel. Dropping the source stops the thread at its next line.
pub struct ProcessLines {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl ProcessLines {
    /// Start reading the pipe returned by [`crate::MavenCommand::spawn`].
    pub fn new(pipe: PipeReader) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::channel(MERGE_CAPACITY);
        thread::Builder::new()
            .name("mavlog-output".to_string())
            .spawn(move || pump(pipe, tx))
            .map_err(TransportError::Pipe)?;
        Ok(Self { rx })
    }
}

#[async_trait]
impl LineSource for ProcessLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.rx.recv().await {
            Some(line) => line.map(Some),
            None => Ok(None),
        }
    }
}

fn pump(pipe: PipeReader, tx: mpsc::Sender<io::Result<String>>) {
    let mut reader = io::BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let item = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => Ok(decode(&buf)),
            Err(err) => Err(err),
        };
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() || failed {
            break;
        }
    }
}
