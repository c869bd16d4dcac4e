//! Queued hand-off of events to another task.

use mavlog_core::{BuildEvent, EventSink};
use tokio::sync::mpsc;
use tracing::trace;

/// Sends every event over an unbounded channel so the parser loop never
/// waits on the consumer.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BuildEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BuildEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: BuildEvent) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}
