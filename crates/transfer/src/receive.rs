//! Receiver-side transfer engine.
//!
//! Consumes the channel's inbound event stream and reassembles files.
//! The protocol is strictly sequential — one `meta`, N binary chunks,
//! one `done` — so at most one session is open at a time. A second
//! `meta` before `done` is reported as a protocol violation (rather
//! than silently dropped) and then replaces the session, since the
//! stale partial data can never be completed.

use std::time::Instant;

use droplink_channel::ChannelEvent;
use droplink_protocol::{ControlMessage, TransferMeta};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::progress::ProgressUpdate;

/// The fully reassembled file product, handed off for user-facing
/// save/download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Name declared by the sender.
    pub name: String,
    /// Content-type label declared by the sender.
    pub mime_type: String,
    /// Byte length declared in `meta`. Equals `data.len()` unless the
    /// sender under-delivered before `done`.
    pub declared_size: u64,
    /// The reassembled bytes, in arrival order.
    pub data: Vec<u8>,
}

/// Outbound notifications to the UI/delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// A chunk arrived for the file in flight.
    Progress(ProgressUpdate),
    /// A file completed and was assembled.
    Artifact(Artifact),
    /// The sender aborted the file in flight; its partial data was
    /// discarded.
    Cancelled { name: String },
    /// The peer deviated from the wire protocol.
    Violation(String),
    /// The channel closed; any in-flight partial data was discarded.
    Closed,
}

/// Accumulator for the file currently being received.
struct ReceiveSession {
    meta: TransferMeta,
    /// Received chunks in arrival order; released on finalization.
    buffers: Vec<Vec<u8>>,
    received: u64,
    started: Instant,
}

/// Reassembles files from a channel's inbound events.
pub struct ReceiveEngine {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    out: mpsc::UnboundedSender<ReceiveEvent>,
    session: Option<ReceiveSession>,
}

impl ReceiveEngine {
    /// Creates an engine consuming `events` and reporting on `out`.
    pub fn new(
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        out: mpsc::UnboundedSender<ReceiveEvent>,
    ) -> Self {
        Self {
            events,
            out,
            session: None,
        }
    }

    /// Processes events until the channel closes or the stream ends.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            match event {
                ChannelEvent::Text(text) => self.on_control(&text),
                ChannelEvent::Binary(data) => self.on_chunk(data),
                ChannelEvent::Closed => {
                    self.on_closed("channel closed");
                    return;
                }
                ChannelEvent::Error(reason) => {
                    self.on_closed(&reason);
                    return;
                }
            }
        }
    }

    fn on_control(&mut self, text: &str) {
        let msg = match ControlMessage::from_json(text) {
            Ok(msg) => msg,
            Err(err) => {
                self.violation(format!("unparseable control frame: {err}"));
                return;
            }
        };

        match msg {
            ControlMessage::Meta(meta) => {
                if let Some(open) = self.session.take() {
                    self.violation(format!(
                        "meta for '{}' while '{}' is open, discarding {} partial bytes",
                        meta.name, open.meta.name, open.received
                    ));
                }
                info!(file = %meta.name, size = meta.size, "receive session opened");
                self.session = Some(ReceiveSession {
                    meta,
                    buffers: Vec::new(),
                    received: 0,
                    started: Instant::now(),
                });
                // Zero-byte files complete without any chunks.
                self.maybe_finalize();
            }
            ControlMessage::Done => {
                if self.session.is_some() {
                    self.finalize();
                } else {
                    // Already finalized via the byte-count path.
                    debug!("done with no open session");
                }
            }
            ControlMessage::Cancel => match self.session.take() {
                Some(session) => {
                    info!(file = %session.meta.name, "transfer cancelled by sender");
                    let _ = self.out.send(ReceiveEvent::Cancelled {
                        name: session.meta.name,
                    });
                }
                None => debug!("cancel with no open session"),
            },
            ControlMessage::Ping => debug!("ping"),
        }
    }

    fn on_chunk(&mut self, mut data: Vec<u8>) {
        let Some(session) = self.session.as_mut() else {
            self.violation(format!(
                "binary chunk of {} bytes with no open session",
                data.len()
            ));
            return;
        };

        // No checksum exists to adjudicate excess bytes; truncate to the
        // declared size and flag it.
        let capacity = session.meta.size.saturating_sub(session.received);
        let excess = (data.len() as u64).saturating_sub(capacity);
        if excess > 0 {
            data.truncate(capacity as usize);
        }

        session.received += data.len() as u64;
        if !data.is_empty() {
            session.buffers.push(data);
        }
        let update = ProgressUpdate {
            name: session.meta.name.clone(),
            bytes_transferred: session.received,
            total_bytes: session.meta.size,
            elapsed: session.started.elapsed(),
        };

        if excess > 0 {
            self.violation(format!("{excess} bytes beyond declared size truncated"));
        }
        let _ = self.out.send(ReceiveEvent::Progress(update));
        self.maybe_finalize();
    }

    fn maybe_finalize(&mut self) {
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.received >= s.meta.size)
        {
            self.finalize();
        }
    }

    /// Assembles the artifact and releases the session's buffers.
    ///
    /// Idempotent against the byte-count completion path: once the
    /// session is taken, a following `done` is a no-op.
    fn finalize(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let mut data = Vec::with_capacity(session.received as usize);
        for buffer in session.buffers {
            data.extend_from_slice(&buffer);
        }
        info!(file = %session.meta.name, bytes = data.len(), "artifact assembled");
        let _ = self.out.send(ReceiveEvent::Artifact(Artifact {
            name: session.meta.name,
            mime_type: session.meta.mime_type,
            declared_size: session.meta.size,
            data,
        }));
    }

    fn on_closed(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            warn!(
                file = %session.meta.name,
                reason,
                "channel died mid-transfer, discarding partial data"
            );
        }
        let _ = self.out.send(ReceiveEvent::Closed);
    }

    fn violation(&mut self, detail: String) {
        warn!(%detail, "protocol violation");
        let _ = self.out.send(ReceiveEvent::Violation(detail));
    }
}
