//! Sender-side transfer engine.
//!
//! Drives the queue sequentially: for each file, announce `meta`, push
//! chunks through the flow controller, then announce `done`. Pause,
//! resume, and cancel are cooperative — the loop checks them at every
//! iteration boundary, never mid-send.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use droplink_channel::TransferChannel;
use droplink_protocol::ControlMessage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunk::ChunkReader;
use crate::flow::FlowController;
use crate::progress::ProgressUpdate;
use crate::queue::{FileStatus, QueueModel};
use crate::{DEFAULT_CHUNK_SIZE, PAUSE_POLL_INTERVAL, TransferError, YIELD_EVERY_CHUNKS};

/// Remote control for a running [`SendEngine`].
///
/// Pausing is a purely local suspension of the chunk loop; nothing is
/// closed or renegotiated, and resume continues from the exact offset
/// already reached. Cancelling halts queue processing after the
/// current iteration.
#[derive(Debug, Clone)]
pub struct SendHandle {
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl SendHandle {
    /// Suspends the chunk loop before the next chunk.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resumes a paused transfer from its current offset.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Cancels the current file and halts the queue.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Sends a queue of files over a channel, one at a time.
pub struct SendEngine<C: TransferChannel> {
    channel: C,
    queue: QueueModel,
    flow: FlowController,
    chunk_size: usize,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    progress_tx: mpsc::Sender<ProgressUpdate>,
}

impl<C: TransferChannel> SendEngine<C> {
    /// Creates an engine with the default flow controller and chunk
    /// size.
    ///
    /// Progress samples are delivered on `progress_tx` without
    /// blocking; a full channel drops samples.
    pub fn new(channel: C, queue: QueueModel, progress_tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self::with_config(
            channel,
            queue,
            progress_tx,
            FlowController::default(),
            DEFAULT_CHUNK_SIZE,
        )
    }

    /// Creates an engine with explicit flow-control marks and chunk
    /// size.
    pub fn with_config(
        channel: C,
        queue: QueueModel,
        progress_tx: mpsc::Sender<ProgressUpdate>,
        flow: FlowController,
        chunk_size: usize,
    ) -> Self {
        Self {
            channel,
            queue,
            flow,
            chunk_size,
            paused: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            progress_tx,
        }
    }

    /// Returns a handle for pause/resume/cancel.
    pub fn handle(&self) -> SendHandle {
        SendHandle {
            paused: Arc::clone(&self.paused),
            cancel: self.cancel.clone(),
        }
    }

    pub fn queue(&self) -> &QueueModel {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut QueueModel {
        &mut self.queue
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Transfers every pending file in queue order.
    ///
    /// A read failure marks the file `Error` and advances; a channel
    /// failure marks the file `Error` and aborts the remaining queue
    /// (the channel is presumed broken). Cancellation emits the
    /// `cancel` control message, marks the current file `Error`, and
    /// halts without advancing.
    pub async fn run(&mut self) -> Result<(), TransferError> {
        self.channel.set_low_water_mark(self.flow.low_water());

        while let Some(index) = self.queue.next_pending() {
            let name = self.queue.entries()[index].name.clone();
            match self.send_file(index).await {
                Ok(()) => {
                    self.queue.set_status(index, FileStatus::Done);
                    info!(file = %name, "file sent");
                }
                Err(TransferError::Read(err)) => {
                    warn!(file = %name, error = %err, "read failed, skipping file");
                    self.queue.set_status(index, FileStatus::Error);
                }
                Err(TransferError::Cancelled) => {
                    // Best-effort notice; the channel may already be gone.
                    let _ = self.send_control(&ControlMessage::Cancel);
                    self.queue.set_status(index, FileStatus::Error);
                    info!(file = %name, "transfer cancelled");
                    return Err(TransferError::Cancelled);
                }
                Err(err) => {
                    self.queue.set_status(index, FileStatus::Error);
                    warn!(file = %name, error = %err, "channel failure, aborting queue");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn send_file(&mut self, index: usize) -> Result<(), TransferError> {
        let entry = &self.queue.entries()[index];
        let (path, name, size) = (entry.path.clone(), entry.name.clone(), entry.size);
        let meta = entry.meta();

        self.queue.set_status(index, FileStatus::Active);
        self.send_control(&ControlMessage::Meta(meta))?;
        debug!(file = %name, size, "meta sent");

        let mut reader = ChunkReader::open(&path, self.chunk_size).await?;
        let started = Instant::now();
        let mut offset: u64 = 0;
        let mut chunks_sent: u32 = 0;

        while offset < size {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            if !self.channel.is_open() {
                return Err(TransferError::ChannelClosed);
            }
            self.wait_while_paused(index).await?;

            if self.flow.should_pause(&self.channel) {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        return Err(TransferError::Cancelled);
                    }
                    _ = self.flow.await_drain(&self.channel) => {}
                }
                if !self.channel.is_open() {
                    return Err(TransferError::ChannelClosed);
                }
            }

            let mut chunk = reader.next_chunk().await?.ok_or_else(|| {
                TransferError::Read(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "file shorter than its declared size",
                ))
            })?;
            // The declared size is the contract with the receiver; if the
            // file grew after queueing, never send past it.
            let capacity = (size - offset) as usize;
            if chunk.len() > capacity {
                chunk.truncate(capacity);
            }
            let len = chunk.len() as u64;
            self.channel.send_binary(chunk)?;
            offset += len;
            chunks_sent += 1;

            let _ = self.progress_tx.try_send(ProgressUpdate {
                name: name.clone(),
                bytes_transferred: offset,
                total_bytes: size,
                elapsed: started.elapsed(),
            });

            if chunks_sent % YIELD_EVERY_CHUNKS == 0 {
                tokio::task::yield_now().await;
            }
        }

        self.send_control(&ControlMessage::Done)?;
        Ok(())
    }

    async fn wait_while_paused(&mut self, index: usize) -> Result<(), TransferError> {
        if !self.paused.load(Ordering::Acquire) {
            return Ok(());
        }
        self.queue.set_status(index, FileStatus::Paused);
        debug!("send loop paused");
        while self.paused.load(Ordering::Acquire) {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }
        self.queue.set_status(index, FileStatus::Active);
        debug!("send loop resumed");
        Ok(())
    }

    fn send_control(&self, msg: &ControlMessage) -> Result<(), TransferError> {
        self.channel.send_text(&msg.to_json()?)?;
        Ok(())
    }
}
