//! Chunked file transfer engine with flow control.
//!
//! Streams arbitrarily large files across a message-oriented channel
//! while keeping sender-side memory bounded: at most one chunk is held
//! in memory per read, and the [`FlowController`] suspends the send
//! loop whenever the channel's outbound buffer exceeds the high-water
//! mark. Transfers are strictly sequential per engine — the wire
//! protocol has no per-chunk file identifier, so chunks belong to
//! whatever file the most recent `meta` announced.
//!
//! Everything runs on one cooperative task per role; suspension points
//! are chunk reads, the drain wait, the pause poll, and a periodic
//! voluntary yield.

pub mod chunk;
pub mod flow;
pub mod progress;
pub mod queue;
pub mod receive;
pub mod send;

pub use chunk::ChunkReader;
pub use flow::FlowController;
pub use progress::{ProgressUpdate, SpeedCalculator};
pub use queue::{FileEntry, FileStatus, QueueModel};
pub use receive::{Artifact, ReceiveEngine, ReceiveEvent};
pub use send::{SendEngine, SendHandle};

use std::time::Duration;

use droplink_channel::ChannelError;

/// Default chunk size: 256 KiB.
///
/// Larger chunks reduce per-chunk overhead (syscalls, control-loop
/// iterations) at the cost of memory headroom per read.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Send-buffer level above which the sender pauses: 16 MiB.
///
/// Kept at 64× the default chunk size so the loop does not thrash
/// between pause and resume on every chunk. Matches the outbound
/// buffer ceiling common to browser data channels.
pub const HIGH_WATER_MARK: u64 = 16 * 1024 * 1024;

/// Send-buffer level at which a paused sender resumes: 1 MiB.
pub const LOW_WATER_MARK: u64 = 1024 * 1024;

/// Poll interval while paused (there is no external event to wait on).
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Fallback poll interval while waiting for the drain signal, for
/// channels that never fire it.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The send loop yields to the scheduler every this many chunks so the
/// host event loop is not starved. A scheduling courtesy, not a
/// correctness requirement.
pub const YIELD_EVERY_CHUNKS: u32 = 16;

/// Errors produced by the transfer engines.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The local file could not be read. Fatal to the current file
    /// only; the queue advances.
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),

    /// The channel rejected a send. Fatal to the whole queue: the
    /// channel is presumed broken.
    #[error("channel send failed: {0}")]
    ChannelSend(ChannelError),

    /// The channel closed mid-transfer. Fatal to the whole queue.
    #[error("channel closed mid-transfer")]
    ChannelClosed,

    /// User-initiated cancellation. A terminal outcome for the current
    /// file, not a failure.
    #[error("cancelled")]
    Cancelled,

    /// A control message could not be encoded.
    #[error("control message encoding: {0}")]
    Encode(#[from] serde_json::Error),

    /// The peer violated the wire protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl From<ChannelError> for TransferError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => TransferError::ChannelClosed,
            other => TransferError::ChannelSend(other),
        }
    }
}
