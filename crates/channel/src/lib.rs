//! Duplex message channel abstraction for droplink transfers.
//!
//! The transfer engines do not open connections themselves; the
//! connection-bootstrap layer hands them an already-open, ordered,
//! reliable, message-oriented channel. This crate defines that contract
//! ([`TransferChannel`]) and the single inbound event stream
//! ([`ChannelEvent`]) the receive side consumes, plus an in-memory
//! channel pair used by tests.
//!
//! The send buffer is the one piece of shared state between the engine
//! and the transport: `buffered_bytes` reports how much data has been
//! accepted but not yet handed to the wire, and [`drain_signal`]
//! (parameterized by [`set_low_water_mark`]) notifies when it falls back
//! to an acceptable level.
//!
//! [`drain_signal`]: TransferChannel::drain_signal
//! [`set_low_water_mark`]: TransferChannel::set_low_water_mark

pub mod error;
pub mod memory;

pub use error::ChannelError;
pub use memory::MemoryChannel;

use std::sync::Arc;

use tokio::sync::Notify;

/// One inbound message or lifecycle notification from the channel.
///
/// Arrival order is preserved: a binary frame is never observed out of
/// order relative to the control frames bracketing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A textual control frame.
    Text(String),
    /// A raw binary chunk.
    Binary(Vec<u8>),
    /// The channel closed.
    Closed,
    /// The channel failed with the given reason.
    Error(String),
}

/// An open, ordered, reliable, message-oriented duplex channel.
///
/// Implementations must deliver messages to the peer in send order and
/// fail sends with [`ChannelError::Closed`] once the channel is no
/// longer open.
pub trait TransferChannel: Send + Sync {
    /// Sends a textual control frame.
    fn send_text(&self, text: &str) -> Result<(), ChannelError>;

    /// Sends one binary chunk.
    fn send_binary(&self, data: Vec<u8>) -> Result<(), ChannelError>;

    /// Bytes accepted by `send_*` but not yet handed to the transport.
    fn buffered_bytes(&self) -> u64;

    /// Sets the threshold below which [`drain_signal`](Self::drain_signal)
    /// fires.
    fn set_low_water_mark(&self, bytes: u64);

    /// Notified each time `buffered_bytes` drops to or below the
    /// low-water mark. Waiters must re-check `buffered_bytes` after
    /// waking; the signal carries no payload.
    fn drain_signal(&self) -> Arc<Notify>;

    /// Whether the channel is still open for sending.
    fn is_open(&self) -> bool;
}
