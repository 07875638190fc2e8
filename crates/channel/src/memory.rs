//! In-memory channel pair.
//!
//! Two connected endpoints delivering frames in order over unbounded
//! queues. Used by the engine tests and by local loopback demos. By
//! default the simulated send buffer drains instantly; the
//! backpressure variant accumulates sent bytes until the test calls
//! [`MemoryChannel::drain`], which models a transport flushing data to
//! the wire.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Notify, mpsc};
use tracing::debug;

use crate::{ChannelError, ChannelEvent, TransferChannel};

/// One endpoint of an in-memory channel pair.
pub struct MemoryChannel {
    peer: mpsc::UnboundedSender<ChannelEvent>,
    open: Arc<AtomicBool>,
    buffered: AtomicU64,
    low_water: AtomicU64,
    drain: Arc<Notify>,
    auto_drain: bool,
}

/// An endpoint plus the stream of events arriving from its peer.
pub type Endpoint = (MemoryChannel, mpsc::UnboundedReceiver<ChannelEvent>);

impl MemoryChannel {
    /// Creates a connected pair whose send buffers drain instantly
    /// (`buffered_bytes` stays 0).
    pub fn pair() -> (Endpoint, Endpoint) {
        Self::pair_inner(true)
    }

    /// Creates a connected pair with a simulated send buffer: sent bytes
    /// accumulate until [`drain`](Self::drain) is called.
    pub fn pair_with_backpressure() -> (Endpoint, Endpoint) {
        Self::pair_inner(false)
    }

    fn pair_inner(auto_drain: bool) -> (Endpoint, Endpoint) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        let a = Self::new(b_tx, Arc::clone(&open), auto_drain);
        let b = Self::new(a_tx, open, auto_drain);
        ((a, a_rx), (b, b_rx))
    }

    fn new(peer: mpsc::UnboundedSender<ChannelEvent>, open: Arc<AtomicBool>, auto_drain: bool) -> Self {
        Self {
            peer,
            open,
            buffered: AtomicU64::new(0),
            low_water: AtomicU64::new(0),
            drain: Arc::new(Notify::new()),
            auto_drain,
        }
    }

    /// Simulates the transport flushing `bytes` from the send buffer.
    ///
    /// Fires the drain signal when the buffer crosses the low-water mark.
    pub fn drain(&self, bytes: u64) {
        let remaining = self
            .buffered
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                Some(b.saturating_sub(bytes))
            })
            .unwrap_or(0)
            .saturating_sub(bytes);

        if remaining <= self.low_water.load(Ordering::Acquire) {
            self.drain.notify_waiters();
        }
    }

    /// Closes the channel from this side.
    ///
    /// The peer observes [`ChannelEvent::Closed`]; further sends on
    /// either endpoint fail. Drain waiters are woken so a stalled
    /// sender can observe the closure.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("memory channel closed");
            let _ = self.peer.send(ChannelEvent::Closed);
            self.drain.notify_waiters();
        }
    }

    fn deliver(&self, event: ChannelEvent) -> Result<(), ChannelError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }
        self.peer.send(event).map_err(|_| {
            // Peer dropped its receiver: the channel is effectively dead.
            self.open.store(false, Ordering::Release);
            ChannelError::Closed
        })
    }
}

impl TransferChannel for MemoryChannel {
    fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.deliver(ChannelEvent::Text(text.to_owned()))
    }

    fn send_binary(&self, data: Vec<u8>) -> Result<(), ChannelError> {
        let len = data.len() as u64;
        self.deliver(ChannelEvent::Binary(data))?;
        if !self.auto_drain {
            self.buffered.fetch_add(len, Ordering::AcqRel);
        }
        Ok(())
    }

    fn buffered_bytes(&self) -> u64 {
        self.buffered.load(Ordering::Acquire)
    }

    fn set_low_water_mark(&self, bytes: u64) {
        self.low_water.store(bytes, Ordering::Release);
    }

    fn drain_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.drain)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_frames_in_order() {
        let ((a, _a_rx), (_b, mut b_rx)) = MemoryChannel::pair();

        a.send_text("first").unwrap();
        a.send_binary(vec![1, 2, 3]).unwrap();
        a.send_text("last").unwrap();

        assert_eq!(b_rx.recv().await.unwrap(), ChannelEvent::Text("first".into()));
        assert_eq!(b_rx.recv().await.unwrap(), ChannelEvent::Binary(vec![1, 2, 3]));
        assert_eq!(b_rx.recv().await.unwrap(), ChannelEvent::Text("last".into()));
    }

    #[tokio::test]
    async fn auto_drain_keeps_buffer_empty() {
        let ((a, _a_rx), (_b, _b_rx)) = MemoryChannel::pair();
        a.send_binary(vec![0u8; 4096]).unwrap();
        assert_eq!(a.buffered_bytes(), 0);
    }

    #[tokio::test]
    async fn backpressure_buffer_accumulates_and_drains() {
        let ((a, _a_rx), (_b, _b_rx)) = MemoryChannel::pair_with_backpressure();
        a.set_low_water_mark(100);

        a.send_binary(vec![0u8; 300]).unwrap();
        a.send_binary(vec![0u8; 200]).unwrap();
        assert_eq!(a.buffered_bytes(), 500);

        a.drain(250);
        assert_eq!(a.buffered_bytes(), 250);

        a.drain(10_000);
        assert_eq!(a.buffered_bytes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_signal_fires_at_low_water_mark() {
        let ((a, _a_rx), (_b, _b_rx)) = MemoryChannel::pair_with_backpressure();
        a.set_low_water_mark(100);
        a.send_binary(vec![0u8; 500]).unwrap();

        let signal = a.drain_signal();
        let notified = signal.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // Above the mark: no signal yet.
        a.drain(100);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), notified.as_mut())
                .await
                .is_err()
        );

        // Crosses the mark: signal fires.
        let notified = signal.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        a.drain(350);
        tokio::time::timeout(Duration::from_millis(100), notified)
            .await
            .expect("drain signal should fire");
    }

    #[tokio::test]
    async fn close_fails_sends_on_both_ends() {
        let ((a, _a_rx), (b, mut b_rx)) = MemoryChannel::pair();

        a.close();
        assert!(!a.is_open());
        assert!(!b.is_open());
        assert!(matches!(a.send_text("x"), Err(ChannelError::Closed)));
        assert!(matches!(b.send_binary(vec![0]), Err(ChannelError::Closed)));

        assert_eq!(b_rx.recv().await.unwrap(), ChannelEvent::Closed);
    }

    #[tokio::test]
    async fn dropped_receiver_closes_channel() {
        let ((a, _a_rx), (_b, b_rx)) = MemoryChannel::pair();
        drop(b_rx);
        assert!(matches!(a.send_text("x"), Err(ChannelError::Closed)));
        assert!(!a.is_open());
    }
}
