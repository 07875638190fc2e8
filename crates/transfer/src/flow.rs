//! Send-side backpressure.

use droplink_channel::TransferChannel;
use tracing::trace;

use crate::{DRAIN_POLL_INTERVAL, HIGH_WATER_MARK, LOW_WATER_MARK};

/// Gates the send rate on the channel's outbound buffer level.
///
/// The channel's send buffer is finite; pushing chunks faster than the
/// far side drains them risks unbounded memory growth or a hard channel
/// failure. The controller pauses the send loop above the high-water
/// mark and resumes it once the buffer falls back to the low-water
/// mark. The two marks are kept apart so the loop does not oscillate
/// on every chunk.
#[derive(Debug, Clone, Copy)]
pub struct FlowController {
    high_water: u64,
    low_water: u64,
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new(HIGH_WATER_MARK, LOW_WATER_MARK)
    }
}

impl FlowController {
    /// Creates a controller with the given marks.
    ///
    /// `high_water` must exceed `low_water`.
    pub fn new(high_water: u64, low_water: u64) -> Self {
        debug_assert!(high_water > low_water);
        Self {
            high_water,
            low_water,
        }
    }

    /// The pause threshold.
    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    /// The resume threshold.
    pub fn low_water(&self) -> u64 {
        self.low_water
    }

    /// Whether the send loop should pause before the next chunk.
    pub fn should_pause<C: TransferChannel>(&self, channel: &C) -> bool {
        channel.buffered_bytes() > self.high_water
    }

    /// Resolves once the channel's buffer is at or below the low-water
    /// mark.
    ///
    /// Returns immediately if already there. Otherwise waits on the
    /// channel's drain signal, re-checking the buffer level on each
    /// wake, with a bounded polling fallback for channels that never
    /// fire the signal. Also wakes (and returns) once the channel
    /// closes, so the caller can observe the closure at the next loop
    /// boundary.
    pub async fn await_drain<C: TransferChannel>(&self, channel: &C) {
        while channel.buffered_bytes() > self.low_water && channel.is_open() {
            trace!(
                buffered = channel.buffered_bytes(),
                low_water = self.low_water,
                "waiting for channel drain"
            );
            let signal = channel.drain_signal();
            let notified = signal.notified();
            let _ = tokio::time::timeout(DRAIN_POLL_INTERVAL, notified).await;
        }
    }
}
