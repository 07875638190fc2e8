//! Progress reporting and speed estimation.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One progress sample, emitted per chunk on both roles.
///
/// Sufficient for the UI layer to derive percentage, instantaneous
/// speed, and ETA. Delivery is non-blocking; a slow consumer drops
/// samples rather than stalling the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Name of the file in flight.
    pub name: String,
    /// Bytes transferred so far for this file.
    pub bytes_transferred: u64,
    /// Declared total for this file.
    pub total_bytes: u64,
    /// Time since this file's transfer started.
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Completion percentage in `0.0..=100.0` (100 for empty files).
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
        }
    }
}

/// Estimates transfer speed over a sliding window of samples.
///
/// Owned by a single cooperative task, so no interior locking is
/// needed.
pub struct SpeedCalculator {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    max_samples: usize,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 100)
    }
}

impl SpeedCalculator {
    /// Creates a calculator keeping at most `max_samples` samples within
    /// `window`.
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
            max_samples,
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn record(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back((now, bytes));

        if let Some(cutoff) = now.checked_sub(self.window) {
            while self.samples.front().is_some_and(|(at, _)| *at < cutoff) {
                self.samples.pop_front();
            }
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some((first, _)), Some((last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let elapsed = last.duration_since(*first);
        if self.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        let total: u64 = self.samples.iter().map(|(_, b)| b).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to transfer `remaining_bytes`, or `None` if the
    /// speed is unknown.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
