//! Rolling throughput metering.
//!
//! Tracks a per-direction bytes/sec average for diagnostics. Purely
//! informational; nothing in the protocol depends on it.

use std::time::{Duration, Instant};

/// Window length for the rolling average.
const WINDOW: Duration = Duration::from_secs(1);

/// Rolling average of bytes per second over one-second windows.
#[derive(Debug)]
pub struct ThroughputMeter {
    window_start: Instant,
    window_bytes: u64,
    average: u64,
}

impl ThroughputMeter {
    /// Create a meter starting now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a meter with an explicit start instant.
    pub fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            window_bytes: 0,
            average: 0,
        }
    }

    /// Record `n` transferred bytes.
    ///
    /// Returns the updated average when this record closed a window.
    pub fn record(&mut self, n: usize) -> Option<u64> {
        self.record_at(n, Instant::now())
    }

    /// Record `n` transferred bytes at a given instant.
    pub fn record_at(&mut self, n: usize, now: Instant) -> Option<u64> {
        self.window_bytes += n as u64;

        let elapsed = now.duration_since(self.window_start);
        if elapsed < WINDOW {
            return None;
        }

        let rate = (self.window_bytes as f64 / elapsed.as_secs_f64()) as u64;
        self.average = if self.average == 0 {
            rate
        } else {
            (self.average + rate) / 2
        };
        self.window_start = now;
        self.window_bytes = 0;
        Some(self.average)
    }

    /// The current rolling average in bytes per second.
    pub fn average(&self) -> u64 {
        self.average
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
