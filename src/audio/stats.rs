//! Pipeline statistics
//!
//! Counters are updated from both the producer and consumer contexts.
//! Logging is sampled at a bounded rate so instrumentation never sits on
//! the playout timing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::constants::STATS_LOG_INTERVAL;

/// Monotonic counters scoped to the pipeline's lifetime, reset only on
/// explicit request
#[derive(Debug)]
pub struct StatsCollector {
    frames_received: AtomicU64,
    frames_played: AtomicU64,
    frames_dropped: AtomicU64,
    buffer_underruns: AtomicU64,
    epoch: Mutex<Instant>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_played: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            buffer_underruns: AtomicU64::new(0),
            epoch: Mutex::new(Instant::now()),
        }
    }

    /// Count one frame accepted from the session layer. Emits a sampled
    /// debug line every `STATS_LOG_INTERVAL` frames.
    pub fn record_received(&self) {
        let received = self.frames_received.fetch_add(1, Ordering::Relaxed) + 1;
        if received % STATS_LOG_INTERVAL == 0 {
            tracing::debug!(
                received,
                played = self.frames_played.load(Ordering::Relaxed),
                dropped = self.frames_dropped.load(Ordering::Relaxed),
                underruns = self.buffer_underruns.load(Ordering::Relaxed),
                "playout stats"
            );
        }
    }

    pub fn record_played(&self) {
        self.frames_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_n(&self, n: u64) {
        self.frames_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_underrun(&self) {
        self.buffer_underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn buffer_underruns(&self) -> u64 {
        self.buffer_underruns.load(Ordering::Relaxed)
    }

    /// Snapshot all counters plus derived rates. `queued` is the current
    /// jitter buffer depth, passed in by the owner.
    pub fn snapshot(&self, queued: usize) -> StatsSnapshot {
        let elapsed = self.epoch.lock().elapsed();
        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        let received = self.frames_received();
        let played = self.frames_played();

        StatsSnapshot {
            frames_received: received,
            frames_played: played,
            frames_dropped: self.frames_dropped(),
            buffer_underruns: self.buffer_underruns(),
            frames_queued: queued,
            elapsed,
            received_per_sec: received as f64 / secs,
            played_per_sec: played as f64 / secs,
        }
    }

    /// Reset all counters and the rate epoch
    pub fn reset(&self) {
        self.frames_received.store(0, Ordering::Relaxed);
        self.frames_played.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.buffer_underruns.store(0, Ordering::Relaxed);
        *self.epoch.lock() = Instant::now();
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the pipeline counters
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub frames_played: u64,
    pub frames_dropped: u64,
    pub buffer_underruns: u64,
    pub frames_queued: usize,
    pub elapsed: Duration,
    pub received_per_sec: f64,
    pub played_per_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = StatsCollector::new();
        stats.record_received();
        stats.record_received();
        stats.record_played();
        stats.record_dropped();
        stats.record_underrun();

        let snapshot = stats.snapshot(3);
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.frames_played, 1);
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(snapshot.buffer_underruns, 1);
        assert_eq!(snapshot.frames_queued, 3);
    }

    #[test]
    fn test_reset() {
        let stats = StatsCollector::new();
        stats.record_received();
        stats.record_dropped_n(5);
        stats.reset();

        let snapshot = stats.snapshot(0);
        assert_eq!(snapshot.frames_received, 0);
        assert_eq!(snapshot.frames_dropped, 0);
    }

    #[test]
    fn test_rates_positive() {
        let stats = StatsCollector::new();
        for _ in 0..10 {
            stats.record_received();
        }
        let snapshot = stats.snapshot(0);
        assert!(snapshot.received_per_sec > 0.0);
    }
}
