//! Bounded jitter buffer
//!
//! The single shared mutable resource between the network-facing
//! producer and the playback worker. `push` never blocks: when the
//! buffer is full the oldest frames are evicted until a slot is free, so
//! the newest audio always gets in. Stale audio is worse than missing
//! audio.
//!
//! The mutex is held only for the duration of an insert/evict/remove,
//! never across device I/O.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::frame::AudioFrame;
use crate::audio::stats::StatsCollector;

/// Single-producer/single-consumer bounded frame queue with a
/// latest-wins drop policy
pub struct JitterBuffer {
    inner: Mutex<VecDeque<AudioFrame>>,
    available: Condvar,
    capacity: usize,
    stats: Arc<StatsCollector>,
}

impl JitterBuffer {
    /// Create a buffer holding at most `capacity` frames. End-to-end
    /// latency is bounded by roughly `capacity * frame_duration`.
    pub fn new(capacity: usize, stats: Arc<StatsCollector>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            stats,
        }
    }

    /// Insert a frame, evicting the oldest entries first when at
    /// capacity. Never blocks the producer; every eviction is counted as
    /// a dropped frame.
    pub fn push(&self, frame: AudioFrame) {
        let mut queue = self.inner.lock();
        while queue.len() >= self.capacity {
            if let Some(evicted) = queue.pop_front() {
                tracing::trace!(sequence = evicted.sequence, "evicting stale frame");
                self.stats.record_dropped();
            }
        }
        queue.push_back(frame);
        drop(queue);
        self.available.notify_one();
    }

    /// Consumer-side pop bounded by `timeout`. `None` means the consumer
    /// should emit silence and track the gap.
    pub fn pop(&self, timeout: Duration) -> Option<AudioFrame> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock();
        loop {
            if let Some(frame) = queue.pop_front() {
                return Some(frame);
            }
            if self.available.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    /// Discard everything still queued, counting each frame as dropped.
    /// Returns the number discarded.
    pub fn drain(&self) -> usize {
        let mut queue = self.inner.lock();
        let discarded = queue.len();
        queue.clear();
        drop(queue);
        self.stats.record_dropped_n(discarded as u64);
        discarded
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
