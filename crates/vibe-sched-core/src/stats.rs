use std::time::{Duration, Instant};

use crate::event::Timestamp;

pub const DEFAULT_STATS_WINDOW: u64 = 1000;

/// Source of elapsed real time used only to measure dispatch cost.
///
/// Ordering and readiness never consult it; they run purely on the logical
/// timestamps passed to `tick`.
pub trait ProcessingClock: Send {
    /// Time elapsed since an arbitrary fixed origin.
    fn elapsed(&self) -> Duration;
}

/// [`ProcessingClock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingClock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Cumulative dispatch counters plus a rolling events-per-window rate.
#[derive(Debug, Clone)]
pub struct DispatchStats {
    pub total_processed: u64,
    pub total_time: Duration,
    /// Number of ticks that ran (paused ticks are not sampled).
    pub samples: u64,
    /// Events rejected because the queue was full.
    pub(crate) dropped: u64,
    window_len: u64,
    window_start: Timestamp,
    window_events: u32,
    events_per_second: u32,
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_WINDOW)
    }
}

impl DispatchStats {
    pub fn new(window_len: u64) -> Self {
        Self {
            total_processed: 0,
            total_time: Duration::ZERO,
            samples: 0,
            dropped: 0,
            window_len: window_len.max(1),
            window_start: 0,
            window_events: 0,
            events_per_second: 0,
        }
    }

    pub fn record_tick(&mut self, now: Timestamp, processed: u32, elapsed: Duration) {
        self.total_processed += u64::from(processed);
        self.total_time += elapsed;
        self.samples += 1;
        self.window_events = self.window_events.saturating_add(processed);

        if now.saturating_sub(self.window_start) >= self.window_len {
            self.events_per_second = self.window_events;
            self.window_events = 0;
            self.window_start = now;
        }
    }

    pub fn record_dropped(&mut self, count: usize) {
        self.dropped += count as u64;
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Event count of the most recently completed window.
    pub fn events_per_second(&self) -> u32 {
        self.events_per_second
    }

    pub fn avg_processing_time(&self) -> Duration {
        if self.samples == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_time.as_nanos() / u128::from(self.samples);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Snapshot returned by `Scheduler::stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Live (non-canceled) events waiting in the queue.
    pub queued: usize,
    pub events_per_second: u32,
    pub avg_processing_time: Duration,
    pub total_processed: u64,
    pub dropped: u64,
    pub ticks: u64,
    pub periodic_active: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_publishes_after_full_length() {
        let mut stats = DispatchStats::new(1000);
        stats.record_tick(100, 5, Duration::ZERO);
        stats.record_tick(500, 7, Duration::ZERO);
        assert_eq!(stats.events_per_second(), 0);

        stats.record_tick(1000, 3, Duration::ZERO);
        assert_eq!(stats.events_per_second(), 15);

        stats.record_tick(1999, 4, Duration::ZERO);
        assert_eq!(stats.events_per_second(), 15);
        stats.record_tick(2000, 1, Duration::ZERO);
        assert_eq!(stats.events_per_second(), 5);
        assert_eq!(stats.total_processed, 20);
    }

    #[test]
    fn average_is_per_sample() {
        let mut stats = DispatchStats::default();
        assert_eq!(stats.avg_processing_time(), Duration::ZERO);
        stats.record_tick(0, 1, Duration::from_micros(30));
        stats.record_tick(1, 1, Duration::from_micros(10));
        assert_eq!(stats.avg_processing_time(), Duration::from_micros(20));
    }

    #[test]
    fn clock_going_backwards_does_not_publish() {
        let mut stats = DispatchStats::new(10);
        stats.record_tick(50, 2, Duration::ZERO);
        assert_eq!(stats.events_per_second(), 2);
        stats.record_tick(5, 3, Duration::ZERO);
        assert_eq!(stats.events_per_second(), 2);
    }
}
