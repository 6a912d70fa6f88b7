//! Rolling window statistics for a monitored endpoint.
//!
//! Each window keeps exactly the last `duration / interval` observations
//! in an [`EvictingBuffer`] and maintains its aggregates incrementally:
//! up/down counts, latency sum/min/max and response-code-class hits are
//! adjusted on every insert and every eviction, so they always describe a
//! true window of events rather than an approximation.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use chrono::Utc;

use crate::config::{ConfigError, TargetId};
use crate::events::StatisticsSnapshot;
use crate::window::EvictingBuffer;

/// Classification of one buffered observation.
///
/// Down observations carry no status code; up observations are bucketed
/// by response-code class (2 for 2xx, 3 for 3xx, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlotClass {
    Status(u8),
    Down,
}

impl SlotClass {
    fn from_status(status_code: u16) -> Self {
        Self::Status((status_code / 100) as u8)
    }

    fn label(&self) -> String {
        match self {
            Self::Status(class) => format!("{}xx", class),
            Self::Down => "down".to_string(),
        }
    }
}

/// One observation as retained by the ring buffer.
#[derive(Debug, Clone, Copy)]
struct Slot {
    latency_ms: u64,
    class: SlotClass,
}

/// Exact rolling statistics over the last `duration_ms` of observations.
#[derive(Debug, Clone)]
pub struct WindowStats {
    duration_ms: u64,
    /// Latency recorded for down observations, per the probe timeout.
    timeout_ms: u64,
    buffer: EvictingBuffer<Slot>,
    up_count: u64,
    down_count: u64,
    sum_latency: u64,
    /// `u64::MAX` while no observation has been recorded.
    min_latency: u64,
    max_latency: u64,
    class_hits: BTreeMap<SlotClass, u64>,
}

impl WindowStats {
    /// Create a window covering `duration_ms` for a target polled every
    /// `interval_ms`. The buffer capacity is `duration / interval`; a
    /// window shorter than one polling interval is a configuration error.
    pub fn new(duration_ms: u64, interval_ms: u64, timeout_ms: u64) -> Result<Self, ConfigError> {
        if interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let capacity = NonZeroUsize::new((duration_ms / interval_ms) as usize).ok_or(
            ConfigError::WindowTooShort {
                duration_ms,
                interval_ms,
            },
        )?;

        Ok(Self {
            duration_ms,
            timeout_ms,
            buffer: EvictingBuffer::new(capacity),
            up_count: 0,
            down_count: 0,
            sum_latency: 0,
            min_latency: u64::MAX,
            max_latency: 0,
            class_hits: BTreeMap::new(),
        })
    }

    /// Record a successful probe.
    pub fn record_up(&mut self, latency_ms: u64, status_code: u16) {
        self.record(latency_ms, SlotClass::from_status(status_code));
    }

    /// Record a failed or timed-out probe. The slot carries the probe
    /// timeout as its latency so the time statistics reflect the wait.
    pub fn record_down(&mut self) {
        self.record(self.timeout_ms, SlotClass::Down);
    }

    fn record(&mut self, latency_ms: u64, class: SlotClass) {
        if let Some(evicted) = self.buffer.push(Slot { latency_ms, class }) {
            match evicted.class {
                SlotClass::Down => self.down_count -= 1,
                SlotClass::Status(_) => self.up_count -= 1,
            }

            if let Some(count) = self.class_hits.get_mut(&evicted.class) {
                *count -= 1;
                if *count == 0 {
                    self.class_hits.remove(&evicted.class);
                }
            }

            self.sum_latency -= evicted.latency_ms;

            // Losing the current extreme forces a rescan. O(N), but N is
            // bounded by duration / interval and stays small.
            if evicted.latency_ms == self.min_latency {
                self.min_latency = self
                    .buffer
                    .iter()
                    .map(|s| s.latency_ms)
                    .min()
                    .unwrap_or(u64::MAX);
            }
            if evicted.latency_ms == self.max_latency {
                self.max_latency = self.buffer.iter().map(|s| s.latency_ms).max().unwrap_or(0);
            }
        }

        match class {
            SlotClass::Down => self.down_count += 1,
            SlotClass::Status(_) => self.up_count += 1,
        }
        *self.class_hits.entry(class).or_insert(0) += 1;

        self.sum_latency += latency_ms;
        self.min_latency = self.min_latency.min(latency_ms);
        self.max_latency = self.max_latency.max(latency_ms);
    }

    /// Availability percentage over the current window, or `None` while
    /// the window holds no observations. Callers must branch on `None`
    /// instead of treating it as 0%.
    pub fn availability(&self) -> Option<f64> {
        let total = self.up_count + self.down_count;
        if total == 0 {
            return None;
        }
        Some(self.up_count as f64 * 100.0 / total as f64)
    }

    /// Point-in-time readout of the window's aggregates.
    pub fn snapshot(&self, target: &TargetId) -> StatisticsSnapshot {
        let len = self.buffer.len() as u64;

        StatisticsSnapshot {
            target: target.clone(),
            at: Utc::now(),
            window_ms: self.duration_ms,
            min_latency_ms: if self.min_latency == u64::MAX {
                0
            } else {
                self.min_latency
            },
            max_latency_ms: self.max_latency,
            avg_latency_ms: if len == 0 { 0 } else { self.sum_latency / len },
            availability: self.availability(),
            class_hits: self
                .class_hits
                .iter()
                .map(|(class, count)| (class.label(), *count))
                .collect(),
        }
    }

    pub fn up_count(&self) -> u64 {
        self.up_count
    }

    pub fn down_count(&self) -> u64 {
        self.down_count
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetId {
        TargetId::parse("http://test.example").unwrap()
    }

    fn window(duration_ms: u64, interval_ms: u64) -> WindowStats {
        WindowStats::new(duration_ms, interval_ms, 1_000).unwrap()
    }

    #[test]
    fn test_window_shorter_than_interval_is_rejected() {
        assert!(matches!(
            WindowStats::new(5_000, 10_000, 1_000),
            Err(ConfigError::WindowTooShort { .. })
        ));
        assert!(matches!(
            WindowStats::new(5_000, 0, 1_000),
            Err(ConfigError::InvalidInterval)
        ));
    }

    #[test]
    fn test_counts_match_buffer_length() {
        let mut w = window(5_000, 1_000);
        for i in 0..12 {
            if i % 3 == 0 {
                w.record_down();
            } else {
                w.record_up(50 + i, 200);
            }
            assert_eq!(w.up_count() + w.down_count(), w.len() as u64);
            assert!(w.len() <= 5);
        }
    }

    #[test]
    fn test_eviction_rolls_up_and_down_counts() {
        // Capacity 10. Eight ups then three downs: the first two downs fill
        // the buffer, the third evicts the oldest up.
        let mut w = window(10_000, 1_000);
        for _ in 0..8 {
            w.record_up(100, 200);
        }
        for _ in 0..3 {
            w.record_down();
        }

        assert_eq!(w.up_count(), 7);
        assert_eq!(w.down_count(), 3);
        assert_eq!(w.availability(), Some(70.0));
    }

    #[test]
    fn test_min_max_rescan_after_evicting_extreme() {
        let mut w = window(3_000, 1_000);
        w.record_up(500, 200); // will be evicted
        w.record_up(100, 200);
        w.record_up(300, 200);

        let snap = w.snapshot(&target());
        assert_eq!(snap.min_latency_ms, 100);
        assert_eq!(snap.max_latency_ms, 500);

        // Evicts the 500ms observation, the previous maximum.
        w.record_up(200, 200);

        let snap = w.snapshot(&target());
        assert_eq!(snap.min_latency_ms, 100);
        assert_eq!(snap.max_latency_ms, 300);

        // Evicts the 100ms observation, the previous minimum.
        w.record_up(250, 200);

        let snap = w.snapshot(&target());
        assert_eq!(snap.min_latency_ms, 200);
        assert_eq!(snap.max_latency_ms, 300);
    }

    #[test]
    fn test_average_tracks_buffer_contents() {
        let mut w = window(4_000, 1_000);
        w.record_up(100, 200);
        w.record_up(200, 200);
        w.record_up(300, 200);
        w.record_up(400, 200);
        assert_eq!(w.snapshot(&target()).avg_latency_ms, 250);

        // 100 ages out: (200 + 300 + 400 + 500) / 4
        w.record_up(500, 200);
        assert_eq!(w.snapshot(&target()).avg_latency_ms, 350);
    }

    #[test]
    fn test_down_records_timeout_latency() {
        let mut w = WindowStats::new(4_000, 1_000, 2_500).unwrap();
        w.record_up(100, 200);
        w.record_down();

        let snap = w.snapshot(&target());
        assert_eq!(snap.max_latency_ms, 2_500);
        assert_eq!(snap.avg_latency_ms, 1_300);
    }

    #[test]
    fn test_class_hits_follow_evictions() {
        let mut w = window(3_000, 1_000);
        w.record_up(100, 200);
        w.record_up(100, 201);
        w.record_up(100, 404);

        let snap = w.snapshot(&target());
        assert_eq!(snap.class_hits.get("2xx"), Some(&2));
        assert_eq!(snap.class_hits.get("4xx"), Some(&1));

        // Evicts one 2xx, inserts a 5xx.
        w.record_up(100, 503);
        // Evicts the other 2xx, inserts a down marker.
        w.record_down();

        let snap = w.snapshot(&target());
        assert_eq!(snap.class_hits.get("2xx"), None);
        assert_eq!(snap.class_hits.get("4xx"), Some(&1));
        assert_eq!(snap.class_hits.get("5xx"), Some(&1));
        assert_eq!(snap.class_hits.get("down"), Some(&1));
    }

    #[test]
    fn test_empty_window_has_no_availability() {
        let w = window(10_000, 1_000);
        assert!(w.is_empty());
        assert_eq!(w.availability(), None);

        let snap = w.snapshot(&target());
        assert_eq!(snap.min_latency_ms, 0);
        assert_eq!(snap.max_latency_ms, 0);
        assert_eq!(snap.avg_latency_ms, 0);
        assert_eq!(snap.availability, None);
    }
}
