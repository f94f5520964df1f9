//! Rolling load performance tracker.
//!
//! Keeps the durations of the last [`SAMPLE_WINDOW`] successful loads plus
//! monotonic total and failure counters, and turns them into a single
//! "reduce quality" hint for the [`QualitySelector`](crate::policy::QualitySelector).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// Number of successful load durations retained.
pub const SAMPLE_WINDOW: usize = 20;

/// Average load time above which quality should drop (milliseconds).
pub const SLOW_LOAD_THRESHOLD_MS: f64 = 3000.0;

/// Failure rate above which quality should drop.
pub const FAILURE_RATE_THRESHOLD: f64 = 0.1;

/// A single load outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceSample {
    /// Time from request to completion.
    pub duration: Duration,
    /// Whether the load succeeded.
    pub success: bool,
}

#[derive(Debug, Default)]
struct MonitorState {
    /// Durations of recent successful loads, oldest first.
    durations: VecDeque<Duration>,
    total: u64,
    failures: u64,
}

impl MonitorState {
    fn average_ms(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.durations.iter().map(|d| d.as_secs_f64() * 1000.0).sum();
        sum / self.durations.len() as f64
    }

    fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failures as f64 / self.total as f64
    }
}

/// Point-in-time view of the monitor's statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    /// Loads recorded since the last reset.
    pub total_loads: u64,
    /// Failed loads recorded since the last reset.
    pub failures: u64,
    /// Successful durations currently retained.
    pub samples: usize,
    /// Mean of the retained durations in milliseconds.
    pub average_load_time_ms: f64,
    /// Failures divided by total loads.
    pub failure_rate: f64,
    /// Whether the quality should currently be reduced.
    pub should_reduce_quality: bool,
}

/// Tracks recent load latency and failure rate.
///
/// One instance per engine; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a load that started at `start` and just finished.
    pub fn record(&self, start: Instant, success: bool) {
        self.record_duration(start.elapsed(), success);
    }

    /// Record a load with a known duration.
    pub fn record_duration(&self, duration: Duration, success: bool) {
        self.record_sample(PerformanceSample { duration, success });
    }

    /// Record a load outcome.
    pub fn record_sample(&self, sample: PerformanceSample) {
        let mut state = self.state.lock();
        state.total += 1;

        if sample.success {
            state.durations.push_back(sample.duration);
            while state.durations.len() > SAMPLE_WINDOW {
                state.durations.pop_front();
            }
        } else {
            state.failures += 1;
        }
    }

    /// Mean duration of the retained successful loads, 0 when there are none.
    pub fn average_load_time_ms(&self) -> f64 {
        self.state.lock().average_ms()
    }

    /// Failures over total loads, 0 when nothing was recorded.
    pub fn failure_rate(&self) -> f64 {
        self.state.lock().failure_rate()
    }

    /// Whether loads are slow or failing often enough to lower quality.
    pub fn should_reduce_quality(&self) -> bool {
        let state = self.state.lock();
        state.average_ms() > SLOW_LOAD_THRESHOLD_MS || state.failure_rate() > FAILURE_RATE_THRESHOLD
    }

    /// Forget every sample and counter.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        debug!(
            total = state.total,
            failures = state.failures,
            "Resetting load performance statistics"
        );
        *state = MonitorState::default();
    }

    /// Consistent snapshot of all statistics.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.lock();
        let average_load_time_ms = state.average_ms();
        let failure_rate = state.failure_rate();

        MonitorSnapshot {
            total_loads: state.total,
            failures: state.failures,
            samples: state.durations.len(),
            average_load_time_ms,
            failure_rate,
            should_reduce_quality: average_load_time_ms > SLOW_LOAD_THRESHOLD_MS
                || failure_rate > FAILURE_RATE_THRESHOLD,
        }
    }
}
