use serde::{Deserialize, Serialize};

/// A completed request as seen by the statistics core.
///
/// The protocol client owns the real request type; the samplers only need the
/// elapsed latency and the interval the request was issued in.
pub trait TimedOperation {
    /// Elapsed latency in microseconds, never negative.
    fn time(&self) -> f64;

    /// Interval index in `[0, n_intervals)`.
    fn interval(&self) -> usize;
}

/// Minimal request record with wall-clock start and end timestamps (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub start_time: f64,
    pub end_time: f64,
    pub interval: usize,
}

impl Operation {
    pub fn new(start_time: f64, end_time: f64, interval: usize) -> Self {
        Self {
            start_time,
            end_time,
            interval,
        }
    }
}

impl TimedOperation for Operation {
    fn time(&self) -> f64 {
        (self.end_time - self.start_time) * 1_000_000.0
    }

    fn interval(&self) -> usize {
        self.interval
    }
}

/// Raw sample kept by a sampler when retention is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetainedSample {
    pub latency_us: f64,
    pub interval: usize,
}

impl<T: TimedOperation> From<&T> for RetainedSample {
    fn from(op: &T) -> Self {
        Self {
            latency_us: op.time(),
            interval: op.interval(),
        }
    }
}
