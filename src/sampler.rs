//! # Logarithmic Histogram Sampler
//!
//! Approximate streaming latency distribution with bounded memory. Each
//! interval owns `n_bins` counters where bucket `i` covers
//! `[1.08^i, 1.08^(i+1))` microseconds, plus a running sum and sum of squares
//! so mean and standard deviation stay exact. Percentiles are interpolated
//! linearly inside the bucket that holds the requested rank, which bounds the
//! error to the ~8% width of one bucket.
//!
//! ## Storage Layout
//!
//! All counters live in one interval-major buffer indexed by
//! `interval * n_bins + bucket`; sums are indexed by interval.
//!
//! ## Threading
//!
//! The sampler is not synchronized. Give every worker its own instance and
//! merge them on a single coordinating thread once the run is over.

use crate::defaults::{BUCKET_BASE, MAX_INTERVALS};
use crate::error::StatsError;
use crate::operation::{RetainedSample, TimedOperation};
use crate::percentile::Percentile;
use anyhow::Result;
use std::io::Write;
use tracing::debug;

/// Lower edge of bucket `index` in microseconds.
fn bucket_edge(index: usize) -> f64 {
    BUCKET_BASE.powf(index as f64)
}

/// Log-bucket histogram over one or more intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSampler {
    n_bins: usize,
    n_intervals: usize,
    bins: Vec<u64>,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    retain_samples: bool,
    samples: Vec<RetainedSample>,
}

impl HistogramSampler {
    /// Create a sampler, panicking on an invalid shape.
    ///
    /// `n_bins` must be positive and `n_intervals` within `1..=32`.
    pub fn new(n_bins: usize, n_intervals: usize) -> Self {
        match Self::try_new(n_bins, n_intervals) {
            Ok(sampler) => sampler,
            Err(e) => panic!("{}", e),
        }
    }

    /// Create a sampler, reporting an invalid shape as an error.
    pub fn try_new(n_bins: usize, n_intervals: usize) -> Result<Self, StatsError> {
        if n_bins == 0 {
            return Err(StatsError::InvalidBins(n_bins));
        }
        if n_intervals == 0 || n_intervals > MAX_INTERVALS {
            return Err(StatsError::InvalidIntervals {
                got: n_intervals,
                max: MAX_INTERVALS,
            });
        }

        Ok(Self {
            n_bins,
            n_intervals,
            bins: vec![0; n_bins * n_intervals],
            sum: vec![0.0; n_intervals],
            sum_sq: vec![0.0; n_intervals],
            retain_samples: false,
            samples: Vec::new(),
        })
    }

    /// Keep every operation passed to `sample_op` for later export.
    ///
    /// Retained samples grow without bound; callers are responsible for
    /// keeping runs short or exporting periodically.
    pub fn with_retention(mut self, retain: bool) -> Self {
        self.retain_samples = retain;
        self
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn n_intervals(&self) -> usize {
        self.n_intervals
    }

    pub fn retains_samples(&self) -> bool {
        self.retain_samples
    }

    pub fn samples(&self) -> &[RetainedSample] {
        &self.samples
    }

    fn check_interval(&self, interval: usize) {
        assert!(
            interval < self.n_intervals,
            "{}",
            StatsError::IntervalOutOfRange {
                interval,
                n_intervals: self.n_intervals,
            }
        );
    }

    /// Bucket holding `latency`, clamped into `[0, n_bins - 1]`.
    ///
    /// Latencies below one microsecond (including zero) land in bucket 0.
    pub fn bucket_index(&self, latency: f64) -> usize {
        // `as usize` saturates: -inf and negative logs become 0
        let index = (latency.ln() / BUCKET_BASE.ln()) as usize;
        index.min(self.n_bins - 1)
    }

    /// Record a latency in microseconds.
    pub fn sample(&mut self, latency: f64, interval: usize) {
        assert!(latency >= 0.0, "{}", StatsError::NegativeLatency(latency));
        self.check_interval(interval);

        let bucket = self.bucket_index(latency);
        self.sum[interval] += latency;
        self.sum_sq[interval] += latency * latency;
        self.bins[interval * self.n_bins + bucket] += 1;
    }

    /// Record a completed operation, retaining it if enabled.
    pub fn sample_op<T: TimedOperation>(&mut self, op: &T) {
        self.sample(op.time(), op.interval());
        if self.retain_samples {
            self.samples.push(RetainedSample::from(op));
        }
    }

    /// Raw bucket counts of one interval.
    pub fn bucket_counts(&self, interval: usize) -> &[u64] {
        self.check_interval(interval);
        let start = interval * self.n_bins;
        &self.bins[start..start + self.n_bins]
    }

    pub fn sum(&self, interval: usize) -> f64 {
        self.check_interval(interval);
        self.sum[interval]
    }

    pub fn sum_sq(&self, interval: usize) -> f64 {
        self.check_interval(interval);
        self.sum_sq[interval]
    }

    /// Number of samples recorded in `interval`.
    pub fn total(&self, interval: usize) -> u64 {
        self.bucket_counts(interval).iter().sum()
    }

    /// Mean latency; NaN when the interval is empty.
    pub fn average(&self, interval: usize) -> f64 {
        self.sum[interval] / self.total(interval) as f64
    }

    /// Population standard deviation; NaN when the interval is empty.
    ///
    /// A variance that rounds below zero is reported as 0 rather than NaN.
    pub fn stddev(&self, interval: usize) -> f64 {
        let n = self.total(interval) as f64;
        let mean = self.sum[interval] / n;
        let variance = self.sum_sq[interval] / n - mean * mean;
        // rounding can push the variance of near-constant samples below zero
        if variance < 0.0 {
            0.0
        } else {
            variance.sqrt()
        }
    }

    /// Midpoint (geometric) of the first non-empty bucket.
    ///
    /// # Panics
    ///
    /// Panics when the interval holds no samples.
    pub fn minimum(&self, interval: usize) -> f64 {
        match self.bucket_counts(interval).iter().position(|&c| c > 0) {
            Some(index) => BUCKET_BASE.powf(index as f64 + 0.5),
            None => panic!("minimum of empty interval {}", interval),
        }
    }

    /// Estimate the latency at `percentile` within `interval`.
    ///
    /// Walks the buckets until the cumulative count exceeds the target rank,
    /// then interpolates between that bucket's edges. Returns the upper edge
    /// of the last bucket when the rank is never exceeded (empty interval or
    /// a 100th percentile).
    pub fn quantile(&self, percentile: Percentile, interval: usize) -> f64 {
        let counts = self.bucket_counts(interval);
        let total: u64 = counts.iter().sum();
        let target = percentile.target(total);

        let mut seen = 0u64;
        for (index, &count) in counts.iter().enumerate() {
            seen += count;
            if seen as f64 > target {
                let left = target - (seen - count) as f64;
                let low = bucket_edge(index);
                let high = bucket_edge(index + 1);
                return low + left / count as f64 * (high - low);
            }
        }

        bucket_edge(self.n_bins)
    }

    /// Whether `other` has the same interval and bucket layout.
    pub fn same_shape(&self, other: &HistogramSampler) -> bool {
        self.n_bins == other.n_bins && self.n_intervals == other.n_intervals
    }

    fn shape_mismatch(&self, right_intervals: usize, right_bins: usize) -> StatsError {
        StatsError::ShapeMismatch {
            left_intervals: self.n_intervals,
            left_bins: self.n_bins,
            right_intervals,
            right_bins,
        }
    }

    /// Add another sampler's counts, sums and retained samples into this one.
    pub fn try_merge(&mut self, other: &HistogramSampler) -> Result<(), StatsError> {
        if !self.same_shape(other) {
            return Err(self.shape_mismatch(other.n_intervals, other.n_bins));
        }

        for (mine, theirs) in self.bins.iter_mut().zip(&other.bins) {
            *mine += theirs;
        }
        for (mine, theirs) in self.sum.iter_mut().zip(&other.sum) {
            *mine += theirs;
        }
        for (mine, theirs) in self.sum_sq.iter_mut().zip(&other.sum_sq) {
            *mine += theirs;
        }
        self.samples.extend_from_slice(&other.samples);

        Ok(())
    }

    /// Merge, panicking when the shapes differ.
    pub fn merge(&mut self, other: &HistogramSampler) {
        if let Err(e) = self.try_merge(other) {
            panic!("{}", e);
        }
    }

    /// Add raw bucket counts and sums reported for one interval.
    pub(crate) fn absorb_raw(&mut self, interval: usize, counts: &[u64], sum: f64, sum_sq: f64) {
        self.check_interval(interval);
        assert_eq!(counts.len(), self.n_bins, "raw bucket count width");

        let start = interval * self.n_bins;
        for (mine, theirs) in self.bins[start..start + self.n_bins].iter_mut().zip(counts) {
            *mine += theirs;
        }
        self.sum[interval] += sum;
        self.sum_sq[interval] += sum_sq;
    }

    /// Plot hook invoked by the report path.
    ///
    /// Rendering lives outside the core; this forwards the tag, run
    /// throughput and sample count to the tracing subscriber.
    pub fn plot(&self, tag: &str, qps: f64) {
        let samples: u64 = self.bins.iter().sum();
        debug!(tag, qps, samples, "plot");
    }

    /// Write retained samples as JSON lines, returning how many were written.
    pub fn export_samples<W: Write>(&self, mut writer: W) -> Result<usize> {
        for sample in &self.samples {
            serde_json::to_writer(&mut writer, sample)?;
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(self.samples.len())
    }
}
