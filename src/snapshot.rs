//! # Agent Snapshot
//!
//! Fixed-shape bag of raw counters a remote measurement agent reports to the
//! coordinating process. It carries no histogram object and answers no
//! queries: the agent captures it from its own aggregate, the transport
//! encodes and ships it, and the coordinator folds it into its
//! `ConnectionStats` exactly once.
//!
//! Agents report a single latency distribution. The coordinator adds it to
//! the **read** channel only; write and combined channels never receive
//! snapshot data.
//!
//! ## Wire Layout
//!
//! Bucket counts are stored interval-major with a fixed width of
//! [`BINS`](crate::defaults::BINS) per interval, so a snapshot only merges
//! into aggregates whose read channel uses the same width.

use crate::defaults::{BINS, MAX_INTERVALS};
use crate::error::StatsError;
use crate::stats::ConnectionStats;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Scalar run counters shared by snapshots and aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub gets: u64,
    pub sets: u64,
    pub get_misses: u64,
    pub skips: u64,
    pub start: f64,
    pub stop: f64,
}

/// Raw statistics reported by one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub n_intervals: usize,
    pub base: BaseCounters,
    pub gets_dyn: Vec<u64>,
    pub sets_dyn: Vec<u64>,
    /// `n_intervals * BINS` read-channel bucket counts
    pub read_bins: Vec<u64>,
    pub read_sum: Vec<f64>,
    pub read_sum_sq: Vec<f64>,
}

impl AgentSnapshot {
    /// All-zero snapshot for `n_intervals` intervals.
    pub fn empty(n_intervals: usize) -> Self {
        Self {
            n_intervals,
            base: BaseCounters::default(),
            gets_dyn: vec![0; n_intervals],
            sets_dyn: vec![0; n_intervals],
            read_bins: vec![0; n_intervals * BINS],
            read_sum: vec![0.0; n_intervals],
            read_sum_sq: vec![0.0; n_intervals],
        }
    }

    /// Capture an agent's aggregate for shipping to the coordinator.
    ///
    /// Only the read channel's histogram is carried. Fails when the read
    /// channel does not use the wire bucket width.
    pub fn from_stats(stats: &ConnectionStats) -> Result<Self, StatsError> {
        let sampler = &stats.read_sampler;
        if sampler.n_bins() != BINS {
            return Err(StatsError::ShapeMismatch {
                left_intervals: stats.n_intervals(),
                left_bins: BINS,
                right_intervals: sampler.n_intervals(),
                right_bins: sampler.n_bins(),
            });
        }

        let n_intervals = stats.n_intervals();
        let mut read_bins = Vec::with_capacity(n_intervals * BINS);
        let mut read_sum = Vec::with_capacity(n_intervals);
        let mut read_sum_sq = Vec::with_capacity(n_intervals);
        for interval in 0..n_intervals {
            read_bins.extend_from_slice(sampler.bucket_counts(interval));
            read_sum.push(sampler.sum(interval));
            read_sum_sq.push(sampler.sum_sq(interval));
        }

        Ok(Self {
            n_intervals,
            base: stats.base_counters(),
            gets_dyn: stats.gets_dyn.clone(),
            sets_dyn: stats.sets_dyn.clone(),
            read_bins,
            read_sum,
            read_sum_sq,
        })
    }

    /// Bucket counts of one interval.
    pub fn read_bins(&self, interval: usize) -> &[u64] {
        let start = interval * BINS;
        &self.read_bins[start..start + BINS]
    }

    /// Check that every per-interval array matches `n_intervals` and that
    /// latency sums are finite and non-negative.
    fn validate_layout(&self) -> Result<(), StatsError> {
        if self.n_intervals == 0 || self.n_intervals > MAX_INTERVALS {
            return Err(StatsError::InvalidIntervals {
                got: self.n_intervals,
                max: MAX_INTERVALS,
            });
        }

        let n = self.n_intervals;
        let arrays = [
            ("gets_dyn", self.gets_dyn.len(), n),
            ("sets_dyn", self.sets_dyn.len(), n),
            ("read_bins", self.read_bins.len(), n * BINS),
            ("read_sum", self.read_sum.len(), n),
            ("read_sum_sq", self.read_sum_sq.len(), n),
        ];
        for (name, got, want) in arrays {
            if got != want {
                return Err(StatsError::MalformedSnapshot(format!(
                    "{} has {} entries, expected {}",
                    name, got, want
                )));
            }
        }

        let sums = self.read_sum.iter().zip(&self.read_sum_sq).enumerate();
        for (interval, (&sum, &sum_sq)) in sums {
            if !(sum.is_finite() && sum >= 0.0 && sum_sq.is_finite() && sum_sq >= 0.0) {
                return Err(StatsError::MalformedSnapshot(format!(
                    "interval {} has invalid sums ({}, {})",
                    interval, sum, sum_sq
                )));
            }
        }

        Ok(())
    }

    /// Check the snapshot can merge into an aggregate of `n_intervals`.
    pub fn validate(&self, n_intervals: usize) -> Result<(), StatsError> {
        self.validate_layout()?;
        if self.n_intervals != n_intervals {
            return Err(StatsError::ShapeMismatch {
                left_intervals: n_intervals,
                left_bins: BINS,
                right_intervals: self.n_intervals,
                right_bins: BINS,
            });
        }
        Ok(())
    }

    /// Encode for the agent transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("encoding agent snapshot")
    }

    /// Decode a snapshot received from an agent.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = bincode::deserialize(bytes).context("decoding agent snapshot")?;
        snapshot.validate_layout()?;
        Ok(snapshot)
    }

    /// Emit every interval's bucket counts at trace level.
    pub fn trace_bins(&self) {
        for interval in 0..self.n_intervals {
            trace!(interval, bins = ?self.read_bins(interval), "agent bins");
        }
    }

    /// Emit every interval's latency sums at trace level.
    pub fn trace_sums(&self) {
        for interval in 0..self.n_intervals {
            trace!(
                interval,
                sum = self.read_sum[interval],
                sum_sq = self.read_sum_sq[interval],
                "agent sums"
            );
        }
    }
}

impl fmt::Display for AgentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rx: {}, tx: {}", self.base.rx_bytes, self.base.tx_bytes)?;
        write!(f, "gets: {}, sets: {}", self.base.gets, self.base.sets)?;
        for (i, (gets, sets)) in self.gets_dyn.iter().zip(&self.sets_dyn).enumerate() {
            write!(f, "\n{}- gets_dyn: {}, sets_dyn: {}", i, gets, sets)?;
        }
        Ok(())
    }
}
