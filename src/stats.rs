//! # Connection Statistics Aggregate
//!
//! `ConnectionStats` is what a worker (or a whole run) accumulates: three
//! independent histogram channels plus byte, operation, miss and skip
//! counters, and per-interval operation counts.
//!
//! ## Channels
//!
//! - **read**: latencies of pure read operations (`log_read`)
//! - **write**: latencies of pure write operations (`log_write`)
//! - **combined**: operations of any type, or overall latency (`log_combined`)
//!
//! ## Merging
//!
//! Local workers merge with [`ConnectionStats::merge`], which sums every
//! counter and histogram and adopts the peer's start/stop timestamps (the
//! last merged peer wins). Remote agents arrive as an [`AgentSnapshot`] and
//! merge with [`ConnectionStats::merge_snapshot`], which folds the agent's
//! single latency distribution into the read channel only.

use crate::config::StatsConfig;
use crate::defaults::BINS;
use crate::error::StatsError;
use crate::operation::TimedOperation;
use crate::percentile::Percentile;
use crate::report::ReportFormat;
use crate::sampler::HistogramSampler;
use crate::snapshot::{AgentSnapshot, BaseCounters};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One of the three histogram channels owned by an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Read,
    Write,
    Combined,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Read, Channel::Write, Channel::Combined];

    /// Row label used in text reports.
    pub fn tag(self) -> &'static str {
        match self {
            Channel::Read => "read",
            Channel::Write => "update",
            Channel::Combined => "op",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Per-connection (or per-run) statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStats {
    pub read_sampler: HistogramSampler,
    pub write_sampler: HistogramSampler,
    pub combined_sampler: HistogramSampler,

    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub gets: u64,
    pub sets: u64,
    pub get_misses: u64,
    pub skips: u64,

    /// Operations logged per interval
    pub gets_dyn: Vec<u64>,
    pub sets_dyn: Vec<u64>,

    /// Wall-clock run boundaries in seconds
    pub start: f64,
    pub stop: f64,

    /// Feed samplers on `log_*`; counters are always updated
    pub sampling: bool,
    /// Invoke every sampler's plot hook when rendering
    pub plot_all: bool,

    n_intervals: usize,
}

impl ConnectionStats {
    /// Aggregate with the standard 200-bucket channels.
    pub fn new(sampling: bool, n_intervals: usize) -> Self {
        Self::with_bins(sampling, n_intervals, BINS)
    }

    /// Aggregate with a custom bucket count, for in-process use only.
    ///
    /// Agent snapshots always carry 200 buckets and are rejected by
    /// aggregates built with another width.
    pub fn with_bins(sampling: bool, n_intervals: usize, n_bins: usize) -> Self {
        let sampler = HistogramSampler::new(n_bins, n_intervals);
        Self::from_sampler(sampling, sampler)
    }

    /// Build an aggregate from validated configuration.
    pub fn from_config(config: &StatsConfig) -> Result<Self, StatsError> {
        let sampler = HistogramSampler::try_new(config.n_bins, config.n_intervals)?
            .with_retention(config.save_samples);
        let mut stats = Self::from_sampler(config.sampling, sampler);
        stats.plot_all = config.plot_all;
        Ok(stats)
    }

    fn from_sampler(sampling: bool, sampler: HistogramSampler) -> Self {
        let n_intervals = sampler.n_intervals();
        Self {
            read_sampler: sampler.clone(),
            write_sampler: sampler.clone(),
            combined_sampler: sampler,
            rx_bytes: 0,
            tx_bytes: 0,
            gets: 0,
            sets: 0,
            get_misses: 0,
            skips: 0,
            gets_dyn: vec![0; n_intervals],
            sets_dyn: vec![0; n_intervals],
            start: 0.0,
            stop: 0.0,
            sampling,
            plot_all: false,
            n_intervals,
        }
    }

    pub fn n_intervals(&self) -> usize {
        self.n_intervals
    }

    pub fn channel(&self, channel: Channel) -> &HistogramSampler {
        match channel {
            Channel::Read => &self.read_sampler,
            Channel::Write => &self.write_sampler,
            Channel::Combined => &self.combined_sampler,
        }
    }

    /// Scalar counters in wire form.
    pub fn base_counters(&self) -> BaseCounters {
        BaseCounters {
            rx_bytes: self.rx_bytes,
            tx_bytes: self.tx_bytes,
            gets: self.gets,
            sets: self.sets,
            get_misses: self.get_misses,
            skips: self.skips,
            start: self.start,
            stop: self.stop,
        }
    }

    pub fn log_read<T: TimedOperation>(&mut self, op: &T) {
        if self.sampling {
            self.read_sampler.sample_op(op);
        }
        self.gets += 1;
        self.gets_dyn[op.interval()] += 1;
    }

    pub fn log_write<T: TimedOperation>(&mut self, op: &T) {
        if self.sampling {
            self.write_sampler.sample_op(op);
        }
        self.sets += 1;
        self.sets_dyn[op.interval()] += 1;
    }

    /// Record an untyped latency (µs) in interval 0 of the combined channel.
    ///
    /// No counter is touched.
    pub fn log_combined(&mut self, latency: f64) {
        if self.sampling {
            self.combined_sampler.sample(latency, 0);
        }
    }

    /// Run length in seconds.
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Operations per second over the run; Inf/NaN when the span is not positive.
    pub fn throughput(&self) -> f64 {
        (self.gets + self.sets) as f64 / self.duration()
    }

    /// Fraction of reads that missed; NaN when no reads were logged.
    pub fn miss_ratio(&self) -> f64 {
        self.get_misses as f64 / self.gets as f64
    }

    /// Received bytes per second.
    pub fn rx_rate(&self) -> f64 {
        self.rx_bytes as f64 / self.duration()
    }

    /// Transmitted bytes per second.
    pub fn tx_rate(&self) -> f64 {
        self.tx_bytes as f64 / self.duration()
    }

    /// Reads and writes logged during `interval`.
    pub fn interval_ops(&self, interval: usize) -> u64 {
        self.gets_dyn[interval] + self.sets_dyn[interval]
    }

    /// Larger of the read and write estimates; an empty write channel counts as 0.
    pub fn quantile(&self, percentile: Percentile, interval: usize) -> f64 {
        let read = self.read_sampler.quantile(percentile, interval);
        let write = if self.write_sampler.total(interval) > 0 {
            self.write_sampler.quantile(percentile, interval)
        } else {
            0.0
        };
        if read > write {
            read
        } else {
            write
        }
    }

    /// Larger of the read and write means; an empty write channel counts as 0.
    pub fn mean(&self, interval: usize) -> f64 {
        let read = self.read_sampler.average(interval);
        let write = if self.write_sampler.total(interval) > 0 {
            self.write_sampler.average(interval)
        } else {
            0.0
        };
        if read > write {
            read
        } else {
            write
        }
    }

    fn shape_mismatch(&self, other_intervals: usize, other_bins: usize) -> StatsError {
        StatsError::ShapeMismatch {
            left_intervals: self.n_intervals,
            left_bins: self.read_sampler.n_bins(),
            right_intervals: other_intervals,
            right_bins: other_bins,
        }
    }

    /// Merge a peer aggregate, reporting incompatible shapes as an error.
    ///
    /// Nothing is modified when the shapes differ.
    pub fn try_merge(&mut self, peer: &ConnectionStats) -> Result<(), StatsError> {
        let compatible = Channel::ALL
            .iter()
            .all(|&c| self.channel(c).same_shape(peer.channel(c)));
        if !compatible || self.n_intervals != peer.n_intervals {
            return Err(self.shape_mismatch(peer.n_intervals, peer.read_sampler.n_bins()));
        }

        self.read_sampler.try_merge(&peer.read_sampler)?;
        self.write_sampler.try_merge(&peer.write_sampler)?;
        self.combined_sampler.try_merge(&peer.combined_sampler)?;

        self.rx_bytes += peer.rx_bytes;
        self.tx_bytes += peer.tx_bytes;
        self.gets += peer.gets;
        self.sets += peer.sets;
        self.get_misses += peer.get_misses;
        self.skips += peer.skips;

        for (mine, theirs) in self.gets_dyn.iter_mut().zip(&peer.gets_dyn) {
            *mine += theirs;
        }
        for (mine, theirs) in self.sets_dyn.iter_mut().zip(&peer.sets_dyn) {
            *mine += theirs;
        }

        self.start = peer.start;
        self.stop = peer.stop;

        debug!(gets = self.gets, sets = self.sets, "merged peer statistics");
        Ok(())
    }

    /// Merge a peer aggregate, panicking when the shapes differ.
    pub fn merge(&mut self, peer: &ConnectionStats) {
        if let Err(e) = self.try_merge(peer) {
            panic!("{}", e);
        }
    }

    /// Fold a remote agent's report into this aggregate.
    ///
    /// Counters and per-interval arrays are summed and start/stop adopted.
    /// The agent's bucket counts and sums go into the read channel only.
    /// Nothing is modified when the snapshot does not fit.
    pub fn try_merge_snapshot(&mut self, snapshot: &AgentSnapshot) -> Result<(), StatsError> {
        snapshot.validate(self.n_intervals)?;
        if self.read_sampler.n_bins() != BINS {
            return Err(self.shape_mismatch(snapshot.n_intervals, BINS));
        }
        self.check_snapshot_overflow(snapshot)?;

        let base = &snapshot.base;
        self.rx_bytes += base.rx_bytes;
        self.tx_bytes += base.tx_bytes;
        self.gets += base.gets;
        self.sets += base.sets;
        self.get_misses += base.get_misses;
        self.skips += base.skips;

        self.start = base.start;
        self.stop = base.stop;

        for (mine, theirs) in self.gets_dyn.iter_mut().zip(&snapshot.gets_dyn) {
            *mine += theirs;
        }
        for (mine, theirs) in self.sets_dyn.iter_mut().zip(&snapshot.sets_dyn) {
            *mine += theirs;
        }

        for interval in 0..self.n_intervals {
            self.read_sampler.absorb_raw(
                interval,
                snapshot.read_bins(interval),
                snapshot.read_sum[interval],
                snapshot.read_sum_sq[interval],
            );
        }

        debug!(
            agent_gets = base.gets,
            agent_sets = base.sets,
            "merged agent snapshot"
        );
        Ok(())
    }

    /// Reject snapshots whose counters would wrap any counter of this aggregate.
    fn check_snapshot_overflow(&self, snapshot: &AgentSnapshot) -> Result<(), StatsError> {
        fn fits(mine: u64, theirs: u64) -> bool {
            mine.checked_add(theirs).is_some()
        }

        let base = &snapshot.base;
        let scalars = [
            ("rx_bytes", self.rx_bytes, base.rx_bytes),
            ("tx_bytes", self.tx_bytes, base.tx_bytes),
            ("gets", self.gets, base.gets),
            ("sets", self.sets, base.sets),
            ("get_misses", self.get_misses, base.get_misses),
            ("skips", self.skips, base.skips),
        ];
        let overflow = |name: &str| {
            Err(StatsError::MalformedSnapshot(format!("{} would overflow", name)))
        };
        for (name, mine, theirs) in scalars {
            if !fits(mine, theirs) {
                return overflow(name);
            }
        }

        let dyn_ok = self
            .gets_dyn
            .iter()
            .zip(&snapshot.gets_dyn)
            .chain(self.sets_dyn.iter().zip(&snapshot.sets_dyn))
            .all(|(&mine, &theirs)| fits(mine, theirs));
        if !dyn_ok {
            return overflow("per-interval operation count");
        }

        for interval in 0..self.n_intervals {
            let bins_ok = self
                .read_sampler
                .bucket_counts(interval)
                .iter()
                .zip(snapshot.read_bins(interval))
                .all(|(&mine, &theirs)| fits(mine, theirs));
            if !bins_ok {
                return overflow("bucket count");
            }
        }

        Ok(())
    }

    /// Fold a remote agent's report, panicking when it does not fit.
    pub fn merge_snapshot(&mut self, snapshot: &AgentSnapshot) {
        if let Err(e) = self.try_merge_snapshot(snapshot) {
            panic!("{}", e);
        }
    }

    /// Render one report line for `channel`, triggering its plot hook when
    /// `plot_all` is set.
    pub fn render(
        &self,
        format: &ReportFormat,
        tag: &str,
        channel: Channel,
        interval: usize,
    ) -> String {
        let sampler = self.channel(channel);
        let line = format.line(tag, sampler, interval);
        if self.plot_all {
            sampler.plot(tag, self.throughput());
        }
        line
    }

    /// Header plus one line per channel for `interval`.
    pub fn render_table(&self, format: &ReportFormat, interval: usize) -> String {
        let mut out = format.header();
        for channel in Channel::ALL {
            out.push('\n');
            out.push_str(&self.render(format, channel.tag(), channel, interval));
        }
        out
    }
}
