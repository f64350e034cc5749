//! # Report Rendering
//!
//! Text and structured output for merged statistics.
//!
//! ## Text Table
//!
//! ```text
//! #type       avg     std     min      p1      p5 ...
//! read      215.3    41.9   112.2   136.1   149.7 ...
//! ```
//!
//! Tags are left-justified to 7 characters and every other field is
//! right-justified to 7 characters with one decimal place. Channels with no
//! samples in the interval print `0.0` in every numeric column instead of
//! NaN; the query API itself is not guarded.
//!
//! ## Structured Summary
//!
//! [`StatsSummary`] carries the same numbers plus run counters and is
//! serialized with serde for JSON output.

use crate::percentile::Percentile;
use crate::sampler::HistogramSampler;
use crate::stats::{Channel, ConnectionStats};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::warn;

/// Ordered percentiles of interest shared by every report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFormat {
    pub details: Vec<Percentile>,
}

impl Default for ReportFormat {
    fn default() -> Self {
        Self {
            details: Percentile::defaults(),
        }
    }
}

/// Percentile value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: Percentile,
    pub value_us: f64,
}

/// Latency statistics of one channel in one interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub channel: Channel,
    pub total_samples: u64,
    pub mean_us: f64,
    pub std_dev_us: f64,
    pub min_us: f64,
    pub percentiles: Vec<PercentileValue>,
}

/// Machine-readable report for one interval of an aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    pub interval: usize,
    pub throughput_qps: f64,
    pub duration_secs: f64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub gets: u64,
    pub sets: u64,
    pub get_misses: u64,
    pub skips: u64,
    pub interval_gets: u64,
    pub interval_sets: u64,
    pub read: Option<LatencySummary>,
    pub write: Option<LatencySummary>,
    pub combined: Option<LatencySummary>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ReportFormat {
    pub fn new(details: Vec<Percentile>) -> Self {
        Self { details }
    }

    /// Column header line.
    pub fn header(&self) -> String {
        let mut out = format!("{:<7} {:>7} {:>7} {:>7}", "#type", "avg", "std", "min");
        for p in &self.details {
            let _ = write!(out, " {:>7}", p.label());
        }
        out
    }

    /// One fixed-width line: mean, stddev, minimum, then each percentile.
    ///
    /// The minimum column is the lower edge of the first populated bucket
    /// (the 0th percentile), not [`HistogramSampler::minimum`].
    pub fn line(&self, tag: &str, sampler: &HistogramSampler, interval: usize) -> String {
        if sampler.total(interval) == 0 {
            let mut out = format!("{:<7} {:>7.1} {:>7.1} {:>7.1}", tag, 0.0, 0.0, 0.0);
            for _ in &self.details {
                let _ = write!(out, " {:>7.1}", 0.0);
            }
            return out;
        }

        let mut out = format!(
            "{:<7} {:>7.1} {:>7.1} {:>7.1}",
            tag,
            sampler.average(interval),
            sampler.stddev(interval),
            sampler.quantile(Percentile::from_code(0), interval)
        );
        for &p in &self.details {
            let _ = write!(out, " {:>7.1}", sampler.quantile(p, interval));
        }
        out
    }

    /// Structured counterpart of [`ReportFormat::line`]; `None` when empty.
    pub fn summarize(
        &self,
        channel: Channel,
        sampler: &HistogramSampler,
        interval: usize,
    ) -> Option<LatencySummary> {
        let total_samples = sampler.total(interval);
        if total_samples == 0 {
            return None;
        }

        let percentiles = self
            .details
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value_us: sampler.quantile(p, interval),
            })
            .collect();

        Some(LatencySummary {
            channel,
            total_samples,
            mean_us: sampler.average(interval),
            std_dev_us: sampler.stddev(interval),
            min_us: sampler.quantile(Percentile::from_code(0), interval),
            percentiles,
        })
    }
}

/// Ratio as a percentage, 0 when the denominator is empty.
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl ConnectionStats {
    /// Run trailer: throughput, misses, skipped transmissions and bandwidth.
    pub fn render_totals(&self) -> String {
        let duration = self.duration();
        let ops = self.gets + self.sets;
        let per_sec = |count: u64| {
            if duration > 0.0 {
                count as f64 / duration
            } else {
                0.0
            }
        };
        if duration <= 0.0 {
            warn!(
                start = self.start,
                stop = self.stop,
                "run span is not positive, rates reported as zero"
            );
        }

        let mb = 1024.0 * 1024.0;
        let mut out = String::new();
        let _ = writeln!(out, "Total QPS = {:.1} ({} / {:.1}s)", per_sec(ops), ops, duration);
        let _ = writeln!(
            out,
            "Misses = {} ({:.1}%)",
            self.get_misses,
            percent(self.get_misses, self.gets)
        );
        let _ = writeln!(
            out,
            "Skipped TXs = {} ({:.1}%)",
            self.skips,
            percent(self.skips, ops + self.skips)
        );
        let _ = writeln!(
            out,
            "RX {:>10} bytes : {:>6.1} MB/s",
            self.rx_bytes,
            per_sec(self.rx_bytes) / mb
        );
        let _ = write!(
            out,
            "TX {:>10} bytes : {:>6.1} MB/s",
            self.tx_bytes,
            per_sec(self.tx_bytes) / mb
        );
        out
    }

    /// Serializable summary of `interval`.
    pub fn summary(&self, format: &ReportFormat, interval: usize) -> StatsSummary {
        StatsSummary {
            interval,
            throughput_qps: self.throughput(),
            duration_secs: self.duration(),
            rx_bytes: self.rx_bytes,
            tx_bytes: self.tx_bytes,
            gets: self.gets,
            sets: self.sets,
            get_misses: self.get_misses,
            skips: self.skips,
            interval_gets: self.gets_dyn[interval],
            interval_sets: self.sets_dyn[interval],
            read: format.summarize(Channel::Read, &self.read_sampler, interval),
            write: format.summarize(Channel::Write, &self.write_sampler, interval),
            combined: format.summarize(Channel::Combined, &self.combined_sampler, interval),
            timestamp: chrono::Utc::now(),
        }
    }
}
