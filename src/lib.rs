//! # Load Generator Statistics Core
//!
//! Latency bookkeeping for a network load generator. Workers record the
//! elapsed time of every completed request into a compact logarithmic
//! histogram, measurements are partitioned into time windows ("intervals")
//! so latency can be tracked while the offered load changes, and partial
//! statistics from local workers or remote agents are merged into one report.
//!
//! ## Architecture Overview
//!
//! The library is organized into several key modules:
//!
//! - `sampler`: Logarithmic-bucket histogram with per-interval state
//! - `snapshot`: Raw counters shipped by a remote measurement agent
//! - `stats`: Per-connection/run aggregate owning three samplers plus counters
//! - `report`: Fixed-width text rendering and serializable summaries
//! - `percentile`: Percentile codes (`50`, `999`, `9999`) as structured values
//! - `config`: Serde-backed configuration for building aggregates
//! - `logging`: Colorized `tracing` formatter for embedding applications
//!
//! ## Usage Example
//!
//! ```rust
//! use loadgen_stats::{ConnectionStats, Operation, Percentile, ReportFormat};
//!
//! let mut stats = ConnectionStats::new(true, 1);
//! stats.start = 0.0;
//! for i in 0..100u32 {
//!     let op = Operation::new(0.0, 0.000_1 + f64::from(i) * 0.000_01, 0);
//!     stats.log_read(&op);
//! }
//! stats.stop = 1.0;
//!
//! let format = ReportFormat::default();
//! println!("{}", format.header());
//! println!("{}", stats.render(&format, "read", loadgen_stats::Channel::Read, 0));
//! assert_eq!(stats.gets, 100);
//! assert!(stats.quantile(Percentile::from_code(50), 0) > 100.0);
//! ```
//!
//! ## Units
//!
//! Latencies are recorded in microseconds. Bucket `i` covers
//! `[1.08^i, 1.08^(i+1))` µs, so the default 200 buckets reach about 4.8 s.
//! Run start/stop timestamps are wall-clock seconds.

/// Configuration for building aggregates and reports
///
/// Loaded from JSON with serde. Provides:
/// - Interval count and bucket count with validation
/// - Sampling and raw-sample retention switches
/// - The ordered list of percentiles printed in every report line
pub mod config;

/// Error types returned by the checked construction and merge paths
pub mod error;

pub mod logging;

/// Timed operation capability consumed by the samplers
pub mod operation;

/// Percentile codes and their structured representation
pub mod percentile;

/// Report rendering
///
/// Produces the fixed-width text table and JSON-ready summaries:
/// - Header and per-channel lines with a zero guard for empty channels
/// - Run totals (throughput, misses, skipped operations, bandwidth)
/// - Serializable `StatsSummary` for machine-readable output
pub mod report;

/// Logarithmic histogram sampler
///
/// The quantile estimation engine. Provides:
/// - O(1) insertion into per-interval log-spaced buckets
/// - Mean, standard deviation, minimum and interpolated percentiles
/// - Shape-checked merging for fan-in of worker histograms
pub mod sampler;

/// Agent snapshot wire shape
pub mod snapshot;

/// Per-connection statistics aggregate
///
/// Owns the read, write and combined samplers together with byte and
/// operation counters, and implements peer and snapshot merging.
pub mod stats;

pub use config::StatsConfig;
pub use error::StatsError;
pub use operation::{Operation, RetainedSample, TimedOperation};
pub use percentile::{Percentile, PercentilePrecision};
pub use report::{LatencySummary, PercentileValue, ReportFormat, StatsSummary};
pub use sampler::HistogramSampler;
pub use snapshot::{AgentSnapshot, BaseCounters};
pub use stats::{Channel, ConnectionStats};

/// The current version of the statistics core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// The bucket layout constants are part of the agent wire format and the
/// report contract; changing them breaks interoperation with existing agents.
pub mod defaults {
    /// Number of buckets per interval in reports and agent snapshots
    ///
    /// At bucket 200 the latency is above 4 seconds.
    pub const BINS: usize = 200;

    /// Upper bound on the number of intervals a sampler can track
    pub const MAX_INTERVALS: usize = 32;

    /// Ratio between consecutive bucket edges (about 8% resolution)
    pub const BUCKET_BASE: f64 = 1.08;

    /// Default number of intervals when none is configured
    pub const INTERVALS: usize = 1;
}
