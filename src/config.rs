use crate::defaults;
use crate::error::StatsError;
use crate::percentile::Percentile;
use crate::report::ReportFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Settings for building a `ConnectionStats` and its reports.
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```json
/// { "n_intervals": 8, "percentiles": [50, 99, 999] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Number of time windows, `1..=32`
    pub n_intervals: usize,
    /// Buckets per interval; agent snapshots require the default
    pub n_bins: usize,
    /// Feed latency samplers (counters are always kept)
    pub sampling: bool,
    /// Retain every sampled operation for export
    pub save_samples: bool,
    /// Invoke the plot hook for every rendered line
    pub plot_all: bool,
    /// Percentile codes printed in each report line
    pub percentiles: Vec<Percentile>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            n_intervals: defaults::INTERVALS,
            n_bins: defaults::BINS,
            sampling: true,
            save_samples: false,
            plot_all: false,
            percentiles: Percentile::defaults(),
        }
    }
}

impl StatsConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing stats configuration")?;
        config.validate()?;
        debug!("Loaded stats configuration: {:?}", config);
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading stats configuration {:?}", path))?;
        Self::from_json_str(&json).with_context(|| format!("in {:?}", path))
    }

    /// Check the histogram shape bounds.
    pub fn validate(&self) -> Result<(), StatsError> {
        if self.n_bins == 0 {
            return Err(StatsError::InvalidBins(self.n_bins));
        }
        if self.n_intervals == 0 || self.n_intervals > defaults::MAX_INTERVALS {
            return Err(StatsError::InvalidIntervals {
                got: self.n_intervals,
                max: defaults::MAX_INTERVALS,
            });
        }
        if self.n_bins != defaults::BINS {
            warn!(
                n_bins = self.n_bins,
                "non-standard bucket count, agent snapshots will be rejected"
            );
        }
        Ok(())
    }

    pub fn report_format(&self) -> ReportFormat {
        ReportFormat::new(self.percentiles.clone())
    }
}
