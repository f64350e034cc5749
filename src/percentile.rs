use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal precision declared by a percentile code's magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PercentilePrecision {
    /// `0..=100`, whole percents (`50` is the median)
    Percent,
    /// `101..=1000`, tenths of a percent (`999` is p99.9)
    TenthPercent,
    /// `>1000`, hundredths of a percent (`9999` is p99.99)
    HundredthPercent,
}

impl PercentilePrecision {
    fn of_code(code: u32) -> Self {
        if code <= 100 {
            Self::Percent
        } else if code <= 1000 {
            Self::TenthPercent
        } else {
            Self::HundredthPercent
        }
    }

    fn divisor(self) -> f64 {
        match self {
            Self::Percent => 100.0,
            Self::TenthPercent => 1_000.0,
            Self::HundredthPercent => 10_000.0,
        }
    }
}

/// A percentile of interest, decoded once from its numeric code.
///
/// The numeric code is what users type and what report headers show
/// (`p99`, `p999`); everything inside the crate works with `fraction`.
/// Serializes as the bare code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Percentile {
    code: u32,
    fraction: f64,
    precision: PercentilePrecision,
}

impl Percentile {
    pub fn from_code(code: u32) -> Self {
        let precision = PercentilePrecision::of_code(code);
        Self {
            code,
            fraction: f64::from(code) / precision.divisor(),
            precision,
        }
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    /// Target fraction of the population, `0.5` for the median.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn precision(&self) -> PercentilePrecision {
        self.precision
    }

    /// Rank of this percentile within a population of `count` samples.
    pub fn target(&self, count: u64) -> f64 {
        count as f64 * f64::from(self.code) / self.precision.divisor()
    }

    /// Column label used in report headers, e.g. `p999`.
    pub fn label(&self) -> String {
        format!("p{}", self.code)
    }

    /// Percentiles printed by default in every report line.
    pub fn defaults() -> Vec<Percentile> {
        [1, 5, 10, 50, 90, 95, 99, 999, 9999]
            .into_iter()
            .map(Percentile::from_code)
            .collect()
    }
}

impl From<u32> for Percentile {
    fn from(code: u32) -> Self {
        Self::from_code(code)
    }
}

impl From<Percentile> for u32 {
    fn from(p: Percentile) -> Self {
        p.code
    }
}

impl fmt::Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tiers() {
        let median = Percentile::from_code(50);
        assert_eq!(median.precision(), PercentilePrecision::Percent);
        assert!((median.fraction() - 0.5).abs() < f64::EPSILON);

        let p100 = Percentile::from_code(100);
        assert_eq!(p100.precision(), PercentilePrecision::Percent);
        assert!((p100.fraction() - 1.0).abs() < f64::EPSILON);

        let p999 = Percentile::from_code(999);
        assert_eq!(p999.precision(), PercentilePrecision::TenthPercent);
        assert!((p999.fraction() - 0.999).abs() < 1e-12);

        let p1000 = Percentile::from_code(1000);
        assert_eq!(p1000.precision(), PercentilePrecision::TenthPercent);
        assert!((p1000.fraction() - 1.0).abs() < f64::EPSILON);

        let p9999 = Percentile::from_code(9999);
        assert_eq!(p9999.precision(), PercentilePrecision::HundredthPercent);
        assert!((p9999.fraction() - 0.9999).abs() < 1e-12);
    }

    #[test]
    fn test_label_and_display() {
        assert_eq!(Percentile::from_code(999).label(), "p999");
        assert_eq!(Percentile::from_code(5).to_string(), "p5");
    }

    #[test]
    fn test_serde_as_code() {
        let json = serde_json::to_string(&Percentile::from_code(9999)).unwrap();
        assert_eq!(json, "9999");
        let back: Vec<Percentile> = serde_json::from_str("[50, 999]").unwrap();
        assert_eq!(back[1].precision(), PercentilePrecision::TenthPercent);
    }

    #[test]
    fn test_defaults_order() {
        let codes: Vec<u32> = Percentile::defaults().iter().map(|p| p.code()).collect();
        assert_eq!(codes, vec![1, 5, 10, 50, 90, 95, 99, 999, 9999]);
    }
}
