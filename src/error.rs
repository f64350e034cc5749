use thiserror::Error;

/// Shape and precondition violations detected by the checked APIs.
///
/// The unchecked entry points (`HistogramSampler::new`, `merge`, ...) treat
/// the same conditions as programming errors and panic with this error's
/// message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("bucket count must be positive, got {0}")]
    InvalidBins(usize),

    #[error("interval count must be within 1..={max}, got {got}")]
    InvalidIntervals { got: usize, max: usize },

    #[error("latency must be non-negative, got {0}")]
    NegativeLatency(f64),

    #[error("interval {interval} out of range for {n_intervals} intervals")]
    IntervalOutOfRange { interval: usize, n_intervals: usize },

    #[error(
        "shape mismatch: {left_intervals}x{left_bins} cannot merge {right_intervals}x{right_bins}"
    )]
    ShapeMismatch {
        left_intervals: usize,
        left_bins: usize,
        right_intervals: usize,
        right_bins: usize,
    },

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}
