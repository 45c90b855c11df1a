use thiserror::Error;

/// Construction-time validation errors for manifests and traces.
///
/// These are fatal: a `Manifest` or `Trace` is never partially built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bitrate ladder is empty")]
    EmptyBitrateLadder,

    #[error("bitrate ladder not strictly increasing at index {index}: {prev} >= {next}")]
    BitratesNotIncreasing { index: usize, prev: f64, next: f64 },

    #[error("bitrate at index {index} is non-positive: {bitrate}")]
    NonPositiveBitrate { index: usize, bitrate: f64 },

    #[error("segment {index} has {got} size entries, expected {expected}")]
    SegmentWidthMismatch {
        index: usize,
        got: usize,
        expected: usize,
    },

    #[error("segment {index} quality {quality} has non-positive size: {size}")]
    NonPositiveSegmentSize {
        index: usize,
        quality: usize,
        size: f64,
    },

    #[error("segment duration must be positive, got {0}")]
    NonPositiveSegmentDuration(f64),

    #[error("network trace is empty")]
    EmptyTrace,

    #[error("trace period {index} has non-positive duration: {duration}")]
    NonPositivePeriodDuration { index: usize, duration: f64 },

    #[error("trace period {index} has non-positive bandwidth: {bandwidth}")]
    NonPositivePeriodBandwidth { index: usize, bandwidth: f64 },

    #[error("trace period {index} has negative latency: {latency}")]
    NegativePeriodLatency { index: usize, latency: f64 },
}

/// Errors from Vp/gp derivation (degenerate buffer target or ladder).
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("effective buffer target {buffer} does not exceed min buffer {min_buffer}")]
    DegenerateBufferTarget { buffer: f64, min_buffer: f64 },

    #[error("derived {name} is non-positive: {value}")]
    NonPositiveParameter { name: &'static str, value: f64 },
}

pub type CoreResult<T> = Result<T, ConfigError>;
