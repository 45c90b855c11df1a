use thiserror::Error;
use vireo_core::Trace;

/// Recoverable per-segment failures of the external bandwidth predictor.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("predictor timed out")]
    Timeout,

    #[error("predictor unavailable: {0}")]
    Unavailable(String),

    #[error("predictor returned an invalid estimate: {0}")]
    InvalidEstimate(f64),
}

/// One normalized window entry fed to the predictor: raw milliseconds and
/// kbps divided by 1000, plus their product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictionSample {
    pub volume: f64,
    pub time: f64,
    pub bandwidth: f64,
}

impl PredictionSample {
    const ZERO: Self = Self {
        volume: 0.0,
        time: 0.0,
        bandwidth: 0.0,
    };
}

/// Fixed-length input window for the bandwidth predictor.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionWindow {
    samples: Vec<PredictionSample>,
}

impl PredictionWindow {
    /// Collect the `window` trace periods preceding `segment_index`,
    /// normalized, with zero padding in front when the trace has not run
    /// long enough yet.
    pub fn from_trace(trace: &Trace, segment_index: usize, window: usize) -> Self {
        let start = segment_index.saturating_sub(window);
        let mut samples = Vec::with_capacity(window);
        for i in start..segment_index.min(trace.len()) {
            let period = trace.period(i);
            let time = period.duration / 1000.0;
            let bandwidth = period.bandwidth / 1000.0;
            samples.push(PredictionSample {
                volume: time * bandwidth,
                time,
                bandwidth,
            });
        }
        if samples.len() < window {
            let mut padded = vec![PredictionSample::ZERO; window - samples.len()];
            padded.append(&mut samples);
            samples = padded;
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[PredictionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The external bandwidth-predictor boundary.
///
/// The simulation never assumes in-process computation: implementations
/// may call out to a service or model session, enforce their own timeout,
/// and report failures through [`PredictionError`] instead of substituting
/// a numeric default.
pub trait Predictor {
    /// Map a window of recent normalized trace samples to a bandwidth
    /// estimate in kbps.
    fn predict(&mut self, window: &PredictionWindow) -> Result<f64, PredictionError>;
}
