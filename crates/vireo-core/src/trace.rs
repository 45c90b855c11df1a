use crate::errors::{ConfigError, CoreResult};

/// One piecewise-constant bandwidth period of a network trace.
///
/// `duration` is in milliseconds, `bandwidth` in kbps (bits per
/// millisecond), `latency` an optional per-request round-trip in
/// milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkPeriod {
    pub duration: f64,
    pub bandwidth: f64,
    pub latency: Option<f64>,
}

impl NetworkPeriod {
    pub fn new(duration: f64, bandwidth: f64) -> Self {
        Self {
            duration,
            bandwidth,
            latency: None,
        }
    }

    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// An ordered, non-empty bandwidth trace.
///
/// The simulator treats a trace as cyclic: after the last period it wraps
/// back to index 0, so a short trace can drive arbitrarily long playback.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    periods: Vec<NetworkPeriod>,
}

impl Trace {
    pub fn new(periods: Vec<NetworkPeriod>) -> CoreResult<Self> {
        if periods.is_empty() {
            return Err(ConfigError::EmptyTrace);
        }
        for (index, period) in periods.iter().enumerate() {
            if !(period.duration > 0.0) {
                return Err(ConfigError::NonPositivePeriodDuration {
                    index,
                    duration: period.duration,
                });
            }
            if !(period.bandwidth > 0.0) {
                return Err(ConfigError::NonPositivePeriodBandwidth {
                    index,
                    bandwidth: period.bandwidth,
                });
            }
            if let Some(latency) = period.latency {
                if latency < 0.0 {
                    return Err(ConfigError::NegativePeriodLatency { index, latency });
                }
            }
        }
        Ok(Self { periods })
    }

    pub fn periods(&self) -> &[NetworkPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// A validated trace is never empty; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn period(&self, index: usize) -> NetworkPeriod {
        self.periods[index]
    }
}
