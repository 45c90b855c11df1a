use std::collections::VecDeque;

use tracing::debug;

/// Tuning for the bandwidth signal filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterOptions {
    /// History capacity W; oscillation detection needs a full window.
    pub window: usize,
    /// Smoothing weight applied to older samples.
    pub alpha: f64,
    /// Estimate returned before any sample has been observed, in kbps.
    pub initial_estimate: f64,
    /// Relative single-step drop that forces the smoothed value.
    pub drop_ratio: f64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            window: 10,
            alpha: 0.1,
            initial_estimate: 1000.0,
            drop_ratio: 0.5,
        }
    }
}

/// Bounded-history filter between the raw bandwidth predictor and the
/// controller.
///
/// Raw estimates pass through unchanged until the history turns
/// oscillatory or a single sample drops by more than `drop_ratio`
/// relative to its predecessor; then the smoothed value is substituted so
/// one noisy sample cannot steer a quality decision.
#[derive(Clone, Debug)]
pub struct BandwidthFilter {
    opts: FilterOptions,
    history: VecDeque<f64>,
}

impl BandwidthFilter {
    pub fn new(opts: FilterOptions) -> Self {
        Self {
            history: VecDeque::with_capacity(opts.window),
            opts,
        }
    }

    /// Record a raw estimate and return the value the controller should see.
    pub fn observe(&mut self, raw: f64) -> f64 {
        let prev = self.history.back().copied();
        if self.history.len() == self.opts.window {
            self.history.pop_front();
        }
        self.history.push_back(raw);

        let sudden_drop = prev.is_some_and(|p| p > 0.0 && (p - raw) / p > self.opts.drop_ratio);
        if self.detect_oscillation() || sudden_drop {
            let smoothed = self.smooth();
            debug!(raw, smoothed, sudden_drop, "bandwidth estimate filtered");
            smoothed
        } else {
            raw
        }
    }

    /// True iff the history is full and holds both a strict adjacent rise
    /// and a strict adjacent fall. Equal neighbours count as neither.
    pub fn detect_oscillation(&self) -> bool {
        if self.history.len() < self.opts.window {
            return false;
        }
        let mut rose = false;
        let mut fell = false;
        for i in 1..self.history.len() {
            if self.history[i] > self.history[i - 1] {
                rose = true;
            } else if self.history[i] < self.history[i - 1] {
                fell = true;
            }
        }
        rose && fell
    }

    /// Reverse exponential smoothing seeded from the newest sample: older
    /// samples are folded in walking toward index 0, so the most recent
    /// ones carry the most weight.
    pub fn smooth(&self) -> f64 {
        let Some(&newest) = self.history.back() else {
            return self.opts.initial_estimate;
        };
        let mut smoothed = newest;
        for i in (0..self.history.len() - 1).rev() {
            smoothed = self.opts.alpha * self.history[i] + (1.0 - self.opts.alpha) * smoothed;
        }
        smoothed
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
