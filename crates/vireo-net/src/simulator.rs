use std::sync::Arc;

use tracing::debug;
use vireo_core::Trace;

/// Outcome of one (possibly abandoned) simulated transfer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DownloadResult {
    /// Wall-clock milliseconds consumed by the transfer.
    pub elapsed: f64,
    /// Bits actually delivered; equals the requested size unless the
    /// transfer was abandoned.
    pub downloaded: f64,
    /// Quality the abandonment check redirected to, if it fired.
    pub abandon_to: Option<usize>,
}

/// Resumable cursor over a cyclic piecewise-constant bandwidth trace.
///
/// The trace wraps to period 0 after the last period by design, so a
/// short trace drives arbitrarily long playback. Trace validation
/// guarantees positive bandwidths, so every transfer terminates.
#[derive(Clone, Debug)]
pub struct NetworkModel {
    trace: Arc<Trace>,
    period_index: usize,
    /// Milliseconds left in the current period.
    time_to_next: f64,
    total_time: f64,
}

impl NetworkModel {
    pub fn new(trace: Arc<Trace>) -> Self {
        let time_to_next = trace.period(0).duration;
        Self {
            trace,
            period_index: 0,
            time_to_next,
            total_time: 0.0,
        }
    }

    /// Download `size` bits and return the elapsed milliseconds.
    pub fn download(&mut self, size: f64) -> f64 {
        self.download_with(size, |_, _| None).elapsed
    }

    /// Download `size` bits, invoking `check` with the bits delivered and
    /// milliseconds elapsed at every trace-period boundary crossed
    /// mid-transfer. A `Some` return aborts the transfer there.
    pub fn download_with(
        &mut self,
        size: f64,
        mut check: impl FnMut(f64, f64) -> Option<usize>,
    ) -> DownloadResult {
        if size <= 0.0 {
            return DownloadResult {
                elapsed: 0.0,
                downloaded: 0.0,
                abandon_to: None,
            };
        }

        let mut elapsed = 0.0;
        let mut downloaded = 0.0;
        let mut abandon_to = None;
        loop {
            let period = self.trace.period(self.period_index);
            let capacity = period.bandwidth * self.time_to_next;
            let remaining = size - downloaded;
            if remaining <= capacity {
                let time = remaining / period.bandwidth;
                self.time_to_next -= time;
                elapsed += time;
                downloaded = size;
                if self.time_to_next <= 0.0 {
                    self.advance_period();
                }
                break;
            }

            downloaded += capacity;
            elapsed += self.time_to_next;
            self.advance_period();

            if let Some(target) = check(downloaded, elapsed) {
                abandon_to = Some(target);
                break;
            }
        }

        self.total_time += elapsed;
        debug!(
            size,
            downloaded,
            elapsed,
            abandoned = abandon_to.is_some(),
            "transfer finished"
        );
        DownloadResult {
            elapsed,
            downloaded,
            abandon_to,
        }
    }

    /// Advance the cursor by `time` milliseconds without transferring
    /// anything (latency, deliberate start delays).
    pub fn delay(&mut self, time: f64) {
        if time <= 0.0 {
            return;
        }
        let mut left = time;
        while left >= self.time_to_next {
            left -= self.time_to_next;
            self.advance_period();
        }
        self.time_to_next -= left;
        self.total_time += time;
    }

    /// Latency of the period the cursor currently sits in, if the trace
    /// carries one.
    pub fn current_latency(&self) -> Option<f64> {
        self.trace.period(self.period_index).latency
    }

    pub fn period_index(&self) -> usize {
        self.period_index
    }

    /// Total wall-clock milliseconds consumed since construction.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    fn advance_period(&mut self) {
        self.period_index = (self.period_index + 1) % self.trace.len();
        self.time_to_next = self.trace.period(self.period_index).duration;
    }
}

/// Buffer occupancy reported to the controller, clamped at zero.
///
/// A negative raw value means playback stalled; the shortfall is
/// rebuffering, tracked by the session as a metric rather than fed into
/// scoring.
pub fn buffer_level(segments_buffered: usize, consumed_time: f64, segment_duration: f64) -> f64 {
    (segments_buffered as f64 * segment_duration - consumed_time).max(0.0)
}
