use std::sync::Arc;

use tracing::{debug, warn};
use vireo_abr::{
    AbrController, AbrOptions, BandwidthFilter, ControllerParams, DownloadProgress, FilterOptions,
    PredictionWindow, Predictor,
};
use vireo_core::{Manifest, Trace};
use vireo_net::NetworkModel;

use crate::errors::{SimResult, SimulationError};
use crate::metrics::Metrics;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionOptions {
    pub abr: AbrOptions,
    pub filter: FilterOptions,
    /// Window size W handed to the predictor.
    pub predictor_window: usize,
    /// Charge the current trace period's latency before each download.
    pub apply_latency: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            abr: AbrOptions::default(),
            filter: FilterOptions::default(),
            predictor_window: 10,
            apply_latency: true,
        }
    }
}

/// One deterministic playback run over a manifest and a bandwidth trace.
///
/// Owns all mutable state (buffer, bandwidth history, network cursor) and
/// mutates it strictly sequentially; nothing here crosses a thread
/// boundary.
pub struct PlaybackSession<P> {
    manifest: Arc<Manifest>,
    trace: Arc<Trace>,
    controller: AbrController,
    filter: BandwidthFilter,
    predictor: P,
    network: NetworkModel,
    opts: SessionOptions,
    metrics: Metrics,
    segments_buffered: usize,
    consumed_time: f64,
    prev_quality: Option<usize>,
}

impl<P: Predictor> PlaybackSession<P> {
    pub fn new(
        manifest: Arc<Manifest>,
        trace: Arc<Trace>,
        params: ControllerParams,
        predictor: P,
        opts: SessionOptions,
    ) -> Self {
        let controller = AbrController::new(Arc::clone(&manifest), params, opts.abr);
        let filter = BandwidthFilter::new(opts.filter);
        let network = NetworkModel::new(Arc::clone(&trace));
        Self {
            manifest,
            trace,
            controller,
            filter,
            predictor,
            network,
            opts,
            metrics: Metrics::default(),
            segments_buffered: 0,
            consumed_time: 0.0,
            prev_quality: None,
        }
    }

    /// Play the whole manifest and return the accumulated metrics.
    pub fn run(&mut self) -> SimResult<Metrics> {
        for segment_index in 0..self.manifest.segment_count() {
            self.step(segment_index)?;
        }
        self.metrics.abandonments = self.controller.abandonment_count();
        Ok(self.metrics)
    }

    fn step(&mut self, segment_index: usize) -> SimResult<()> {
        let segment_duration = self.manifest.segment_duration();
        let estimate = self.estimate_bandwidth(segment_index);

        let level = self.buffer_level();
        let decision = self.controller.decide(segment_index, level, estimate);
        if decision.start_delay > 0.0 {
            // Deliberate idle time: the buffer drains but this is not a
            // stall, the delay never exceeds the current occupancy.
            self.network.delay(decision.start_delay);
            self.account(decision.start_delay, segment_index);
        }

        if self.opts.apply_latency {
            if let Some(latency) = self.network.current_latency() {
                self.network.delay(latency);
                self.account(latency, segment_index);
            }
        }

        let mut quality = decision.quality;
        loop {
            let size = self.manifest.segment_size(segment_index, quality);
            let controller = &mut self.controller;
            let segments_buffered = self.segments_buffered;
            let consumed = self.consumed_time;
            let result = self.network.download_with(size, |downloaded, elapsed| {
                let level =
                    vireo_net::buffer_level(segments_buffered, consumed + elapsed, segment_duration);
                let progress = DownloadProgress {
                    segment_index,
                    quality,
                    total_size: size,
                    downloaded,
                    elapsed_time: elapsed,
                };
                controller.check_abandon(&progress, level)
            });
            self.account(result.elapsed, segment_index);

            match result.abandon_to {
                None => break,
                Some(target) => {
                    if target >= quality || target >= self.manifest.level_count() {
                        return Err(SimulationError::InvariantViolation(format!(
                            "abandonment target {target} outside valid range for segment \
                             {segment_index} in flight at quality {quality}"
                        )));
                    }
                    debug!(segment_index, from = quality, to = target, "restarting download");
                    quality = target;
                }
            }
        }

        self.segments_buffered += 1;
        if segment_index == 0 {
            // Playback starts once the first segment is ready; the wall
            // time before that is startup, not playhead time.
            self.consumed_time = 0.0;
        }
        self.metrics.segments_played += 1;
        self.metrics.total_play_time += segment_duration;
        self.metrics.total_played_bitrate += self.manifest.bitrate(quality);
        self.metrics.total_played_utility += self.controller.params().utility(quality);
        if let Some(prev) = self.prev_quality {
            self.metrics.total_bitrate_change +=
                (self.manifest.bitrate(quality) - self.manifest.bitrate(prev)).abs();
        }
        self.prev_quality = Some(quality);
        Ok(())
    }

    /// Raw prediction filtered through the signal filter; on failure the
    /// smoothed history value substitutes for the estimate and the failure
    /// is recorded, never a zero-bandwidth sample.
    fn estimate_bandwidth(&mut self, segment_index: usize) -> f64 {
        let window =
            PredictionWindow::from_trace(&self.trace, segment_index, self.opts.predictor_window);
        match self.predictor.predict(&window) {
            Ok(raw) if raw.is_finite() && raw >= 0.0 => self.filter.observe(raw),
            Ok(raw) => {
                warn!(segment_index, raw, "predictor returned out-of-range estimate");
                self.metrics.prediction_failures += 1;
                self.filter.smooth()
            }
            Err(error) => {
                warn!(segment_index, %error, "bandwidth prediction failed");
                self.metrics.prediction_failures += 1;
                self.filter.smooth()
            }
        }
    }

    fn account(&mut self, elapsed: f64, segment_index: usize) {
        let before = self.shortfall();
        self.consumed_time += elapsed;
        let after = self.shortfall();
        if after > before {
            if segment_index == 0 {
                self.metrics.startup_time += after - before;
            } else {
                self.metrics.total_rebuffer += after - before;
                if before == 0.0 {
                    self.metrics.rebuffer_events += 1;
                }
            }
        }
    }

    fn shortfall(&self) -> f64 {
        (self.consumed_time
            - self.segments_buffered as f64 * self.manifest.segment_duration())
        .max(0.0)
    }

    /// Current buffer occupancy in milliseconds, clamped at zero.
    pub fn buffer_level(&self) -> f64 {
        vireo_net::buffer_level(
            self.segments_buffered,
            self.consumed_time,
            self.manifest.segment_duration(),
        )
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn last_quality(&self) -> usize {
        self.controller.last_quality()
    }

    pub fn total_bitrate_played(&self) -> f64 {
        self.controller.total_bitrate_played()
    }

    pub fn report_seek(&mut self, where_in_time: f64) {
        self.controller.report_seek(where_in_time);
    }
}
