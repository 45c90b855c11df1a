/// QoE metrics accumulated over one playback run.
///
/// Times are in milliseconds, bitrates in kbps. All fields are plain
/// accumulators; derived ratios live on the methods.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Metrics {
    pub segments_played: usize,
    pub total_play_time: f64,
    /// Time spent filling the buffer before the first segment was ready.
    pub startup_time: f64,
    pub total_rebuffer: f64,
    pub rebuffer_events: u64,
    pub total_played_bitrate: f64,
    pub total_played_utility: f64,
    /// Sum of absolute bitrate deltas between consecutive segments; the
    /// oscillation measure.
    pub total_bitrate_change: f64,
    pub abandonments: u64,
    pub prediction_failures: u64,
}

impl Metrics {
    /// Mean bitrate over the segments played, in kbps.
    pub fn average_bitrate(&self) -> f64 {
        if self.segments_played == 0 {
            0.0
        } else {
            self.total_played_bitrate / self.segments_played as f64
        }
    }

    /// Share of wall-clock time spent stalled.
    pub fn rebuffer_ratio(&self) -> f64 {
        let total = self.total_play_time + self.total_rebuffer;
        if total <= 0.0 {
            0.0
        } else {
            self.total_rebuffer / total
        }
    }

    pub fn rebuffered(&self) -> bool {
        self.total_rebuffer > 0.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn empty_metrics_have_zero_ratios() {
        let m = Metrics::default();
        assert_eq!(m.average_bitrate(), 0.0);
        assert_eq!(m.rebuffer_ratio(), 0.0);
        assert!(!m.rebuffered());
    }

    #[rstest]
    #[case(8000.0, 2000.0, 0.2)]
    #[case(8000.0, 0.0, 0.0)]
    #[case(0.0, 2000.0, 1.0)]
    fn rebuffer_ratio_over_wall_clock(
        #[case] play: f64,
        #[case] rebuffer: f64,
        #[case] expected: f64,
    ) {
        let m = Metrics {
            total_play_time: play,
            total_rebuffer: rebuffer,
            ..Metrics::default()
        };
        assert_eq!(m.rebuffer_ratio(), expected);
    }

    #[test]
    fn ratios_follow_accumulators() {
        let m = Metrics {
            segments_played: 4,
            total_play_time: 8000.0,
            total_rebuffer: 2000.0,
            total_played_bitrate: 6000.0,
            ..Metrics::default()
        };
        assert_eq!(m.average_bitrate(), 1500.0);
        assert_eq!(m.rebuffer_ratio(), 0.2);
        assert!(m.rebuffered());
    }
}
