use crate::errors::{ConfigError, CoreResult};

/// Content manifest: bitrate ladder and per-segment sizes.
///
/// Bitrates are in kbps, sizes in bits and durations in milliseconds, so
/// that `size / bandwidth` is a time in milliseconds. Each row of `segments`
/// holds one size per quality level, aligned with `bitrates`.
///
/// Immutable after construction; all invariants are checked by [`Manifest::new`].
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    segment_duration: f64,
    bitrates: Vec<f64>,
    segments: Vec<Vec<f64>>,
}

impl Manifest {
    pub fn new(
        segment_duration: f64,
        bitrates: Vec<f64>,
        segments: Vec<Vec<f64>>,
    ) -> CoreResult<Self> {
        if !(segment_duration > 0.0) {
            return Err(ConfigError::NonPositiveSegmentDuration(segment_duration));
        }
        if bitrates.is_empty() {
            return Err(ConfigError::EmptyBitrateLadder);
        }
        for (index, &bitrate) in bitrates.iter().enumerate() {
            if !(bitrate > 0.0) {
                return Err(ConfigError::NonPositiveBitrate { index, bitrate });
            }
        }
        for (index, pair) in bitrates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ConfigError::BitratesNotIncreasing {
                    index: index + 1,
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        for (index, sizes) in segments.iter().enumerate() {
            if sizes.len() != bitrates.len() {
                return Err(ConfigError::SegmentWidthMismatch {
                    index,
                    got: sizes.len(),
                    expected: bitrates.len(),
                });
            }
            for (quality, &size) in sizes.iter().enumerate() {
                if !(size > 0.0) {
                    return Err(ConfigError::NonPositiveSegmentSize {
                        index,
                        quality,
                        size,
                    });
                }
            }
        }

        Ok(Self {
            segment_duration,
            bitrates,
            segments,
        })
    }

    /// Segment duration in milliseconds.
    pub fn segment_duration(&self) -> f64 {
        self.segment_duration
    }

    /// Number of quality levels in the ladder.
    pub fn level_count(&self) -> usize {
        self.bitrates.len()
    }

    /// Number of segments in the content.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn bitrates(&self) -> &[f64] {
        &self.bitrates
    }

    pub fn bitrate(&self, quality: usize) -> f64 {
        self.bitrates[quality]
    }

    /// Size in bits of `segment` encoded at `quality`.
    pub fn segment_size(&self, segment: usize, quality: usize) -> f64 {
        self.segments[segment][quality]
    }
}
