use vireo_core::{Manifest, ParameterError};

/// Safety constants for the margin-based derivation mode, in milliseconds
/// of buffer. The floor guarantees headroom for every rung of the ladder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafetyMargins {
    pub min_buffer: f64,
    pub min_buffer_per_level: f64,
}

impl Default for SafetyMargins {
    fn default() -> Self {
        Self {
            min_buffer: 10_000.0,
            min_buffer_per_level: 2_000.0,
        }
    }
}

/// Derived controller parameters: the zero-based log utility table and
/// the Vp/gp pair trading buffer occupancy against bitrate utility.
///
/// Two explicit derivation modes exist and are never mixed:
/// [`ControllerParams::with_safety_margin`] derives gp from the ladder and
/// a floored buffer target, [`ControllerParams::with_fixed_gp`] takes gp
/// from the caller.
#[derive(Clone, Debug)]
pub struct ControllerParams {
    utilities: Vec<f64>,
    vp: f64,
    gp: f64,
    buffer_size: f64,
}

fn utility_table(manifest: &Manifest) -> Vec<f64> {
    let base = manifest.bitrate(0).ln();
    manifest.bitrates().iter().map(|b| b.ln() - base).collect()
}

impl ControllerParams {
    /// Derive gp and Vp from the ladder and a buffer target floored at
    /// `min_buffer + min_buffer_per_level * levels`.
    ///
    /// Fails when the effective buffer does not exceed `min_buffer` or the
    /// ladder is too flat for a positive gp (top utility <= 1).
    pub fn with_safety_margin(
        manifest: &Manifest,
        target_buffer: f64,
        margins: SafetyMargins,
    ) -> Result<Self, ParameterError> {
        let utilities = utility_table(manifest);
        let floor =
            margins.min_buffer + margins.min_buffer_per_level * manifest.level_count() as f64;
        let buffer = target_buffer.max(floor);
        if buffer <= margins.min_buffer {
            return Err(ParameterError::DegenerateBufferTarget {
                buffer,
                min_buffer: margins.min_buffer,
            });
        }

        let top_utility = *utilities.last().expect("manifest ladder is non-empty");
        let gp = (top_utility - 1.0) / (buffer / margins.min_buffer - 1.0);
        if gp <= 0.0 {
            return Err(ParameterError::NonPositiveParameter {
                name: "gp",
                value: gp,
            });
        }
        let vp = margins.min_buffer / gp;

        Ok(Self {
            utilities,
            vp,
            gp,
            buffer_size: buffer,
        })
    }

    /// Take gp as given and derive `Vp = (buffer - segment_duration) /
    /// (top_utility + gp)`.
    pub fn with_fixed_gp(
        manifest: &Manifest,
        buffer_size: f64,
        gp: f64,
    ) -> Result<Self, ParameterError> {
        if gp <= 0.0 {
            return Err(ParameterError::NonPositiveParameter {
                name: "gp",
                value: gp,
            });
        }
        let utilities = utility_table(manifest);
        let top_utility = *utilities.last().expect("manifest ladder is non-empty");
        let vp = (buffer_size - manifest.segment_duration()) / (top_utility + gp);
        if vp <= 0.0 {
            return Err(ParameterError::NonPositiveParameter {
                name: "Vp",
                value: vp,
            });
        }

        Ok(Self {
            utilities,
            vp,
            gp,
            buffer_size,
        })
    }

    pub fn utilities(&self) -> &[f64] {
        &self.utilities
    }

    pub fn utility(&self, quality: usize) -> f64 {
        self.utilities[quality]
    }

    pub fn vp(&self) -> f64 {
        self.vp
    }

    pub fn gp(&self) -> f64 {
        self.gp
    }

    /// Effective buffer target the current Vp was derived for.
    pub fn buffer_size(&self) -> f64 {
        self.buffer_size
    }

    /// Re-derive Vp in fixed-gp form for a shrunk buffer target, keeping gp.
    ///
    /// Used when the playback horizon shrinks near content boundaries. The
    /// caller keeps `buffer_size > segment_duration`, so Vp stays positive.
    pub(crate) fn shrink_to_buffer(&mut self, buffer_size: f64, segment_duration: f64) {
        let top_utility = *self.utilities.last().expect("utility table is non-empty");
        self.buffer_size = buffer_size;
        self.vp = (buffer_size - segment_duration) / (top_utility + self.gp);
        debug_assert!(self.vp > 0.0, "shrunk Vp must stay positive");
    }
}
