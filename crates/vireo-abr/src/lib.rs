//! Buffer-based adaptive bitrate control.
//!
//! The controller ranks quality levels by a buffer-vs-utility score
//! (a BOLA-style Lyapunov tradeoff) and exposes three decision points:
//! per-segment quality selection with optional start delay, a
//! mid-download abandonment check, and seek reporting. A bounded
//! bandwidth signal filter sits between the external predictor and the
//! controller to absorb oscillation and single-sample drops.

#![forbid(unsafe_code)]

mod controller;
mod filter;
mod params;
mod predictor;

pub use controller::{
    AbrController, AbrOptions, DownloadProgress, QualityDecision, SelectionPolicy, UpshiftPolicy,
};
pub use filter::{BandwidthFilter, FilterOptions};
pub use params::{ControllerParams, SafetyMargins};
pub use predictor::{PredictionError, PredictionSample, PredictionWindow, Predictor};
