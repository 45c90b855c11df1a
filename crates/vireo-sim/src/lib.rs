//! Per-segment playback simulation loop.
//!
//! Drives filter → predictor → controller → download simulator for every
//! segment of a manifest, applies start delays and abandonment restarts,
//! and accumulates QoE metrics. Given identical inputs the full decision
//! sequence is reproducible bit-for-bit.

#![forbid(unsafe_code)]

mod errors;
mod metrics;
mod session;

pub use errors::{SimResult, SimulationError};
pub use metrics::Metrics;
pub use session::{PlaybackSession, SessionOptions};
