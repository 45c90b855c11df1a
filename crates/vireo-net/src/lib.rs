//! Deterministic download/network simulator.
//!
//! Consumes a cyclic bandwidth trace as piecewise-constant capacity and
//! turns requested transfer sizes into elapsed wall-clock time. The
//! cursor persists across calls, so consecutive downloads and delays
//! model one continuous timeline.

#![forbid(unsafe_code)]

mod simulator;

pub use simulator::{buffer_level, DownloadResult, NetworkModel};
