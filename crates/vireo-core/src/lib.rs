#![forbid(unsafe_code)]

mod errors;
mod manifest;
mod trace;

pub use errors::{ConfigError, CoreResult, ParameterError};
pub use manifest::Manifest;
pub use trace::{NetworkPeriod, Trace};
