use thiserror::Error;
use vireo_core::{ConfigError, ParameterError};

/// Simulation errors.
///
/// Construction failures wrap the core validation errors; an
/// `InvariantViolation` indicates an implementation defect and stops the
/// run with enough state for diagnosis. Per-segment prediction failures
/// are handled inside the loop and never surface here.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("simulation invariant violated: {0}")]
    InvariantViolation(String),
}

pub type SimResult<T> = Result<T, SimulationError>;
