use simple_error::SimpleError;
use thiserror::Error;

use crate::simulator::SimulationResult;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] SimpleError),

    #[error("voltage starts above threshold: voltage_t0 ({voltage}) threshold_t0 ({threshold})")]
    BadInitialization { voltage: f64, threshold: f64 },

    /// Carries everything simulated up to the failure, spliced into full-length arrays.
    #[error("{message} (interval starting at step {interval_start})")]
    InvalidState {
        message: String,
        interval_start: usize,
        partial: Box<SimulationResult>,
    },

    #[error("internal consistency error: {0}")]
    InternalConsistency(String),
}

impl SimulationError {
    pub fn partial_result(&self) -> Option<&SimulationResult> {
        match self {
            Self::InvalidState { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }

    /// How far the initial voltage lies above the initial threshold.
    pub fn initial_overshoot(&self) -> Option<f64> {
        match self {
            Self::BadInitialization { voltage, threshold } => Some(voltage - threshold),
            _ => None,
        }
    }
}
