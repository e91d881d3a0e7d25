use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use simple_error::SimpleError;

use crate::spike_geometry::{line_crossing, ModelSpike};

/// How to guess a model spike time when the model did not cross threshold within an interval.
/// Both methods draw a line from an early sample of the interval to the one-past-end sample
/// and intersect the voltage line with the threshold line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationMethod {
    /// Line from the first sample of the interval.
    #[default]
    Endpoints,
    /// Line from the sample one membrane time constant before the end of the interval.
    EndpointsSingleTau,
}

impl ExtrapolationMethod {
    pub fn from_name(name: &str) -> Result<Self, SimpleError> {
        match name {
            "endpoints" => Ok(Self::Endpoints),
            "endpoints_single_tau" => Ok(Self::EndpointsSingleTau),
            _ => Err(SimpleError::new(format!(
                "unknown extrapolation method: {}",
                name
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Endpoints => "endpoints",
            Self::EndpointsSingleTau => "endpoints_single_tau",
        }
    }

    /// Returns `None` only for an empty trajectory. Times are relative to the first sample of
    /// `voltage`; the grid time is the extrapolated time rounded up to the next multiple of `dt`.
    pub fn extrapolate(
        &self,
        tau_membrane: f64,
        voltage: &[f64],
        threshold: &[f64],
        voltage_next: f64,
        threshold_next: f64,
        dt: f64,
    ) -> Option<ModelSpike> {
        let num_steps = voltage.len();
        let last = num_steps.checked_sub(1)?;

        let window_start = match self {
            Self::Endpoints => 0,
            Self::EndpointsSingleTau => {
                let steps_per_tau = (tau_membrane / dt).floor() as usize;
                num_steps.saturating_sub(steps_per_tau).min(last)
            }
        };

        Some(extrapolate_from(
            window_start,
            voltage,
            threshold,
            voltage_next,
            threshold_next,
            dt,
        ))
    }
}

fn extrapolate_from(
    window_start: usize,
    voltage: &[f64],
    threshold: &[f64],
    voltage_next: f64,
    threshold_next: f64,
    dt: f64,
) -> ModelSpike {
    let span = dt * (voltage.len() - window_start) as f64;
    let (offset, interpolated_voltage) = line_crossing(
        span,
        voltage[window_start],
        voltage_next,
        threshold[window_start],
        threshold_next,
    );

    let interpolated_time = dt * window_start as f64 + offset;

    ModelSpike {
        grid_time: (interpolated_time / dt).ceil() * dt,
        grid_voltage: interpolated_voltage,
        interpolated_time,
        interpolated_voltage,
    }
}

impl FromStr for ExtrapolationMethod {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for ExtrapolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
