use serde::{Deserialize, Serialize};
use simple_error::{try_with, SimpleError, SimpleResult};

use crate::extrapolation::ExtrapolationMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorParams {
    pub dt: f64,
    pub tau_membrane: f64,
    pub spike_cut_length: usize,
    #[serde(default = "default_refinement_factor")]
    pub refinement_factor: usize,
    #[serde(default)]
    pub extrapolation_method: ExtrapolationMethod,
    pub init_voltage: f64,
    pub init_threshold: f64,
    pub init_after_spike_currents: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGlifParams {
    pub el: f64,
    pub r_input: f64,
    pub c: f64,
    pub asc_tau: Vec<f64>,
    pub asc_amp: Vec<f64>,
    pub th_inf: f64,
    pub th_adapt: f64,
    pub th_decay_rate: f64,
    pub voltage_reset: f64,
    pub threshold_reset_method: ThresholdResetMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdResetMethod {
    /// Threshold returns to its resting value.
    Inf,
    /// Threshold is raised by a fixed amount.
    Adapt,
    /// Like `Adapt`, but the reset is applied with the voltage clamped to the threshold, so the
    /// forced-spike reset starts from the model's own spike condition.
    AdaptSumSlowFast,
}

fn default_refinement_factor() -> usize {
    1
}

impl SimulatorParams {
    pub fn from_yaml_str(yaml: &str) -> SimpleResult<Self> {
        let params: Self = try_with!(serde_yaml::from_str(yaml), "invalid simulator yaml");
        Ok(params)
    }

    pub fn from_json_str(json: &str) -> SimpleResult<Self> {
        let params: Self = try_with!(serde_json::from_str(json), "invalid simulator json");
        Ok(params)
    }

    pub fn to_json_string(&self) -> SimpleResult<String> {
        Ok(try_with!(
            serde_json::to_string_pretty(self),
            "unable to serialize simulator params"
        ))
    }
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self {
            dt: 5e-5,
            tau_membrane: 0.01,
            spike_cut_length: 0,
            refinement_factor: 1,
            extrapolation_method: ExtrapolationMethod::Endpoints,
            init_voltage: 0.0,
            init_threshold: 0.02,
            init_after_spike_currents: vec![0.0, 0.0],
        }
    }
}

impl Default for LinearGlifParams {
    fn default() -> Self {
        Self {
            el: 0.0,
            r_input: 1e8,
            c: 1e-10,
            asc_tau: vec![0.01, 0.1],
            asc_amp: vec![-1e-11, -2e-12],
            th_inf: 0.02,
            th_adapt: 0.005,
            th_decay_rate: 50.0,
            voltage_reset: 0.0,
            threshold_reset_method: ThresholdResetMethod::Inf,
        }
    }
}

pub fn validate_simulator_params(params: &SimulatorParams) -> Result<(), SimpleError> {
    if !(params.dt > 0.0) {
        return Err(SimpleError::new("dt must be strictly positive"));
    }

    if !(params.tau_membrane > 0.0) {
        return Err(SimpleError::new("tau_membrane must be strictly positive"));
    }

    if params.refinement_factor == 0 {
        return Err(SimpleError::new(
            "refinement_factor must be strictly positive",
        ));
    }

    if !params.init_voltage.is_finite() || !params.init_threshold.is_finite() {
        return Err(SimpleError::new(
            "init_voltage and init_threshold must be finite",
        ));
    }

    if params
        .init_after_spike_currents
        .iter()
        .any(|asc| !asc.is_finite())
    {
        return Err(SimpleError::new("init_after_spike_currents must be finite"));
    }

    Ok(())
}

pub fn validate_linear_glif_params(params: &LinearGlifParams) -> Result<(), SimpleError> {
    if !(params.r_input > 0.0) {
        return Err(SimpleError::new("r_input must be strictly positive"));
    }

    if !(params.c > 0.0) {
        return Err(SimpleError::new("c must be strictly positive"));
    }

    if params.asc_tau.len() != params.asc_amp.len() {
        return Err(SimpleError::new(format!(
            "asc_tau has {} entries but asc_amp has {}",
            params.asc_tau.len(),
            params.asc_amp.len()
        )));
    }

    if params.asc_tau.iter().any(|tau| !(*tau > 0.0)) {
        return Err(SimpleError::new("asc_tau must be strictly positive"));
    }

    if params.th_decay_rate < 0.0 {
        return Err(SimpleError::new("th_decay_rate must not be negative"));
    }

    Ok(())
}
