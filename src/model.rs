use simple_error::{try_with, SimpleResult};

use crate::params::{self, LinearGlifParams, ThresholdResetMethod};
use crate::state::NeuronState;

#[derive(Debug, Clone, PartialEq)]
pub struct ResetOutcome {
    pub state: NeuronState,
    /// Set when the reset rule produced a state the model considers invalid, e.g. voltage
    /// above threshold right after reset.
    pub reset_was_invalid: bool,
}

/// Single-step dynamics and reset rules of a GLIF neuron. The forced-spike simulator only ever
/// drives a model through this trait.
pub trait GlifModel {
    fn num_after_spike_currents(&self) -> usize;

    fn threshold_reset_method(&self) -> ThresholdResetMethod;

    /// Advances `state` by one step of width `dt`. `step` is the global index of the first
    /// stimulus sample covered by the step.
    fn dynamics(
        &mut self,
        state: &NeuronState,
        stimulus: f64,
        step: usize,
        bio_spike_indices: &[usize],
        dt: f64,
    ) -> NeuronState;

    fn reset(&mut self, state: &NeuronState) -> ResetOutcome;

    /// Drops anything a previous run left behind.
    fn clear_method_data(&mut self) {}
}

/// Linear GLIF with after-spike currents and a threshold relaxing exponentially toward `th_inf`,
/// integrated with forward Euler.
#[derive(Debug, Clone)]
pub struct LinearGlif {
    params: LinearGlifParams,
}

impl LinearGlif {
    pub fn new(params: LinearGlifParams) -> SimpleResult<Self> {
        try_with!(
            params::validate_linear_glif_params(&params),
            "invalid linear glif parameters"
        );

        Ok(Self { params })
    }

    pub fn params(&self) -> &LinearGlifParams {
        &self.params
    }

    pub fn membrane_time_constant(&self) -> f64 {
        self.params.r_input * self.params.c
    }
}

impl GlifModel for LinearGlif {
    fn num_after_spike_currents(&self) -> usize {
        self.params.asc_tau.len()
    }

    fn threshold_reset_method(&self) -> ThresholdResetMethod {
        self.params.threshold_reset_method
    }

    fn dynamics(
        &mut self,
        state: &NeuronState,
        stimulus: f64,
        _step: usize,
        _bio_spike_indices: &[usize],
        dt: f64,
    ) -> NeuronState {
        let p = &self.params;

        let total_current = stimulus + state.after_spike_currents.iter().sum::<f64>();
        let leak_current = (state.voltage - p.el) / p.r_input;
        let voltage = state.voltage + dt * (total_current - leak_current) / p.c;

        let after_spike_currents = state
            .after_spike_currents
            .iter()
            .zip(&p.asc_tau)
            .map(|(asc, tau)| asc * (-dt / tau).exp())
            .collect();

        let threshold = match p.threshold_reset_method {
            ThresholdResetMethod::Inf => p.th_inf,
            ThresholdResetMethod::Adapt | ThresholdResetMethod::AdaptSumSlowFast => {
                p.th_inf + (state.threshold - p.th_inf) * (-p.th_decay_rate * dt).exp()
            }
        };

        NeuronState {
            voltage,
            threshold,
            after_spike_currents,
        }
    }

    fn reset(&mut self, state: &NeuronState) -> ResetOutcome {
        let p = &self.params;

        let threshold = match p.threshold_reset_method {
            ThresholdResetMethod::Inf => p.th_inf,
            ThresholdResetMethod::Adapt | ThresholdResetMethod::AdaptSumSlowFast => {
                state.threshold + p.th_adapt
            }
        };

        let after_spike_currents = state
            .after_spike_currents
            .iter()
            .zip(&p.asc_amp)
            .map(|(asc, amp)| asc + amp)
            .collect();

        ResetOutcome {
            reset_was_invalid: p.voltage_reset > threshold,
            state: NeuronState {
                voltage: p.voltage_reset,
                threshold,
                after_spike_currents,
            },
        }
    }
}
