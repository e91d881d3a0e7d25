use glif_forced::params::{LinearGlifParams, SimulatorParams};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioParams {
    pub simulator: SimulatorParams,
    pub model: LinearGlifParams,
}

pub fn get_scenario_params() -> ScenarioParams {
    let params_yaml_str = r#"
simulator:
  dt: 0.00005
  tau_membrane: 0.01
  spike_cut_length: 40
  refinement_factor: 4
  extrapolation_method: endpoints_single_tau
  init_voltage: 0.0
  init_threshold: 0.02
  init_after_spike_currents: [0.0, 0.0]
model:
  el: 0.0
  r_input: 100000000.0
  c: 0.0000000001
  asc_tau: [0.01, 0.1]
  asc_amp: [-0.00000000001, -0.000000000002]
  th_inf: 0.02
  th_adapt: 0.004
  th_decay_rate: 40.0
  voltage_reset: 0.0
  threshold_reset_method: adapt_sum_slow_fast
"#;

    serde_yaml::from_str(params_yaml_str).unwrap()
}
