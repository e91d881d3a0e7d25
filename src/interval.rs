use std::iter;
use std::ops::Range;

use itertools::Itertools;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::model::GlifModel;
use crate::params::{SimulatorParams, ThresholdResetMethod};
use crate::spike_geometry::{self, ModelSpike};
use crate::state::{NeuronState, Trajectories};
use crate::util;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalResult {
    /// One sample per step of the interval, reconstructed on the original grid.
    pub trajectories: Trajectories,
    /// Detected or extrapolated model spike, relative to the interval start. `None` only for an
    /// empty interval.
    pub model_spike: Option<ModelSpike>,
    /// Initial state of the next interval, `None` for the trailing interval.
    pub next_state: Option<NeuronState>,
    pub bio_spike_voltage: f64,
    pub bio_spike_threshold: f64,
}

/// Voltage, threshold or an after-spike current became NaN or infinite. `partial` has the shape
/// of a successful result's trajectories, NaN from the failure point on.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalFailure {
    pub message: String,
    pub coarse_step: usize,
    pub partial: Trajectories,
}

/// Step indices (relative to the interval start) at which the dynamics are evaluated: every
/// `refinement_factor`-th step plus the end of the interval.
pub fn coarse_grid_indices(num_steps: usize, refinement_factor: usize) -> Vec<usize> {
    (0..num_steps)
        .step_by(refinement_factor)
        .chain(iter::once(num_steps))
        .collect()
}

/// Mean of `samples` over each bin between consecutive `bin_edges`.
pub fn downsample_boxcar(samples: &[f64], bin_edges: &[usize]) -> Vec<f64> {
    bin_edges
        .iter()
        .tuple_windows()
        .map(|(&from, &to)| samples[from..to].iter().sum::<f64>() / (to - from) as f64)
        .collect()
}

struct CoarseBuffers {
    times: Vec<f64>,
    voltage: Vec<f64>,
    threshold: Vec<f64>,
    after_spike_currents: Vec<Vec<f64>>,
}

impl CoarseBuffers {
    fn new(times: Vec<f64>, num_after_spike_currents: usize) -> Self {
        let num_nodes = times.len();
        Self {
            times,
            voltage: vec![f64::NAN; num_nodes],
            threshold: vec![f64::NAN; num_nodes],
            after_spike_currents: vec![vec![f64::NAN; num_after_spike_currents]; num_nodes],
        }
    }

    fn record(&mut self, node: usize, state: &NeuronState) {
        self.voltage[node] = state.voltage;
        self.threshold[node] = state.threshold;
        self.after_spike_currents[node].clone_from(&state.after_spike_currents);
    }

    /// Interpolates the first `num_nodes` nodes onto `fine_times`, which must be a prefix of the
    /// interval's fine grid. Steps not covered stay NaN.
    fn to_fine_grid(
        &self,
        num_nodes: usize,
        fine_times: &[f64],
        num_steps: usize,
        num_after_spike_currents: usize,
    ) -> Trajectories {
        let mut trajectories = Trajectories::filled_with_nan(num_steps, num_after_spike_currents);
        let node_times = &self.times[..num_nodes];
        let covered = fine_times.len();

        trajectories.voltage[..covered].copy_from_slice(&util::interpolate_clamped(
            node_times,
            &self.voltage[..num_nodes],
            fine_times,
        ));
        trajectories.threshold[..covered].copy_from_slice(&util::interpolate_clamped(
            node_times,
            &self.threshold[..num_nodes],
            fine_times,
        ));

        for k in 0..num_after_spike_currents {
            let column: Vec<f64> = self.after_spike_currents[..num_nodes]
                .iter()
                .map(|row| row.get(k).copied().unwrap_or(f64::NAN))
                .collect();

            let interpolated = util::interpolate_clamped(node_times, &column, fine_times);
            for (row, value) in trajectories.after_spike_currents.iter_mut().zip(interpolated) {
                row[k] = value;
            }
        }

        trajectories
    }
}

/// Simulates `range` of the stimulus starting from `initial_state`. The model's dynamics are
/// evaluated once per coarse bin of `refinement_factor` steps, driven by the bin's mean stimulus,
/// and the trajectories are reconstructed on the original grid by linear interpolation. The
/// interval ends at a biological spike unless it reaches the end of the stimulus, in which case
/// no reset is applied.
///
/// Panics if `range` is not within `stimulus`.
pub fn run_interval<M: GlifModel + ?Sized>(
    model: &mut M,
    params: &SimulatorParams,
    initial_state: NeuronState,
    stimulus: &[f64],
    range: Range<usize>,
    bio_spike_indices: &[usize],
) -> Result<IntervalResult, IntervalFailure> {
    let dt = params.dt;
    let num_steps = range.len();
    let num_after_spike_currents = initial_state.after_spike_currents.len();

    let coarse_indices = coarse_grid_indices(num_steps, params.refinement_factor);
    let coarse_stimulus = downsample_boxcar(&stimulus[range.clone()], &coarse_indices);
    let fine_times = util::grid_times(0..num_steps, dt);

    let mut coarse = CoarseBuffers::new(
        util::grid_times(coarse_indices.iter().copied(), dt),
        num_after_spike_currents,
    );

    let mut state = initial_state;

    for (step, (&bin_start, &bin_end)) in coarse_indices.iter().tuple_windows().enumerate() {
        coarse.record(step, &state);

        if !state.is_finite() {
            return Err(invalid_state_failure(
                step,
                &state,
                &coarse,
                &fine_times,
                num_after_spike_currents,
            ));
        }

        let bin_dt = (bin_end - bin_start) as f64 * dt;
        state = model.dynamics(
            &state,
            coarse_stimulus[step],
            range.start + bin_start,
            bio_spike_indices,
            bin_dt,
        );
    }

    let last_node = coarse_indices.len() - 1;
    coarse.record(last_node, &state);

    if !state.is_finite() {
        return Err(invalid_state_failure(
            last_node,
            &state,
            &coarse,
            &fine_times,
            num_after_spike_currents,
        ));
    }

    let trajectories = coarse.to_fine_grid(
        last_node + 1,
        &fine_times,
        num_steps,
        num_after_spike_currents,
    );

    let model_spike = spike_geometry::find_first_crossing(
        &trajectories.voltage,
        &trajectories.threshold,
        state.voltage,
        state.threshold,
        dt,
    )
    .or_else(|| {
        params.extrapolation_method.extrapolate(
            params.tau_membrane,
            &trajectories.voltage,
            &trajectories.threshold,
            state.voltage,
            state.threshold,
            dt,
        )
    });

    let is_trailing = range.end >= stimulus.len();

    let next_state = if is_trailing {
        None
    } else {
        if model.threshold_reset_method() == ThresholdResetMethod::AdaptSumSlowFast {
            state.voltage = state.threshold;
        }

        let outcome = model.reset(&state);
        if outcome.reset_was_invalid {
            warn!(
                "invalid reset at step {}: voltage {}, threshold {}",
                range.end, outcome.state.voltage, outcome.state.threshold
            );
        }

        Some(outcome.state)
    };

    Ok(IntervalResult {
        trajectories,
        model_spike,
        next_state,
        bio_spike_voltage: state.voltage,
        bio_spike_threshold: state.threshold,
    })
}

/// Builds the failure for a non-finite state at coarse node `step`. Only nodes before it hold
/// usable values.
fn invalid_state_failure(
    step: usize,
    state: &NeuronState,
    coarse: &CoarseBuffers,
    fine_times: &[f64],
    num_after_spike_currents: usize,
) -> IntervalFailure {
    log_invalid_state(step, coarse.times.len(), state, coarse);

    let covered = match step.checked_sub(1) {
        Some(last_valid) => {
            let t_last_valid = coarse.times[last_valid];
            fine_times.partition_point(|t| *t <= t_last_valid)
        }
        None => 0,
    };

    IntervalFailure {
        message: "invalid threshold, voltage, or after-spike current encountered".to_string(),
        coarse_step: step,
        partial: coarse.to_fine_grid(
            step,
            &fine_times[..covered],
            fine_times.len(),
            num_after_spike_currents,
        ),
    }
}

fn log_invalid_state(step: usize, num_nodes: usize, state: &NeuronState, coarse: &CoarseBuffers) {
    let recent = step.saturating_sub(20)..step;

    error!("time step: {} / {}", step, num_nodes);
    error!("    voltage: {}", state.voltage);
    error!("    voltage started the run at: {}", coarse.voltage[0]);
    error!("    voltage before: {:?}", &coarse.voltage[recent.clone()]);
    error!("    threshold: {}", state.threshold);
    error!("    threshold started the run at: {}", coarse.threshold[0]);
    error!("    threshold before: {:?}", &coarse.threshold[recent]);
    error!("    after-spike currents: {:?}", state.after_spike_currents);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrapolation::ExtrapolationMethod;
    use crate::util::test_util::{assert_approx_eq_slice, RampModel};
    use float_cmp::assert_approx_eq;
    use itertools::assert_equal;

    fn params(refinement_factor: usize) -> SimulatorParams {
        SimulatorParams {
            dt: 0.1,
            tau_membrane: 0.3,
            spike_cut_length: 0,
            refinement_factor,
            extrapolation_method: ExtrapolationMethod::Endpoints,
            init_voltage: 0.0,
            init_threshold: 1.0,
            init_after_spike_currents: vec![0.0],
        }
    }

    fn initial_state() -> NeuronState {
        NeuronState::new(0.0, 1.0, vec![0.0])
    }

    #[test]
    fn coarse_indices() {
        assert_equal(coarse_grid_indices(10, 3), [0, 3, 6, 9, 10]);
        assert_equal(coarse_grid_indices(6, 2), [0, 2, 4, 6]);
        assert_equal(coarse_grid_indices(4, 1), [0, 1, 2, 3, 4]);
        assert_equal(coarse_grid_indices(3, 5), [0, 3]);
        assert_equal(coarse_grid_indices(0, 2), [0]);
    }

    #[test]
    fn boxcar() {
        let samples = [1.0, 3.0, 2.0, 4.0, 10.0];
        assert_approx_eq_slice(
            &downsample_boxcar(&samples, &[0, 2, 4, 5]),
            &[2.0, 3.0, 10.0],
        );
    }

    #[test]
    fn unit_refinement_matches_direct_stepping() {
        let params = params(1);
        let stimulus: Vec<f64> = (0..12).map(|i| (i as f64 * 0.7).sin()).collect();
        let mut model = RampModel::new(0.5);

        let result = run_interval(
            &mut model,
            &params,
            initial_state(),
            &stimulus,
            2..9,
            &[9],
        )
        .unwrap();

        let mut direct_model = RampModel::new(0.5);
        let mut state = initial_state();
        let mut expected_voltage = Vec::new();
        let mut expected_asc = Vec::new();
        for step in 2..9 {
            expected_voltage.push(state.voltage);
            expected_asc.push(state.after_spike_currents.clone());
            state = direct_model.dynamics(&state, stimulus[step], step, &[9], params.dt);
        }

        assert_eq!(result.trajectories.voltage, expected_voltage);
        assert_eq!(result.trajectories.after_spike_currents, expected_asc);
        assert_eq!(result.bio_spike_voltage, state.voltage);
        assert_eq!(model.visited_steps, (2..9).collect::<Vec<_>>());
    }

    #[test]
    fn refinement_exact_on_coarse_nodes() {
        let params = params(2);
        let stimulus: Vec<f64> = (0..8).map(|i| 0.1 * i as f64).collect();
        let mut model = RampModel::new(0.5);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..8, &[]).unwrap();

        let mut direct_model = RampModel::new(0.5);
        let mut state = initial_state();
        for (node, step) in (0..8).step_by(2).enumerate() {
            assert_eq!(result.trajectories.voltage[2 * node], state.voltage);
            let bin_stimulus = (stimulus[step] + stimulus[step + 1]) / 2.0;
            state = direct_model.dynamics(&state, bin_stimulus, step, &[], 2.0 * params.dt);
        }

        assert_eq!(model.visited_steps, [0, 2, 4, 6]);
        assert_eq!(result.trajectories.len(), 8);

        // odd samples lie halfway between their neighbours
        let v = &result.trajectories.voltage;
        assert_approx_eq!(f64, v[3], (v[2] + v[4]) / 2.0);
    }

    #[test]
    fn shorter_trailing_bin() {
        let params = params(3);
        let stimulus = vec![0.0; 7];
        let mut model = RampModel::new(1.0);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..7, &[]).unwrap();

        assert_eq!(model.visited_steps, [0, 3, 6]);
        assert_eq!(model.visited_dts.len(), 3);
        assert_approx_eq!(f64, model.visited_dts[0], 0.3);
        assert_approx_eq!(f64, model.visited_dts[2], 0.1);

        // voltage ramps at slope 1 regardless of the bin widths
        let expected: Vec<f64> = (0..7).map(|i| i as f64 * 0.1).collect();
        assert_approx_eq_slice(&result.trajectories.voltage, &expected);
        assert_approx_eq!(f64, result.bio_spike_voltage, 0.7);
    }

    #[test]
    fn interior_crossing() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        // 0.3 per step: 0.0, 0.3, 0.6, 0.9, 1.2 crosses at step 4
        let mut model = RampModel::new(3.0);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..8, &[8]).unwrap();
        let spike = result.model_spike.unwrap();

        assert_approx_eq!(f64, spike.grid_time, 0.3);
        assert!(spike.interpolated_time > 0.3);
        assert!(spike.interpolated_time < 0.4);
        assert_approx_eq!(f64, spike.interpolated_voltage, 1.0);
    }

    #[test]
    fn extrapolated_when_no_crossing() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..4, &[4]).unwrap();
        let spike = result.model_spike.unwrap();

        // voltage reaches 1.0 at t = 2.0
        assert_approx_eq!(f64, spike.interpolated_time, 2.0, epsilon = 1e-12);
        assert_approx_eq!(f64, spike.grid_voltage, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn reset_at_biological_spike() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..4, &[4]).unwrap();

        let next_state = result.next_state.unwrap();
        assert_eq!(next_state.voltage, model.reset_voltage);
        assert_approx_eq!(f64, next_state.after_spike_currents[0], 1.0 + 0.4);
        assert_eq!(model.reset_count, 1);
        assert!(result.bio_spike_voltage < result.bio_spike_threshold);
    }

    #[test]
    fn adaptive_threshold_reset_clamps_voltage() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);
        model.threshold_reset_method = ThresholdResetMethod::AdaptSumSlowFast;

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..4, &[4]).unwrap();

        assert_eq!(result.bio_spike_voltage, result.bio_spike_threshold);
        assert_eq!(model.last_reset_input.unwrap().voltage, 1.0);
    }

    #[test]
    fn no_reset_on_trailing_interval() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 4..10, &[3]).unwrap();

        assert!(result.next_state.is_none());
        assert_eq!(model.reset_count, 0);
        assert_eq!(result.trajectories.len(), 6);
    }

    #[test]
    fn empty_trailing_interval() {
        let params = params(2);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);

        let result =
            run_interval(&mut model, &params, initial_state(), &stimulus, 10..10, &[]).unwrap();

        assert!(result.trajectories.is_empty());
        assert!(result.model_spike.is_none());
        assert!(result.next_state.is_none());
        assert!(model.visited_steps.is_empty());
    }

    #[test]
    fn invalid_state_keeps_partial_trajectories() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);
        model.fail_from_step = Some(5);

        let failure = run_interval(&mut model, &params, initial_state(), &stimulus, 1..9, &[9])
            .unwrap_err();

        // dynamics at global step 5 (local step 4) produce NaN, detected before local step 5
        assert_eq!(failure.coarse_step, 5);
        assert_eq!(failure.partial.len(), 8);
        assert!(failure.partial.voltage[..5].iter().all(|v| v.is_finite()));
        assert!(failure.partial.voltage[5..].iter().all(|v| v.is_nan()));
        assert!(failure.partial.threshold[5..].iter().all(|v| v.is_nan()));
        assert!(failure.partial.after_spike_currents[4][0].is_finite());
        assert!(failure.partial.after_spike_currents[5][0].is_nan());
        assert_approx_eq!(f64, failure.partial.voltage[4], 0.2);
    }

    #[test]
    fn invalid_state_on_coarse_grid() {
        let params = params(2);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);
        model.fail_from_step = Some(4);

        let failure =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..10, &[]).unwrap_err();

        // nodes at steps 0, 2, 4 are valid, node at step 6 is not
        assert_eq!(failure.coarse_step, 3);
        assert!(failure.partial.voltage[..5].iter().all(|v| v.is_finite()));
        assert!(failure.partial.voltage[5..].iter().all(|v| v.is_nan()));
        assert_approx_eq!(f64, failure.partial.voltage[3], 0.15);
    }

    #[test]
    fn divergence_on_last_step_of_trailing_interval() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);
        model.fail_from_step = Some(9);

        let failure =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..10, &[]).unwrap_err();

        assert_eq!(failure.coarse_step, 10);
        assert_eq!(failure.partial.len(), 10);
        assert!(failure.partial.voltage.iter().all(|v| v.is_finite()));
        assert_approx_eq!(f64, failure.partial.voltage[9], 0.45);
    }

    #[test]
    fn divergence_on_last_step_before_biological_spike() {
        let params = params(2);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);
        model.fail_from_step = Some(4);

        let failure =
            run_interval(&mut model, &params, initial_state(), &stimulus, 0..6, &[6]).unwrap_err();

        // nodes at steps 0, 2, 4 are valid, the end node at step 6 is not
        assert_eq!(failure.coarse_step, 3);
        assert!(failure.partial.voltage[..5].iter().all(|v| v.is_finite()));
        assert!(failure.partial.voltage[5].is_nan());
        assert_eq!(model.reset_count, 0);
    }

    #[test]
    fn invalid_initial_state() {
        let params = params(1);
        let stimulus = vec![0.0; 10];
        let mut model = RampModel::new(0.5);

        let failure = run_interval(
            &mut model,
            &params,
            NeuronState::new(f64::NAN, 1.0, vec![0.0]),
            &stimulus,
            0..5,
            &[5],
        )
        .unwrap_err();

        assert_eq!(failure.coarse_step, 0);
        assert!(failure.partial.voltage.iter().all(|v| v.is_nan()));
        assert!(model.visited_steps.is_empty());
    }
}
