use std::ops::Range;

use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use simple_error::{try_with, SimpleError, SimpleResult};

use crate::error::SimulationError;
use crate::interval::{self, IntervalResult};
use crate::model::GlifModel;
use crate::params::{self, SimulatorParams};
use crate::spike_geometry::ModelSpike;
use crate::state::{NeuronState, Trajectories};

pub fn create_simulator<M: GlifModel>(
    params: SimulatorParams,
    model: M,
) -> Result<ForcedSpikeSimulator<M>, SimpleError> {
    try_with!(
        params::validate_simulator_params(&params),
        "invalid simulator parameters"
    );

    if model.num_after_spike_currents() != params.init_after_spike_currents.len() {
        return Err(SimpleError::new(format!(
            "model has {} after-spike currents but {} initial values were given",
            model.num_after_spike_currents(),
            params.init_after_spike_currents.len()
        )));
    }

    Ok(ForcedSpikeSimulator { params, model })
}

/// Full-length trajectories plus one entry per biological spike in each of the per-spike
/// arrays. Spike times are in the same unit as `dt`, measured from the stimulus start; ISIs are
/// measured from the start of the interval the spike belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(flatten)]
    pub trajectories: Trajectories,
    pub grid_model_spike_times: Vec<f64>,
    pub interpolated_model_spike_times: Vec<f64>,
    pub grid_model_spike_voltages: Vec<f64>,
    pub interpolated_model_spike_voltages: Vec<f64>,
    pub grid_isi: Vec<f64>,
    pub interpolated_isi: Vec<f64>,
    pub grid_bio_spike_model_voltage: Vec<f64>,
    pub grid_bio_spike_model_threshold: Vec<f64>,
}

impl SimulationResult {
    fn filled_with_nan(
        num_steps: usize,
        num_after_spike_currents: usize,
        num_spikes: usize,
    ) -> Self {
        let per_spike = vec![f64::NAN; num_spikes];
        Self {
            trajectories: Trajectories::filled_with_nan(num_steps, num_after_spike_currents),
            grid_model_spike_times: per_spike.clone(),
            interpolated_model_spike_times: per_spike.clone(),
            grid_model_spike_voltages: per_spike.clone(),
            interpolated_model_spike_voltages: per_spike.clone(),
            grid_isi: per_spike.clone(),
            interpolated_isi: per_spike.clone(),
            grid_bio_spike_model_voltage: per_spike.clone(),
            grid_bio_spike_model_threshold: per_spike,
        }
    }

    fn from_trajectories(trajectories: Trajectories) -> Self {
        Self {
            trajectories,
            ..Default::default()
        }
    }

    fn record_spike(
        &mut self,
        spike_num: usize,
        interval_start_time: f64,
        model_spike: &ModelSpike,
        interval: &IntervalResult,
    ) {
        self.grid_isi[spike_num] = model_spike.grid_time;
        self.interpolated_isi[spike_num] = model_spike.interpolated_time;

        self.grid_model_spike_times[spike_num] = model_spike.grid_time + interval_start_time;
        self.interpolated_model_spike_times[spike_num] =
            model_spike.interpolated_time + interval_start_time;

        self.grid_model_spike_voltages[spike_num] = model_spike.grid_voltage;
        self.interpolated_model_spike_voltages[spike_num] = model_spike.interpolated_voltage;

        self.grid_bio_spike_model_voltage[spike_num] = interval.bio_spike_voltage;
        self.grid_bio_spike_model_threshold[spike_num] = interval.bio_spike_threshold;
    }

    fn per_spike_lengths(&self) -> [(&'static str, usize); 8] {
        [
            ("grid_model_spike_times", self.grid_model_spike_times.len()),
            (
                "interpolated_model_spike_times",
                self.interpolated_model_spike_times.len(),
            ),
            ("grid_model_spike_voltages", self.grid_model_spike_voltages.len()),
            (
                "interpolated_model_spike_voltages",
                self.interpolated_model_spike_voltages.len(),
            ),
            ("grid_isi", self.grid_isi.len()),
            ("interpolated_isi", self.interpolated_isi.len()),
            (
                "grid_bio_spike_model_voltage",
                self.grid_bio_spike_model_voltage.len(),
            ),
            (
                "grid_bio_spike_model_threshold",
                self.grid_bio_spike_model_threshold.len(),
            ),
        ]
    }
}

/// Runs a GLIF model with spike times imposed from recorded data: the model evolves under its
/// own dynamics between biological spikes and is reset at each of them, while the simulator
/// records where the model would have spiked on its own.
pub struct ForcedSpikeSimulator<M: GlifModel> {
    params: SimulatorParams,
    model: M,
}

impl<M: GlifModel> ForcedSpikeSimulator<M> {
    pub fn params(&self) -> &SimulatorParams {
        &self.params
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    fn initial_state(&self) -> NeuronState {
        NeuronState::new(
            self.params.init_voltage,
            self.params.init_threshold,
            self.params.init_after_spike_currents.clone(),
        )
    }

    /// `bio_spike_indices` must be strictly increasing step indices into `stimulus`, with
    /// consecutive spikes more than `spike_cut_length` steps apart. The stretch after the last
    /// spike is simulated but never counted as a spike.
    pub fn run_with_biological_spikes(
        &mut self,
        stimulus: &[f64],
        response: &[f64],
        bio_spike_indices: &[usize],
    ) -> Result<SimulationResult, SimulationError> {
        self.model.clear_method_data();

        let initial_state = self.initial_state();
        if initial_state.voltage > initial_state.threshold {
            return Err(SimulationError::BadInitialization {
                voltage: initial_state.voltage,
                threshold: initial_state.threshold,
            });
        }

        validate_run_input(
            stimulus,
            response,
            bio_spike_indices,
            self.params.spike_cut_length,
        )?;

        let num_spikes = bio_spike_indices.len();
        debug!(
            "forced-spike run over {} steps with {} biological spikes",
            stimulus.len(),
            num_spikes
        );

        let result = if num_spikes == 0 {
            self.run_without_biological_spikes(initial_state, stimulus)?
        } else {
            self.run_between_biological_spikes(initial_state, stimulus, bio_spike_indices)?
        };

        for (name, len) in result.per_spike_lengths() {
            if len != num_spikes {
                return Err(SimulationError::InternalConsistency(format!(
                    "{} has {} entries for {} biological spikes",
                    name, len, num_spikes
                )));
            }
        }

        Ok(result)
    }

    fn run_without_biological_spikes(
        &mut self,
        initial_state: NeuronState,
        stimulus: &[f64],
    ) -> Result<SimulationResult, SimulationError> {
        let mut partial = SimulationResult::filled_with_nan(
            stimulus.len(),
            initial_state.after_spike_currents.len(),
            0,
        );

        let interval = self.run_interval_or_splice(
            &mut partial,
            initial_state,
            stimulus,
            0..stimulus.len(),
            &[],
        )?;

        let trajectories = interval.trajectories;
        if trajectories.voltage.len() != stimulus.len() {
            warn!("voltage output is not the same length as the stimulus");
        }
        if trajectories.threshold.len() != stimulus.len() {
            warn!("threshold output is not the same length as the stimulus");
        }
        if trajectories.after_spike_currents.len() != stimulus.len() {
            warn!("after-spike current output is not the same length as the stimulus");
        }

        Ok(SimulationResult::from_trajectories(trajectories))
    }

    fn run_between_biological_spikes(
        &mut self,
        initial_state: NeuronState,
        stimulus: &[f64],
        bio_spike_indices: &[usize],
    ) -> Result<SimulationResult, SimulationError> {
        let num_spikes = bio_spike_indices.len();
        let mut result = SimulationResult::filled_with_nan(
            stimulus.len(),
            initial_state.after_spike_currents.len(),
            num_spikes,
        );

        let mut state = initial_state;
        let mut start = 0;

        for (spike_num, &end) in bio_spike_indices.iter().enumerate() {
            if spike_num % 10 == 0 {
                debug!("spike {} / {}", spike_num, num_spikes);
            }

            let interval = self.run_interval_or_splice(
                &mut result,
                state,
                stimulus,
                start..end,
                bio_spike_indices,
            )?;

            result.trajectories.splice_at(start, &interval.trajectories);

            let model_spike = interval.model_spike.ok_or_else(|| {
                SimulationError::InternalConsistency(format!(
                    "no model spike for interval {}..{}",
                    start, end
                ))
            })?;
            result.record_spike(
                spike_num,
                start as f64 * self.params.dt,
                &model_spike,
                &interval,
            );

            state = interval.next_state.ok_or_else(|| {
                SimulationError::InternalConsistency(format!(
                    "no reset state after biological spike at step {}",
                    end
                ))
            })?;

            start = end.saturating_add(self.params.spike_cut_length);
        }

        let tail_start = start.min(stimulus.len());
        let tail = self.run_interval_or_splice(
            &mut result,
            state,
            stimulus,
            tail_start..stimulus.len(),
            bio_spike_indices,
        )?;
        result.trajectories.splice_at(tail_start, &tail.trajectories);

        Ok(result)
    }

    /// On failure, splices the interval's partial trajectories into `result` and hands all of it
    /// back inside the error.
    fn run_interval_or_splice(
        &mut self,
        result: &mut SimulationResult,
        state: NeuronState,
        stimulus: &[f64],
        range: Range<usize>,
        bio_spike_indices: &[usize],
    ) -> Result<IntervalResult, SimulationError> {
        let interval_start = range.start;

        interval::run_interval(
            &mut self.model,
            &self.params,
            state,
            stimulus,
            range,
            bio_spike_indices,
        )
        .map_err(|failure| {
            result.trajectories.splice_at(interval_start, &failure.partial);
            SimulationError::InvalidState {
                message: failure.message,
                interval_start,
                partial: Box::new(std::mem::take(result)),
            }
        })
    }
}

fn validate_run_input(
    stimulus: &[f64],
    response: &[f64],
    bio_spike_indices: &[usize],
    spike_cut_length: usize,
) -> SimpleResult<()> {
    if stimulus.len() != response.len() {
        return Err(SimpleError::new(format!(
            "stimulus has {} samples but response has {}",
            stimulus.len(),
            response.len()
        )));
    }

    if let Some(&first) = bio_spike_indices.first() {
        if first == 0 {
            return Err(SimpleError::new(
                "first biological spike must come after step 0",
            ));
        }
    }

    if let Some(&last) = bio_spike_indices.last() {
        if last >= stimulus.len() {
            return Err(SimpleError::new(format!(
                "biological spike at step {} is past the end of the stimulus ({} steps)",
                last,
                stimulus.len()
            )));
        }
    }

    for (prev, next) in bio_spike_indices.iter().tuple_windows() {
        if *next <= prev.saturating_add(spike_cut_length) {
            return Err(SimpleError::new(format!(
                "biological spike at step {} is within {} steps of the one at step {}",
                next, spike_cut_length, prev
            )));
        }
    }

    Ok(())
}
