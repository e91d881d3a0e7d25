use std::time::Instant;

use glif_forced::{model::LinearGlif, simulator};
use rand::{distributions::Uniform, prelude::Distribution, rngs::StdRng, SeedableRng};
use statrs::distribution::Exp;

#[path = "../scenario_params.rs"]
mod scenario_params;

fn main() {
    let params = scenario_params::get_scenario_params();
    let dt = params.simulator.dt;
    let spike_cut_length = params.simulator.spike_cut_length;

    let model = LinearGlif::new(params.model).unwrap();
    let mut simulator = simulator::create_simulator(params.simulator, model).unwrap();

    let num_steps = 1_000_000;
    let mut rng = StdRng::seed_from_u64(0);

    let stimulus_dist = Uniform::new(1.5e-10, 4.5e-10);
    let stimulus: Vec<f64> = (0..num_steps).map(|_| stimulus_dist.sample(&mut rng)).collect();
    let response = vec![0.0; num_steps];

    // biological spikes as a Poisson process at 20 Hz
    let isi_dist = Exp::new(20.0).unwrap();
    let mut bio_spike_indices = Vec::new();
    let mut next_spike = 0;
    loop {
        let gap = (isi_dist.sample(&mut rng) / dt).ceil() as usize;
        next_spike += gap + spike_cut_length + 1;
        if next_spike >= num_steps {
            break;
        }
        bio_spike_indices.push(next_spike);
    }

    let wall_start = Instant::now();

    let result = simulator
        .run_with_biological_spikes(&stimulus, &response, &bio_spike_indices)
        .unwrap();

    let wall_time = wall_start.elapsed();
    let step_throughput = num_steps as f64 / wall_time.as_secs_f64();

    eprintln!("Biological spikes: {}", bio_spike_indices.len());
    eprintln!(
        "Step throughput: {:.3e} ({:.3} ns per step)",
        step_throughput,
        1e9 / step_throughput
    );
    eprintln!(
        "Checksum: {}",
        result.interpolated_isi.iter().filter(|isi| isi.is_finite()).sum::<f64>()
    );
}
